use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{PrefixDeclaration, ResolveResult};
use quick_xml::{NsReader, Writer};

use crate::core::error::{Result, VerifactuError};

/// An XML element with resolved namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub prefix: Option<String>,
    /// Local name.
    pub name: String,
    pub namespace: Option<String>,
    /// Namespace declarations made on this element: `(prefix, uri)`,
    /// `None` for the default namespace.
    pub namespaces: Vec<(Option<String>, String)>,
    pub attributes: Vec<Attribute>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub prefix: Option<String>,
    pub name: String,
    pub namespace: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

fn xml_err(e: impl std::fmt::Display) -> VerifactuError {
    VerifactuError::Xml(e.to_string())
}

fn utf8(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(xml_err)
}

impl Element {
    /// Element in namespace `namespace`, written with `prefix`.
    pub fn ns(prefix: &str, namespace: &str, name: &str) -> Self {
        Self {
            prefix: Some(prefix.to_string()),
            name: name.to_string(),
            namespace: Some(namespace.to_string()),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Element in no namespace.
    pub fn local(name: &str) -> Self {
        Self {
            prefix: None,
            name: name.to_string(),
            namespace: None,
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Sibling in the same namespace and with the same prefix as `self`.
    pub fn sibling(&self, name: &str) -> Self {
        Self {
            prefix: self.prefix.clone(),
            name: name.to_string(),
            namespace: self.namespace.clone(),
            namespaces: Vec::new(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Declare a namespace prefix on this element.
    pub fn declare(mut self, prefix: &str, uri: &str) -> Self {
        self.namespaces.push((Some(prefix.to_string()), uri.to_string()));
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.children.push(Node::Text(text.to_string()));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn push(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Set an unqualified attribute, replacing an existing one.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        match self
            .attributes
            .iter_mut()
            .find(|a| a.namespace.is_none() && a.name == name)
        {
            Some(a) => a.value = value.to_string(),
            None => self.attributes.push(Attribute {
                prefix: None,
                name: name.to_string(),
                namespace: None,
                value: value.to_string(),
            }),
        }
    }

    /// Value of an unqualified attribute.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.name == name)
            .map(|a| a.value.as_str())
    }

    /// `prefix:name` as written.
    pub fn qname(&self) -> String {
        match &self.prefix {
            Some(p) => format!("{p}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// `{namespace}name`, the form used in validation messages.
    pub fn expanded_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{{{ns}}}{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn is(&self, namespace: &str, name: &str) -> bool {
        self.name == name && self.namespace.as_deref() == Some(namespace)
    }

    /// Child elements, skipping text.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn child(&self, namespace: &str, name: &str) -> Option<&Element> {
        self.elements().find(|e| e.is(namespace, name))
    }

    pub fn children_named<'a>(
        &'a self,
        namespace: &'a str,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Element> + 'a {
        self.elements().filter(move |e| e.is(namespace, name))
    }

    /// Direct text content, concatenated.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Trimmed text of a child element.
    pub fn child_text(&self, namespace: &str, name: &str) -> Option<String> {
        self.child(namespace, name).map(|e| e.text().trim().to_string())
    }

    /// True if the element has non-whitespace text directly inside it.
    pub fn has_text(&self) -> bool {
        !self.text().trim().is_empty()
    }

    /// First descendant (or self) matching, depth first.
    pub fn find(&self, namespace: &str, name: &str) -> Option<&Element> {
        if self.is(namespace, name) {
            return Some(self);
        }
        self.elements().find_map(|e| e.find(namespace, name))
    }

    /// First descendant (or self) with the given local name, any namespace.
    pub fn find_local(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        self.elements().find_map(|e| e.find_local(name))
    }

    /// All descendants (and self) matching, document order.
    pub fn find_all<'a>(&'a self, namespace: &str, name: &str, out: &mut Vec<&'a Element>) {
        if self.is(namespace, name) {
            out.push(self);
        }
        for e in self.elements() {
            e.find_all(namespace, name, out);
        }
    }

    /// Remove direct children matching; returns how many were removed.
    pub fn remove_children(&mut self, namespace: &str, name: &str) -> usize {
        let before = self.children.len();
        self.children
            .retain(|n| !matches!(n, Node::Element(e) if e.is(namespace, name)));
        before - self.children.len()
    }

    // ── Parsing ──

    /// Parse a document and return its root element.
    ///
    /// Whitespace text is kept; comments and processing instructions are
    /// dropped.
    pub fn parse(xml: &str) -> Result<Element> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().expand_empty_elements = true;

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event().map_err(xml_err)? {
                Event::Start(e) => {
                    let (resolved, local) = reader.resolve_element(e.name());
                    let mut el = Element {
                        prefix: e
                            .name()
                            .prefix()
                            .map(|p| utf8(p.as_ref()))
                            .transpose()?,
                        name: utf8(local.as_ref())?,
                        namespace: namespace_of(resolved, "element")?,
                        namespaces: Vec::new(),
                        attributes: Vec::new(),
                        children: Vec::new(),
                    };
                    for attr in e.attributes() {
                        let attr = attr.map_err(xml_err)?;
                        let value = attr.unescape_value().map_err(xml_err)?.into_owned();
                        match attr.key.as_namespace_binding() {
                            Some(PrefixDeclaration::Default) => el.namespaces.push((None, value)),
                            Some(PrefixDeclaration::Named(p)) => {
                                el.namespaces.push((Some(utf8(p)?), value))
                            }
                            None => {
                                let (resolved, local) = reader.resolve_attribute(attr.key);
                                el.attributes.push(Attribute {
                                    prefix: attr
                                        .key
                                        .prefix()
                                        .map(|p| utf8(p.as_ref()))
                                        .transpose()?,
                                    name: utf8(local.as_ref())?,
                                    namespace: namespace_of(resolved, "attribute")?,
                                    value,
                                });
                            }
                        }
                    }
                    stack.push(el);
                }
                Event::End(_) => {
                    let el = stack
                        .pop()
                        .ok_or_else(|| VerifactuError::Xml("unbalanced end tag".into()))?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(el)),
                        None => {
                            if root.is_some() {
                                return Err(VerifactuError::Xml(
                                    "more than one root element".into(),
                                ));
                            }
                            root = Some(el);
                        }
                    }
                }
                Event::Text(t) => {
                    let text = t.unescape().map_err(xml_err)?.into_owned();
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text));
                    } else if !text.trim().is_empty() {
                        return Err(VerifactuError::Xml("text outside the root element".into()));
                    }
                }
                Event::CData(c) => {
                    let text = utf8(&c.into_inner())?;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(Node::Text(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(VerifactuError::Xml("unexpected end of document".into()));
        }
        root.ok_or_else(|| VerifactuError::Xml("document has no root element".into()))
    }

    // ── Writing ──

    /// Serialize without indentation. Used for anything that gets signed.
    pub fn to_xml_string(&self) -> Result<String> {
        let writer = Writer::new(Cursor::new(Vec::new()));
        self.write_document(writer, false)
    }

    /// Serialize with two-space indentation; whitespace-only text is dropped.
    pub fn to_pretty_string(&self) -> Result<String> {
        let writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
        self.write_document(writer, true)
    }

    fn write_document(&self, mut writer: Writer<Cursor<Vec<u8>>>, pretty: bool) -> Result<String> {
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_err)?;
        let mut scope = Vec::new();
        self.write_into(&mut writer, &mut scope, pretty)?;
        let buf = writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(xml_err)
    }

    fn write_into(
        &self,
        writer: &mut Writer<Cursor<Vec<u8>>>,
        scope: &mut Vec<(Option<String>, String)>,
        pretty: bool,
    ) -> Result<()> {
        let mark = scope.len();
        let qname = self.qname();
        let mut start = BytesStart::new(qname.as_str());

        for (prefix, uri) in &self.namespaces {
            push_ns_decl(&mut start, prefix.as_deref(), uri);
            scope.push((prefix.clone(), uri.clone()));
        }
        // Declarations for prefixes that are used but were never declared.
        let mut used = vec![(self.prefix.clone(), self.namespace.clone())];
        used.extend(
            self.attributes
                .iter()
                .filter(|a| a.prefix.is_some())
                .map(|a| (a.prefix.clone(), a.namespace.clone())),
        );
        for (prefix, namespace) in used {
            let uri = namespace.unwrap_or_default();
            let bound = lookup(scope, prefix.as_deref()).unwrap_or("");
            if bound != uri {
                push_ns_decl(&mut start, prefix.as_deref(), &uri);
                scope.push((prefix, uri));
            }
        }
        for a in &self.attributes {
            let key = match &a.prefix {
                Some(p) => format!("{p}:{}", a.name),
                None => a.name.clone(),
            };
            start.push_attribute((key.as_str(), a.value.as_str()));
        }

        let children: Vec<&Node> = self
            .children
            .iter()
            .filter(|n| !pretty || !matches!(n, Node::Text(t) if t.trim().is_empty()))
            .collect();

        if children.is_empty() {
            writer.write_event(Event::Empty(start)).map_err(xml_err)?;
        } else {
            writer.write_event(Event::Start(start)).map_err(xml_err)?;
            for child in children {
                match child {
                    Node::Element(e) => e.write_into(writer, scope, pretty)?,
                    Node::Text(t) => writer
                        .write_event(Event::Text(BytesText::new(t)))
                        .map_err(xml_err)?,
                }
            }
            writer
                .write_event(Event::End(BytesEnd::new(qname.as_str())))
                .map_err(xml_err)?;
        }
        scope.truncate(mark);
        Ok(())
    }
}

fn push_ns_decl(start: &mut BytesStart<'_>, prefix: Option<&str>, uri: &str) {
    match prefix {
        Some(p) => start.push_attribute((format!("xmlns:{p}").as_str(), uri)),
        None => start.push_attribute(("xmlns", uri)),
    }
}

/// Innermost binding of `prefix` in a declaration stack.
pub(crate) fn lookup<'a>(scope: &'a [(Option<String>, String)], prefix: Option<&str>) -> Option<&'a str> {
    scope
        .iter()
        .rev()
        .find(|(p, _)| p.as_deref() == prefix)
        .map(|(_, uri)| uri.as_str())
}

fn namespace_of(resolved: ResolveResult<'_>, what: &str) -> Result<Option<String>> {
    match resolved {
        ResolveResult::Bound(ns) => Ok(Some(utf8(ns.as_ref())?)),
        ResolveResult::Unbound => Ok(None),
        ResolveResult::Unknown(p) => Err(VerifactuError::Xml(format!(
            "{what} uses undeclared prefix '{}'",
            String::from_utf8_lossy(&p)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::ns;

    #[test]
    fn parse_resolves_any_prefix() {
        let a = Element::parse(&format!(
            r#"<sum1:Root xmlns:sum1="{}"><sum1:Leaf>x</sum1:Leaf></sum1:Root>"#,
            ns::SUM1
        ))
        .unwrap();
        let b = Element::parse(&format!(
            r#"<sf:Root xmlns:sf="{}"><sf:Leaf>x</sf:Leaf></sf:Root>"#,
            ns::SUM1
        ))
        .unwrap();
        assert_eq!(a.child_text(ns::SUM1, "Leaf").as_deref(), Some("x"));
        assert_eq!(b.child_text(ns::SUM1, "Leaf").as_deref(), Some("x"));
        assert_eq!(b.prefix.as_deref(), Some("sf"));
    }

    #[test]
    fn parse_unescapes_text_and_attributes() {
        let el = Element::parse(r#"<a b="x &amp; y">1 &lt; 2</a>"#).unwrap();
        assert_eq!(el.attr("b"), Some("x & y"));
        assert_eq!(el.text(), "1 < 2");
    }

    #[test]
    fn parse_rejects_broken_documents() {
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("").is_err());
        assert!(Element::parse("<p:a/>").is_err());
    }

    #[test]
    fn writer_declares_missing_namespaces() {
        let el = Element::ns("sum1", ns::SUM1, "Root")
            .with_child(Element::ns("sum1", ns::SUM1, "Leaf").with_text("a & b"));
        let xml = el.to_xml_string().unwrap();
        assert_eq!(
            xml,
            format!(
                r#"<?xml version="1.0" encoding="UTF-8"?><sum1:Root xmlns:sum1="{}"><sum1:Leaf>a &amp; b</sum1:Leaf></sum1:Root>"#,
                ns::SUM1
            )
        );
        assert_eq!(Element::parse(&xml).unwrap().find(ns::SUM1, "Leaf").unwrap().text(), "a & b");
    }

    #[test]
    fn pretty_output_reparses_to_same_elements() {
        let el = Element::ns("sum1", ns::SUM1, "Root")
            .with_child(Element::ns("sum1", ns::SUM1, "A").with_text("1"))
            .with_child(Element::ns("sum1", ns::SUM1, "B").with_text("2"));
        let pretty = el.to_pretty_string().unwrap();
        assert!(pretty.contains("\n  <sum1:A>1</sum1:A>"));
        let back = Element::parse(&pretty).unwrap();
        assert_eq!(back.elements().count(), 2);
    }

    #[test]
    fn remove_children_by_name() {
        let mut el = Element::local("r")
            .with_child(Element::ns("ds", ns::DS, "Signature"))
            .with_child(Element::local("x"));
        assert_eq!(el.remove_children(ns::DS, "Signature"), 1);
        assert_eq!(el.elements().count(), 1);
    }
}
