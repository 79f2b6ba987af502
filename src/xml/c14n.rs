//! Exclusive XML canonicalization 1.0 (without comments) over [`Element`].
//!
//! Only namespace declarations that are visibly used by an element or its
//! attributes and not already rendered on an output ancestor are written,
//! so a subtree canonicalizes the same wherever it is embedded.

use super::tree::{Element, Node};

/// Algorithm URI.
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// Canonical form of `root` and its subtree.
pub fn canonicalize(root: &Element) -> String {
    canonicalize_filtered(root, &|_| false)
}

/// Canonical form with every element for which `skip` holds left out,
/// together with its subtree. The enveloped-signature transform uses this
/// to drop `ds:Signature`.
pub fn canonicalize_filtered(root: &Element, skip: &dyn Fn(&Element) -> bool) -> String {
    let mut out = String::with_capacity(4096);
    let mut rendered: Vec<(String, String)> = Vec::new();
    write_element(root, skip, &mut rendered, &mut out);
    out
}

fn write_element(
    el: &Element,
    skip: &dyn Fn(&Element) -> bool,
    rendered: &mut Vec<(String, String)>,
    out: &mut String,
) {
    let mark = rendered.len();

    // Visibly utilized prefixes: the element's own (default = "") and those
    // of prefixed attributes.
    let mut utilized: Vec<(String, String)> = vec![(
        el.prefix.clone().unwrap_or_default(),
        el.namespace.clone().unwrap_or_default(),
    )];
    for a in &el.attributes {
        if let Some(p) = &a.prefix {
            utilized.push((p.clone(), a.namespace.clone().unwrap_or_default()));
        }
    }
    utilized.sort();
    utilized.dedup();

    let mut decls: Vec<(String, String)> = Vec::new();
    for (prefix, uri) in utilized {
        let current = rendered
            .iter()
            .rev()
            .find(|(p, _)| *p == prefix)
            .map(|(_, u)| u.as_str());
        let needed = match current {
            Some(u) => u != uri,
            // an unbound default namespace needs no xmlns=""
            None => !(prefix.is_empty() && uri.is_empty()),
        };
        if needed {
            decls.push((prefix, uri));
        }
    }
    // default namespace sorts first because "" < any prefix
    decls.sort();

    out.push('<');
    out.push_str(&el.qname());
    for (prefix, uri) in &decls {
        if prefix.is_empty() {
            out.push_str(" xmlns=\"");
        } else {
            out.push_str(" xmlns:");
            out.push_str(prefix);
            out.push_str("=\"");
        }
        escape_attr(uri, out);
        out.push('"');
        rendered.push((prefix.clone(), uri.clone()));
    }

    let mut attrs: Vec<_> = el.attributes.iter().collect();
    attrs.sort_by(|a, b| {
        (a.namespace.as_deref().unwrap_or(""), a.name.as_str())
            .cmp(&(b.namespace.as_deref().unwrap_or(""), b.name.as_str()))
    });
    for a in attrs {
        out.push(' ');
        if let Some(p) = &a.prefix {
            out.push_str(p);
            out.push(':');
        }
        out.push_str(&a.name);
        out.push_str("=\"");
        escape_attr(&a.value, out);
        out.push('"');
    }
    out.push('>');

    for child in &el.children {
        match child {
            Node::Element(e) if skip(e) => {}
            Node::Element(e) => write_element(e, skip, rendered, out),
            Node::Text(t) => escape_text(t, out),
        }
    }

    out.push_str("</");
    out.push_str(&el.qname());
    out.push('>');
    rendered.truncate(mark);
}

fn escape_text(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}

fn escape_attr(s: &str, out: &mut String) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#x9;"),
            '\n' => out.push_str("&#xA;"),
            '\r' => out.push_str("&#xD;"),
            c => out.push(c),
        }
    }
}
