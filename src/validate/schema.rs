//! Declarative content-model validation over [`Element`] trees.
//!
//! Schemas are plain data: element declarations with simple or complex
//! content, sequences and choices with occurrence bounds, and a handful of
//! simple types. Messages follow the wording of libxml2 so that they read
//! the same as the errors of the official XSD toolchain.
//!
//! Like libxml2, a parent stops checking its content model at the first
//! mismatch, but value errors in different elements are all reported.

use crate::core::format::is_schema_date;
use crate::xml::Element;

pub const UNBOUNDED: u32 = u32::MAX;

/// A set of global element declarations.
#[derive(Debug, Clone)]
pub struct Schema {
    pub roots: Vec<ElementDecl>,
}

#[derive(Debug, Clone)]
pub struct ElementDecl {
    pub namespace: &'static str,
    pub name: &'static str,
    pub content: Content,
    pub attributes: Vec<AttributeDecl>,
}

#[derive(Debug, Clone)]
pub struct AttributeDecl {
    pub name: &'static str,
    pub required: bool,
}

#[derive(Debug, Clone)]
pub enum Content {
    /// Text only, constrained by a simple type.
    Simple(SimpleType),
    /// Element-only content described by a particle.
    Complex(Particle),
    /// Listed elements are checked where present and the required ones must
    /// appear; anything else is accepted.
    Open {
        required: Vec<ElementDecl>,
        optional: Vec<ElementDecl>,
    },
    /// Not validated.
    Any,
}

#[derive(Debug, Clone)]
pub enum Particle {
    Element {
        decl: Box<ElementDecl>,
        min: u32,
        max: u32,
    },
    Sequence {
        items: Vec<Particle>,
        min: u32,
        max: u32,
    },
    Choice {
        items: Vec<Particle>,
        min: u32,
        max: u32,
    },
}

#[derive(Debug, Clone)]
pub enum SimpleType {
    /// String with length bounds; equal bounds are a `length` facet.
    Text {
        min_len: usize,
        max_len: usize,
    },
    Enumeration(&'static [&'static str]),
    /// Decimal with at most `int_digits` before and `frac_digits` after the point.
    Decimal {
        type_name: &'static str,
        int_digits: usize,
        frac_digits: usize,
        signed: bool,
    },
    /// `DD-MM-YYYY`.
    Date,
    /// `xs:dateTime`.
    DateTime,
    /// `xs:date` (`YYYY-MM-DD`).
    IsoDate,
}

// ── Construction helpers ──

impl ElementDecl {
    pub fn simple(namespace: &'static str, name: &'static str, ty: SimpleType) -> Self {
        Self {
            namespace,
            name,
            content: Content::Simple(ty),
            attributes: Vec::new(),
        }
    }

    pub fn complex(namespace: &'static str, name: &'static str, particle: Particle) -> Self {
        Self {
            namespace,
            name,
            content: Content::Complex(particle),
            attributes: Vec::new(),
        }
    }

    pub fn open(
        namespace: &'static str,
        name: &'static str,
        required: Vec<ElementDecl>,
        optional: Vec<ElementDecl>,
    ) -> Self {
        Self {
            namespace,
            name,
            content: Content::Open { required, optional },
            attributes: Vec::new(),
        }
    }

    pub fn any(namespace: &'static str, name: &'static str) -> Self {
        Self {
            namespace,
            name,
            content: Content::Any,
            attributes: Vec::new(),
        }
    }

    pub fn with_attr(mut self, name: &'static str, required: bool) -> Self {
        self.attributes.push(AttributeDecl { name, required });
        self
    }

    fn expanded(&self) -> String {
        format!("{{{}}}{}", self.namespace, self.name)
    }

    fn matches(&self, el: &Element) -> bool {
        el.is(self.namespace, self.name)
    }
}

impl Particle {
    pub fn one(decl: ElementDecl) -> Self {
        Self::Element {
            decl: Box::new(decl),
            min: 1,
            max: 1,
        }
    }

    pub fn opt(decl: ElementDecl) -> Self {
        Self::Element {
            decl: Box::new(decl),
            min: 0,
            max: 1,
        }
    }

    pub fn many(decl: ElementDecl, min: u32, max: u32) -> Self {
        Self::Element {
            decl: Box::new(decl),
            min,
            max,
        }
    }

    pub fn seq(items: Vec<Particle>) -> Self {
        Self::Sequence {
            items,
            min: 1,
            max: 1,
        }
    }

    pub fn choice(items: Vec<Particle>) -> Self {
        Self::Choice {
            items,
            min: 1,
            max: 1,
        }
    }

    /// Same particle with different occurrence bounds.
    pub fn occurs(self, min: u32, max: u32) -> Self {
        match self {
            Self::Element { decl, .. } => Self::Element { decl, min, max },
            Self::Sequence { items, .. } => Self::Sequence { items, min, max },
            Self::Choice { items, .. } => Self::Choice { items, min, max },
        }
    }

    fn bounds(&self) -> (u32, u32) {
        match self {
            Self::Element { min, max, .. }
            | Self::Sequence { min, max, .. }
            | Self::Choice { min, max, .. } => (*min, *max),
        }
    }

    /// True if one occurrence of the particle body can match nothing.
    fn body_nullable(&self) -> bool {
        match self {
            Self::Element { .. } => false,
            Self::Sequence { items, .. } => items.iter().all(|p| p.nullable()),
            Self::Choice { items, .. } => items.iter().any(|p| p.nullable()),
        }
    }

    fn nullable(&self) -> bool {
        self.bounds().0 == 0 || self.body_nullable()
    }

    /// Element names that can start one occurrence of the body.
    fn first(&self, out: &mut Vec<String>) {
        match self {
            Self::Element { decl, .. } => out.push(decl.expanded()),
            Self::Sequence { items, .. } => {
                for p in items {
                    p.first(out);
                    if !p.nullable() {
                        break;
                    }
                }
            }
            Self::Choice { items, .. } => {
                for p in items {
                    p.first(out);
                }
            }
        }
    }

    fn can_start(&self, el: &Element) -> bool {
        match self {
            Self::Element { decl, .. } => decl.matches(el),
            Self::Sequence { items, .. } => {
                for p in items {
                    if p.can_start(el) {
                        return true;
                    }
                    if !p.nullable() {
                        return false;
                    }
                }
                false
            }
            Self::Choice { items, .. } => items.iter().any(|p| p.can_start(el)),
        }
    }
}

// ── Validation ──

/// Validate a document root against `schema`. Returns libxml2-style messages.
pub fn validate_document(schema: &Schema, root: &Element) -> Vec<String> {
    let mut errors = Vec::new();
    match schema.roots.iter().find(|d| d.matches(root)) {
        Some(decl) => validate_element(decl, root, &mut errors),
        None => errors.push(format!(
            "Element '{}': No matching global declaration available for the validation root.",
            root.expanded_name()
        )),
    }
    errors
}

/// Validate one element against its declaration.
pub fn validate_element(decl: &ElementDecl, el: &Element, errors: &mut Vec<String>) {
    let name = el.expanded_name();

    for attr in decl.attributes.iter().filter(|a| a.required) {
        if el.attr(attr.name).is_none() {
            errors.push(format!(
                "Element '{name}': The attribute '{}' is required but missing.",
                attr.name
            ));
        }
    }

    match &decl.content {
        Content::Any => {}
        Content::Simple(ty) => {
            if el.elements().next().is_some() {
                errors.push(format!(
                    "Element '{name}': Element content is not allowed, because the content type is a simple type definition."
                ));
                return;
            }
            if let Some(msg) = check_simple(ty, &el.text()) {
                errors.push(format!("Element '{name}': {msg}"));
            }
        }
        Content::Complex(particle) => {
            if el.has_text() {
                errors.push(format!(
                    "Element '{name}': Character content other than whitespace is not allowed because the content type is 'element-only'."
                ));
            }
            let children: Vec<&Element> = el.elements().collect();
            let mut pos = 0;
            let outcome = match_particle(particle, &children, &mut pos, errors);
            match outcome {
                Err(Mismatch::Missing(expected)) => {
                    errors.push(match children.get(pos) {
                        Some(child) => format!(
                            "Element '{}': This element is not expected. Expected is {}.",
                            child.expanded_name(),
                            expected_list(&expected)
                        ),
                        None => format!(
                            "Element '{name}': Missing child element(s). Expected is {}.",
                            expected_list(&expected)
                        ),
                    });
                }
                Ok(()) => {
                    if let Some(child) = children.get(pos) {
                        errors.push(format!(
                            "Element '{}': This element is not expected.",
                            child.expanded_name()
                        ));
                    }
                }
            }
        }
        Content::Open { required, optional } => {
            if el.has_text() {
                errors.push(format!(
                    "Element '{name}': Character content other than whitespace is not allowed because the content type is 'element-only'."
                ));
            }
            let missing: Vec<String> = required
                .iter()
                .filter(|d| !el.elements().any(|c| d.matches(c)))
                .map(|d| d.expanded())
                .collect();
            if !missing.is_empty() {
                errors.push(format!(
                    "Element '{name}': Missing child element(s). Expected is {}.",
                    expected_list(&missing)
                ));
            }
            for child in el.elements() {
                if let Some(d) = required.iter().chain(optional).find(|d| d.matches(child)) {
                    validate_element(d, child, errors);
                }
            }
        }
    }
}

enum Mismatch {
    /// Required content absent at the current position; carries what was expected.
    Missing(Vec<String>),
}

fn match_particle(
    p: &Particle,
    children: &[&Element],
    pos: &mut usize,
    errors: &mut Vec<String>,
) -> Result<(), Mismatch> {
    let (min, max) = p.bounds();
    let mut count = 0u32;
    while count < max {
        let start = *pos;
        let starts_here = children.get(*pos).is_some_and(|c| p.can_start(c));
        if !starts_here {
            // an occurrence that matches nothing still satisfies the minimum
            if count < min && !p.body_nullable() {
                let mut expected = Vec::new();
                p.first(&mut expected);
                return Err(Mismatch::Missing(expected));
            }
            break;
        }
        match_body(p, children, pos, errors)?;
        count += 1;
        if *pos == start {
            break;
        }
    }
    Ok(())
}

fn match_body(
    p: &Particle,
    children: &[&Element],
    pos: &mut usize,
    errors: &mut Vec<String>,
) -> Result<(), Mismatch> {
    match p {
        Particle::Element { decl, .. } => {
            validate_element(decl, children[*pos], errors);
            *pos += 1;
            Ok(())
        }
        Particle::Sequence { items, .. } => {
            for item in items {
                match_particle(item, children, pos, errors)?;
            }
            Ok(())
        }
        Particle::Choice { items, .. } => {
            let chosen = children
                .get(*pos)
                .and_then(|c| items.iter().find(|i| i.can_start(c)));
            match chosen {
                Some(item) => match_particle(item, children, pos, errors),
                None => {
                    let mut expected = Vec::new();
                    p.first(&mut expected);
                    Err(Mismatch::Missing(expected))
                }
            }
        }
    }
}

fn expected_list(names: &[String]) -> String {
    if names.len() == 1 {
        format!("( {} )", names[0])
    } else {
        format!("one of ( {} )", names.join(", "))
    }
}

/// Check a text value; `None` if valid, otherwise the message after the element prefix.
pub fn check_simple(ty: &SimpleType, raw: &str) -> Option<String> {
    let value = raw.trim();
    match ty {
        SimpleType::Text { min_len, max_len } => {
            let len = value.chars().count();
            if min_len == max_len && len != *min_len {
                Some(format!(
                    "[facet 'length'] The value '{value}' has a length of '{len}'; this differs from the allowed length of '{min_len}'."
                ))
            } else if len < *min_len {
                Some(format!(
                    "[facet 'minLength'] The value '{value}' has a length of '{len}'; this underruns the allowed minimum length of '{min_len}'."
                ))
            } else if len > *max_len {
                Some(format!(
                    "[facet 'maxLength'] The value '{value}' has a length of '{len}'; this exceeds the allowed maximum length of '{max_len}'."
                ))
            } else {
                None
            }
        }
        SimpleType::Enumeration(values) => {
            if values.contains(&value) {
                None
            } else {
                let set = values
                    .iter()
                    .map(|v| format!("'{v}'"))
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!(
                    "[facet 'enumeration'] The value '{value}' is not an element of the set {{{set}}}."
                ))
            }
        }
        SimpleType::Decimal {
            type_name,
            int_digits,
            frac_digits,
            signed,
        } => check_decimal(value, type_name, *int_digits, *frac_digits, *signed),
        SimpleType::Date => {
            if is_schema_date(value) {
                None
            } else {
                Some(format!(
                    "[facet 'pattern'] The value '{value}' is not accepted by the pattern '\\d{{2,2}}-\\d{{2,2}}-\\d{{4,4}}'."
                ))
            }
        }
        SimpleType::IsoDate => {
            if chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok() {
                None
            } else {
                Some(format!(
                    "'{value}' is not a valid value of the atomic type 'xs:date'."
                ))
            }
        }
        SimpleType::DateTime => {
            if chrono::DateTime::parse_from_rfc3339(value).is_ok() {
                None
            } else {
                Some(format!(
                    "'{value}' is not a valid value of the atomic type 'xs:dateTime'."
                ))
            }
        }
    }
}

fn check_decimal(
    value: &str,
    type_name: &str,
    int_digits: usize,
    frac_digits: usize,
    signed: bool,
) -> Option<String> {
    let unsigned = value.strip_prefix(['+', '-']).unwrap_or(value);
    let (int_part, frac_part) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let is_decimal = !value.is_empty()
        && (!int_part.is_empty() || !frac_part.is_empty())
        && int_part.chars().all(|c| c.is_ascii_digit())
        && frac_part.chars().all(|c| c.is_ascii_digit());
    if !is_decimal {
        return Some(format!(
            "'{value}' is not a valid value of the atomic type '{type_name}'."
        ));
    }
    let sign_ok = signed || !value.starts_with('-');
    if !sign_ok
        || int_part.is_empty()
        || int_part.len() > int_digits
        || frac_part.len() > frac_digits
    {
        let sign = if signed { "(\\+|-)?" } else { "" };
        return Some(format!(
            "[facet 'pattern'] The value '{value}' is not accepted by the pattern '{sign}\\d{{1,{int_digits}}}(\\.\\d{{0,{frac_digits}}})?'."
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "urn:t";

    fn schema() -> Schema {
        let item = ElementDecl::complex(
            NS,
            "Item",
            Particle::seq(vec![
                Particle::one(ElementDecl::simple(
                    NS,
                    "Code",
                    SimpleType::Enumeration(&["A", "B"]),
                )),
                Particle::opt(ElementDecl::simple(
                    NS,
                    "Note",
                    SimpleType::Text {
                        min_len: 1,
                        max_len: 5,
                    },
                )),
                Particle::choice(vec![
                    Particle::one(ElementDecl::simple(
                        NS,
                        "Amount",
                        SimpleType::Decimal {
                            type_name: "Amount12.2",
                            int_digits: 12,
                            frac_digits: 2,
                            signed: true,
                        },
                    )),
                    Particle::one(ElementDecl::simple(NS, "Date", SimpleType::Date)),
                ]),
            ]),
        );
        Schema {
            roots: vec![ElementDecl::complex(
                NS,
                "Root",
                Particle::many(item, 1, UNBOUNDED),
            )
            .with_attr("version", true)],
        }
    }

    fn run(xml: &str) -> Vec<String> {
        validate_document(&schema(), &Element::parse(xml).unwrap())
    }

    #[test]
    fn valid_document() {
        let errors = run(
            r#"<Root xmlns="urn:t" version="1"><Item><Code>A</Code><Amount>1.50</Amount></Item><Item><Code>B</Code><Note>x</Note><Date>01-02-2025</Date></Item></Root>"#,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn missing_child_at_end() {
        let errors = run(r#"<Root xmlns="urn:t" version="1"><Item><Code>A</Code></Item></Root>"#);
        assert_eq!(
            errors,
            ["Element '{urn:t}Item': Missing child element(s). Expected is one of ( {urn:t}Amount, {urn:t}Date )."]
        );
    }

    #[test]
    fn unexpected_element() {
        let errors = run(
            r#"<Root xmlns="urn:t" version="1"><Item><Amount>1</Amount></Item></Root>"#,
        );
        assert_eq!(
            errors,
            ["Element '{urn:t}Amount': This element is not expected. Expected is ( {urn:t}Code )."]
        );
    }

    #[test]
    fn value_errors_are_independent() {
        let errors = run(
            r#"<Root xmlns="urn:t"><Item><Code>C</Code><Note>toolong</Note><Amount>abc</Amount></Item></Root>"#,
        );
        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors[0].contains("The attribute 'version' is required but missing"));
        assert!(errors[1].contains("[facet 'enumeration'] The value 'C'"));
        assert!(errors[2].contains("[facet 'maxLength']"));
        assert!(errors[3].contains("'abc' is not a valid value of the atomic type 'Amount12.2'"));
    }

    #[test]
    fn text_in_element_only_content() {
        let errors = run(
            r#"<Root xmlns="urn:t" version="1">oops<Item><Code>A</Code><Amount>1</Amount></Item></Root>"#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Character content other than whitespace"));
    }

    #[test]
    fn unknown_root() {
        let errors = run(r#"<Other/>"#);
        assert!(errors[0].contains("No matching global declaration"));
    }

    #[test]
    fn decimal_facets() {
        let ty = SimpleType::Decimal {
            type_name: "T",
            int_digits: 3,
            frac_digits: 2,
            signed: false,
        };
        assert!(check_simple(&ty, "21").is_none());
        assert!(check_simple(&ty, "21.00").is_none());
        assert!(check_simple(&ty, "1000").unwrap().contains("facet 'pattern'"));
        assert!(check_simple(&ty, "1.234").unwrap().contains("facet 'pattern'"));
        assert!(check_simple(&ty, "-1").unwrap().contains("facet 'pattern'"));
        assert!(check_simple(&ty, "1e3").unwrap().contains("atomic type"));
        assert!(check_simple(&ty, "").unwrap().contains("atomic type"));
    }
}
