//! Generic UBL 2.1 invoice / credit note validation.
//!
//! The root element selects the content model (`Invoice` or `CreditNote`).
//! After the schema pass, a list of business-rule transforms runs over the
//! document; each transform produces text, and any non-empty text is
//! recorded as a [`ErrorCategory::Stylesheet`] finding. Both passes always
//! run.

use std::str::FromStr;
use std::sync::OnceLock;

use rust_decimal::Decimal;
use tracing::debug;

use super::schema::*;
use super::{DocumentValidator, ErrorCategory, ValidationResult};
use crate::xml::{Element, ns};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UblDocumentKind {
    Invoice,
    CreditNote,
}

impl UblDocumentKind {
    pub fn detect(root: &Element) -> Option<Self> {
        if root.is(ns::UBL_INVOICE, "Invoice") {
            Some(Self::Invoice)
        } else if root.is(ns::UBL_CREDIT_NOTE, "CreditNote") {
            Some(Self::CreditNote)
        } else {
            None
        }
    }

    fn line_name(&self) -> &'static str {
        match self {
            Self::Invoice => "InvoiceLine",
            Self::CreditNote => "CreditNoteLine",
        }
    }

    fn type_code_name(&self) -> &'static str {
        match self {
            Self::Invoice => "InvoiceTypeCode",
            Self::CreditNote => "CreditNoteTypeCode",
        }
    }
}

/// A parsed UBL document handed to the transforms.
pub struct UblDocument<'a> {
    pub kind: UblDocumentKind,
    pub root: &'a Element,
}

impl UblDocument<'_> {
    fn cbc(&self, name: &str) -> Option<String> {
        self.root
            .child_text(ns::CBC, name)
            .filter(|v| !v.is_empty())
    }

    /// Text at a path of `cac` elements ending in a `cbc` element.
    fn path(&self, cac: &[&str], cbc: &str) -> Option<String> {
        let mut el = self.root;
        for name in cac {
            el = el.child(ns::CAC, name)?;
        }
        el.child_text(ns::CBC, cbc).filter(|v| !v.is_empty())
    }

    fn amount(&self, cac: &[&str], cbc: &str) -> Option<Decimal> {
        self.path(cac, cbc).and_then(|v| Decimal::from_str(&v).ok())
    }

    fn lines(&self) -> impl Iterator<Item = &Element> {
        self.root.children_named(ns::CAC, self.kind.line_name())
    }
}

/// A named business-rule pass. The output is empty when the document
/// satisfies every rule, otherwise one line per failed assertion.
#[derive(Clone)]
pub struct Transform {
    pub name: &'static str,
    rules: fn(&UblDocument<'_>) -> Vec<String>,
}

impl std::fmt::Debug for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish()
    }
}

impl Transform {
    pub fn new(name: &'static str, rules: fn(&UblDocument<'_>) -> Vec<String>) -> Self {
        Self { name, rules }
    }

    pub fn apply(&self, doc: &UblDocument<'_>) -> String {
        (self.rules)(doc).join("\n")
    }

    /// EN 16931 core rules.
    pub fn en16931() -> Self {
        Self::new("EN16931-UBL", en16931_rules)
    }

    /// German CIUS (XRechnung) rules.
    pub fn xrechnung() -> Self {
        Self::new("XRechnung-UBL", xrechnung_rules)
    }
}

/// Validator for UBL invoices and credit notes.
#[derive(Debug, Clone)]
pub struct UblValidator {
    transforms: Vec<Transform>,
}

impl Default for UblValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl UblValidator {
    /// Schema plus EN 16931 rules.
    pub fn new() -> Self {
        Self {
            transforms: vec![Transform::en16931()],
        }
    }

    /// Schema plus EN 16931 and XRechnung rules.
    pub fn xrechnung() -> Self {
        Self {
            transforms: vec![Transform::en16931(), Transform::xrechnung()],
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn validate_element(&self, root: &Element) -> ValidationResult {
        let mut result = ValidationResult::new();
        let Some(kind) = UblDocumentKind::detect(root) else {
            result.add(
                ErrorCategory::General,
                format!(
                    "Unrecognized document: expected UBL Invoice or CreditNote, found '{}'",
                    root.expanded_name()
                ),
            );
            return result;
        };

        result.extend(
            ErrorCategory::Schema,
            validate_document(ubl_schema(), root),
        );

        let doc = UblDocument { kind, root };
        for t in &self.transforms {
            let output = t.apply(&doc);
            if !output.trim().is_empty() {
                result.add(ErrorCategory::Stylesheet, format!("{}: {output}", t.name));
            }
        }

        debug!(kind = ?kind, errors = result.total(), "UBL document validated");
        result
    }
}

impl DocumentValidator for UblValidator {
    fn validate(&self, xml: &str) -> ValidationResult {
        match Element::parse(xml) {
            Ok(root) => self.validate_element(&root),
            Err(e) => {
                let mut result = ValidationResult::new();
                result.add(
                    ErrorCategory::General,
                    format!("Document is not well-formed XML: {e}"),
                );
                result
            }
        }
    }
}

// ── Content models ──

fn cbc(name: &'static str, ty: SimpleType) -> ElementDecl {
    ElementDecl::simple(ns::CBC, name, ty)
}

fn ubl_amount(name: &'static str) -> ElementDecl {
    cbc(
        name,
        SimpleType::Decimal {
            type_name: "xs:decimal",
            int_digits: 18,
            frac_digits: 6,
            signed: true,
        },
    )
    .with_attr("currencyID", true)
}

fn text() -> SimpleType {
    SimpleType::Text {
        min_len: 1,
        max_len: usize::MAX,
    }
}

fn monetary_total() -> ElementDecl {
    ElementDecl::open(
        ns::CAC,
        "LegalMonetaryTotal",
        vec![ubl_amount("PayableAmount")],
        vec![
            ubl_amount("LineExtensionAmount"),
            ubl_amount("TaxExclusiveAmount"),
            ubl_amount("TaxInclusiveAmount"),
            ubl_amount("AllowanceTotalAmount"),
            ubl_amount("ChargeTotalAmount"),
            ubl_amount("PrepaidAmount"),
        ],
    )
}

fn tax_total() -> ElementDecl {
    ElementDecl::open(ns::CAC, "TaxTotal", vec![ubl_amount("TaxAmount")], vec![])
}

fn line(name: &'static str) -> ElementDecl {
    ElementDecl::open(
        ns::CAC,
        name,
        vec![cbc("ID", text()), ubl_amount("LineExtensionAmount")],
        vec![],
    )
}

fn party(name: &'static str) -> ElementDecl {
    ElementDecl::open(ns::CAC, name, vec![ElementDecl::any(ns::CAC, "Party")], vec![])
}

fn document(namespace: &'static str, root: &'static str, kind: UblDocumentKind) -> ElementDecl {
    ElementDecl::open(
        namespace,
        root,
        vec![
            cbc("ID", text()),
            cbc("IssueDate", SimpleType::IsoDate),
            party("AccountingSupplierParty"),
            party("AccountingCustomerParty"),
            monetary_total(),
            line(kind.line_name()),
        ],
        vec![
            cbc("DueDate", SimpleType::IsoDate),
            cbc(kind.type_code_name(), text()),
            cbc(
                "DocumentCurrencyCode",
                SimpleType::Text {
                    min_len: 3,
                    max_len: 3,
                },
            ),
            tax_total(),
        ],
    )
}

fn ubl_schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| Schema {
        roots: vec![
            document(ns::UBL_INVOICE, "Invoice", UblDocumentKind::Invoice),
            document(ns::UBL_CREDIT_NOTE, "CreditNote", UblDocumentKind::CreditNote),
        ],
    })
}

// ── Business rules ──

fn en16931_rules(doc: &UblDocument<'_>) -> Vec<String> {
    let mut out = Vec::new();
    let mut assert = |ok: bool, rule: &str, text: &str| {
        if !ok {
            out.push(format!("[{rule}] {text}"));
        }
    };

    assert(
        doc.cbc("CustomizationID").is_some(),
        "BR-01",
        "An Invoice shall have a Specification identifier (BT-24).",
    );
    assert(
        doc.cbc("ID").is_some(),
        "BR-02",
        "An Invoice shall have an Invoice number (BT-1).",
    );
    assert(
        doc.cbc("IssueDate").is_some(),
        "BR-03",
        "An Invoice shall have an Invoice issue date (BT-2).",
    );
    assert(
        doc.cbc(doc.kind.type_code_name()).is_some(),
        "BR-04",
        "An Invoice shall have an Invoice type code (BT-3).",
    );
    assert(
        doc.cbc("DocumentCurrencyCode").is_some(),
        "BR-05",
        "An Invoice shall have an Invoice currency code (BT-5).",
    );
    assert(
        doc.path(
            &["AccountingSupplierParty", "Party", "PartyLegalEntity"],
            "RegistrationName",
        )
        .is_some(),
        "BR-06",
        "An Invoice shall contain the Seller name (BT-27).",
    );
    assert(
        doc.path(
            &["AccountingCustomerParty", "Party", "PartyLegalEntity"],
            "RegistrationName",
        )
        .is_some(),
        "BR-07",
        "An Invoice shall contain the Buyer name (BT-44).",
    );
    assert(
        doc.path(
            &["AccountingSupplierParty", "Party", "PostalAddress", "Country"],
            "IdentificationCode",
        )
        .is_some(),
        "BR-09",
        "The Seller postal address shall contain a Seller country code (BT-40).",
    );
    assert(
        doc.lines().next().is_some(),
        "BR-16",
        "An Invoice shall have at least one Invoice line (BG-25).",
    );

    let line_sum: Option<Decimal> = doc
        .lines()
        .map(|l| {
            l.child_text(ns::CBC, "LineExtensionAmount")
                .and_then(|v| Decimal::from_str(&v).ok())
        })
        .sum();
    if let (Some(sum), Some(declared)) = (
        line_sum,
        doc.amount(&["LegalMonetaryTotal"], "LineExtensionAmount"),
    ) {
        assert(
            sum == declared,
            "BR-CO-10",
            "Sum of Invoice line net amount (BT-106) = Σ Invoice line net amount (BT-131).",
        );
    }

    if let (Some(excl), Some(incl), Some(tax)) = (
        doc.amount(&["LegalMonetaryTotal"], "TaxExclusiveAmount"),
        doc.amount(&["LegalMonetaryTotal"], "TaxInclusiveAmount"),
        doc.amount(&["TaxTotal"], "TaxAmount"),
    ) {
        assert(
            excl + tax == incl,
            "BR-CO-15",
            "Invoice total amount with VAT (BT-112) = Invoice total amount without VAT (BT-109) + Invoice total VAT amount (BT-110).",
        );
    }

    out
}

fn xrechnung_rules(doc: &UblDocument<'_>) -> Vec<String> {
    let mut out = Vec::new();
    let mut assert = |ok: bool, rule: &str, text: &str| {
        if !ok {
            out.push(format!("[{rule}] {text}"));
        }
    };

    assert(
        doc.root.child(ns::CAC, "PaymentMeans").is_some(),
        "BR-DE-1",
        "An Invoice must contain information on PAYMENT INSTRUCTIONS (BG-16).",
    );
    assert(
        doc.root
            .child(ns::CAC, "AccountingSupplierParty")
            .and_then(|p| p.child(ns::CAC, "Party"))
            .and_then(|p| p.child(ns::CAC, "Contact"))
            .is_some(),
        "BR-DE-2",
        "The group SELLER CONTACT (BG-6) must be transmitted.",
    );
    assert(
        doc.cbc("BuyerReference").is_some(),
        "BR-DE-15",
        "The element Buyer reference (BT-10) must be transmitted.",
    );
    if let Some(code) = doc.cbc(doc.kind.type_code_name()) {
        assert(
            ["326", "380", "381", "384", "389", "875", "876", "877"].contains(&code.as_str()),
            "BR-DE-17",
            "The document type code (BT-3) must be one of 326, 380, 381, 384, 389, 875, 876, 877.",
        );
    }
    assert(
        doc.cbc("CustomizationID")
            .is_some_and(|c| c.contains("xrechnung")),
        "BR-DE-21",
        "The Specification identifier (BT-24) must reference the XRechnung standard.",
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoice(extra: &str) -> String {
        format!(
            r#"<Invoice xmlns="{}" xmlns:cac="{}" xmlns:cbc="{}">
  <cbc:CustomizationID>urn:cen.eu:en16931:2017</cbc:CustomizationID>
  <cbc:ID>INV-1</cbc:ID>
  <cbc:IssueDate>2025-08-10</cbc:IssueDate>
  <cbc:InvoiceTypeCode>380</cbc:InvoiceTypeCode>
  <cbc:DocumentCurrencyCode>EUR</cbc:DocumentCurrencyCode>
  <cac:AccountingSupplierParty><cac:Party>
    <cac:PostalAddress><cac:Country><cbc:IdentificationCode>ES</cbc:IdentificationCode></cac:Country></cac:PostalAddress>
    <cac:PartyLegalEntity><cbc:RegistrationName>Seller</cbc:RegistrationName></cac:PartyLegalEntity>
  </cac:Party></cac:AccountingSupplierParty>
  <cac:AccountingCustomerParty><cac:Party>
    <cac:PartyLegalEntity><cbc:RegistrationName>Buyer</cbc:RegistrationName></cac:PartyLegalEntity>
  </cac:Party></cac:AccountingCustomerParty>
  <cac:TaxTotal><cbc:TaxAmount currencyID="EUR">21.00</cbc:TaxAmount></cac:TaxTotal>
  <cac:LegalMonetaryTotal>
    <cbc:LineExtensionAmount currencyID="EUR">100.00</cbc:LineExtensionAmount>
    <cbc:TaxExclusiveAmount currencyID="EUR">100.00</cbc:TaxExclusiveAmount>
    <cbc:TaxInclusiveAmount currencyID="EUR">121.00</cbc:TaxInclusiveAmount>
    <cbc:PayableAmount currencyID="EUR">121.00</cbc:PayableAmount>
  </cac:LegalMonetaryTotal>
  <cac:InvoiceLine><cbc:ID>1</cbc:ID><cbc:LineExtensionAmount currencyID="EUR">100.00</cbc:LineExtensionAmount></cac:InvoiceLine>
  {extra}
</Invoice>"#,
            ns::UBL_INVOICE,
            ns::CAC,
            ns::CBC
        )
    }

    #[test]
    fn valid_invoice() {
        let result = UblValidator::new().validate(&invoice(""));
        assert!(result.is_valid(), "{:?}", result.errors);
    }

    #[test]
    fn schema_and_rules_both_reported() {
        let xml = invoice("").replace("<cbc:ID>INV-1</cbc:ID>", "");
        let result = UblValidator::new().validate(&xml);
        assert_eq!(result.count(ErrorCategory::Schema), 1);
        assert_eq!(result.count(ErrorCategory::Stylesheet), 1);
        assert!(result.messages(ErrorCategory::Stylesheet)[0].contains("[BR-02]"));
    }

    #[test]
    fn totals_rule() {
        let xml = invoice("").replace(
            r#"<cbc:TaxInclusiveAmount currencyID="EUR">121.00"#,
            r#"<cbc:TaxInclusiveAmount currencyID="EUR">120.00"#,
        );
        let result = UblValidator::new().validate(&xml);
        assert_eq!(result.count(ErrorCategory::Schema), 0);
        assert!(result.messages(ErrorCategory::Stylesheet)[0].contains("BR-CO-15"));
    }

    #[test]
    fn xrechnung_transform_adds_german_rules() {
        let result = UblValidator::xrechnung().validate(&invoice(""));
        let msgs = result.messages(ErrorCategory::Stylesheet);
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].starts_with("XRechnung-UBL: "));
        assert!(msgs[0].contains("[BR-DE-15]"));
    }

    #[test]
    fn unknown_root_is_general() {
        let result = UblValidator::new().validate("<Foo/>");
        assert_eq!(result.count(ErrorCategory::General), 1);
    }
}
