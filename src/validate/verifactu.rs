use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use super::messages::{self, humanize};
use super::schema::validate_document;
use super::verifactu_schema::verifactu_schema;
use super::{DocumentValidator, ErrorCategory, ValidationResult};
use crate::core::format::is_schema_date;
use crate::xml::{Element, ns};

/// Shape of a Verifactu payload, decided from its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Registration,
    Cancellation,
    /// `RegistroAlta` with `TipoFactura` R1 or F3. The official schema does
    /// not cover every shape of these, so they get hand-written checks.
    Modification,
    Unknown,
}

/// Invoice types handled as modifications.
const MODIFICATION_TYPES: &[&str] = &["R1", "F3"];

/// Validator for Verifactu records, bare or wrapped in a SOAP envelope.
///
/// Registrations and cancellations are checked against the record schema;
/// modifications go through three staged checks instead (structure,
/// references, business rules). A stage only runs when the previous one
/// found nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct VerifactuValidator;

impl VerifactuValidator {
    pub fn new() -> Self {
        Self
    }

    /// The record element inside `root`, or `root` itself.
    pub fn extract_payload(root: &Element) -> Option<&Element> {
        root.find(ns::SUM1, "RegistroAlta")
            .or_else(|| root.find(ns::SUM1, "RegistroAnulacion"))
    }

    pub fn classify(root: &Element) -> DocumentKind {
        match Self::extract_payload(root) {
            Some(p) if p.name == "RegistroAnulacion" => DocumentKind::Cancellation,
            Some(p) => match p.child_text(ns::SUM1, "TipoFactura") {
                Some(t) if MODIFICATION_TYPES.contains(&t.as_str()) => DocumentKind::Modification,
                _ => DocumentKind::Registration,
            },
            None => DocumentKind::Unknown,
        }
    }

    /// Validate an already parsed document.
    pub fn validate_element(&self, root: &Element) -> ValidationResult {
        let mut result = ValidationResult::new();
        let kind = Self::classify(root);

        match (kind, Self::extract_payload(root)) {
            (DocumentKind::Registration | DocumentKind::Cancellation, Some(payload)) => {
                result.extend(
                    ErrorCategory::Schema,
                    validate_document(verifactu_schema(), payload)
                        .iter()
                        .map(|m| humanize(m)),
                );
            }
            (DocumentKind::Modification, Some(payload)) => {
                validate_modification(payload, &mut result);
            }
            _ => result.add(
                ErrorCategory::General,
                format!(
                    "Unrecognized document: expected RegistroAlta or RegistroAnulacion, found '{}'",
                    root.name
                ),
            ),
        }

        debug!(kind = ?kind, errors = result.total(), "verifactu document validated");
        result
    }

    /// Context for one of this validator's messages.
    pub fn explain(&self, error: &str) -> &'static str {
        messages::explain(error)
    }

    /// Remediation hint for one of this validator's messages.
    pub fn suggest(&self, error: &str) -> &'static str {
        messages::suggest(error)
    }
}

impl DocumentValidator for VerifactuValidator {
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

fn validate_modification(alta: &Element, result: &mut ValidationResult) {
    let before = result.total();
    check_structure(alta, result);
    if result.total() > before {
        return;
    }
    check_references(alta, result);
    if result.total() > before {
        return;
    }
    check_business_rules(alta, result);
}

fn structural(result: &mut ValidationResult, msg: String) {
    result.add(ErrorCategory::Structural, humanize(&msg));
}

fn business(result: &mut ValidationResult, msg: String) {
    result.add(ErrorCategory::Business, humanize(&msg));
}

/// Stage 1: mandatory elements and an admissible invoice type.
fn check_structure(alta: &Element, result: &mut ValidationResult) {
    for name in ["TipoFactura", "DescripcionOperacion", "ImporteTotal"] {
        if alta.child(ns::SUM1, name).is_none() {
            structural(
                result,
                format!("Missing required element '{name}' in 'RegistroAlta'"),
            );
        }
    }
    if let Some(t) = alta.child_text(ns::SUM1, "TipoFactura") {
        if !MODIFICATION_TYPES.contains(&t.as_str()) {
            structural(
                result,
                format!("'TipoFactura' must be R1 or F3 for a modification, found '{t}'"),
            );
        }
    }
}

/// Stage 2: referenced invoices and breakdown detail.
fn check_references(alta: &Element, result: &mut ValidationResult) {
    let substitution = alta.child_text(ns::SUM1, "TipoFactura").as_deref() == Some("F3");
    let lists: &[(&str, &str)] = if substitution {
        &[
            ("FacturasSustituidas", "IDFacturaSustituida"),
            ("FacturasRectificadas", "IDFacturaRectificada"),
        ]
    } else {
        &[("FacturasRectificadas", "IDFacturaRectificada")]
    };

    let mut refs: Vec<(&str, &Element)> = Vec::new();
    for (list, item) in lists {
        if let Some(l) = alta.child(ns::SUM1, list) {
            refs.extend(l.children_named(ns::SUM1, item).map(|e| (*item, e)));
        }
    }
    if refs.is_empty() {
        structural(
            result,
            format!(
                "At least one '{}' is required in '{}'",
                lists[0].1, lists[0].0
            ),
        );
    }
    for (i, (item, r)) in refs.iter().enumerate() {
        for field in ["IDEmisorFactura", "NumSerieFactura", "FechaExpedicionFactura"] {
            if r.child_text(ns::SUM1, field).is_none_or(|v| v.is_empty()) {
                structural(
                    result,
                    format!("Missing required element '{field}' in '{item}' #{}", i + 1),
                );
            }
        }
    }

    if let Some(desglose) = alta.child(ns::SUM1, "Desglose") {
        if desglose.child(ns::SUM1, "DetalleDesglose").is_none() {
            structural(
                result,
                "Missing required element 'DetalleDesglose' in 'Desglose'".to_string(),
            );
        }
    }
}

fn is_number(s: &str) -> bool {
    Decimal::from_str(s).is_ok()
}

/// Stage 3: amounts and dates.
fn check_business_rules(alta: &Element, result: &mut ValidationResult) {
    if let Some(total) = alta.child_text(ns::SUM1, "ImporteTotal") {
        match Decimal::from_str(&total) {
            Ok(v) if v > Decimal::ZERO => {}
            Ok(_) => business(
                result,
                format!("'ImporteTotal' must be greater than zero, found '{total}'"),
            ),
            Err(_) => business(
                result,
                format!("'ImporteTotal' must be numeric, found '{total}'"),
            ),
        }
    }

    if let Some(v) = alta
        .child(ns::SUM1, "ImporteRectificacion")
        .and_then(|b| b.child_text(ns::SUM1, "CuotaRecargoRectificado"))
    {
        if !is_number(&v) {
            business(
                result,
                format!("'CuotaRecargoRectificado' must be numeric, found '{v}'"),
            );
        }
    }
    if let Some(desglose) = alta.child(ns::SUM1, "Desglose") {
        for d in desglose.children_named(ns::SUM1, "DetalleDesglose") {
            if let Some(v) = d.child_text(ns::SUM1, "CuotaRecargoEquivalencia") {
                if !is_number(&v) {
                    business(
                        result,
                        format!("'CuotaRecargoEquivalencia' must be numeric, found '{v}'"),
                    );
                }
            }
        }
    }

    if let Some(v) = alta.child_text(ns::SUM1, "FechaOperacion") {
        if !is_schema_date(&v) {
            business(
                result,
                format!("'FechaOperacion' must match DD-MM-YYYY, found '{v}'"),
            );
        }
    }
    if let Some(v) = alta
        .child(ns::SUM1, "IDFactura")
        .and_then(|id| id.child_text(ns::SUM1, "FechaExpedicionFactura"))
    {
        if !is_schema_date(&v) {
            business(
                result,
                format!("'FechaExpedicionFactura' must match DD-MM-YYYY, found '{v}'"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> String {
        format!(
            r#"<sum1:RegistroAlta xmlns:sum1="{}">{body}</sum1:RegistroAlta>"#,
            ns::SUM1
        )
    }

    fn modification(extra: &str) -> String {
        doc(&format!(
            "<sum1:IDFactura><sum1:FechaExpedicionFactura>10-08-2025</sum1:FechaExpedicionFactura></sum1:IDFactura>\
             <sum1:TipoFactura>R1</sum1:TipoFactura>\
             <sum1:FacturasRectificadas><sum1:IDFacturaRectificada>\
             <sum1:IDEmisorFactura>A39200019</sum1:IDEmisorFactura>\
             <sum1:NumSerieFactura>F-1</sum1:NumSerieFactura>\
             <sum1:FechaExpedicionFactura>01-08-2025</sum1:FechaExpedicionFactura>\
             </sum1:IDFacturaRectificada></sum1:FacturasRectificadas>\
             <sum1:DescripcionOperacion>Correccion</sum1:DescripcionOperacion>\
             {extra}"
        ))
    }

    #[test]
    fn classification() {
        let kind = |xml: &str| VerifactuValidator::classify(&Element::parse(xml).unwrap());
        assert_eq!(
            kind(&doc("<sum1:TipoFactura>F1</sum1:TipoFactura>")),
            DocumentKind::Registration
        );
        assert_eq!(
            kind(&doc("<sum1:TipoFactura>R1</sum1:TipoFactura>")),
            DocumentKind::Modification
        );
        assert_eq!(
            kind(&doc("<sum1:TipoFactura>F3</sum1:TipoFactura>")),
            DocumentKind::Modification
        );
        assert_eq!(
            kind(&doc("<sum1:TipoFactura>R2</sum1:TipoFactura>")),
            DocumentKind::Registration
        );
        assert_eq!(
            kind(&format!(
                r#"<sf:RegistroAnulacion xmlns:sf="{}"/>"#,
                ns::SUM1
            )),
            DocumentKind::Cancellation
        );
        assert_eq!(kind("<Invoice/>"), DocumentKind::Unknown);
    }

    #[test]
    fn modification_passes_staged_checks() {
        let result = VerifactuValidator::new()
            .validate(&modification("<sum1:ImporteTotal>121.00</sum1:ImporteTotal>"));
        assert!(result.is_valid(), "{}", result.summary());
    }

    #[test]
    fn modification_missing_total_is_structural() {
        let result = VerifactuValidator::new().validate(&modification(""));
        assert_eq!(result.count(ErrorCategory::Structural), 1);
        assert!(result.messages(ErrorCategory::Structural)[0].contains("'ImporteTotal' (Total amount)"));
    }

    #[test]
    fn modification_business_rules() {
        let result = VerifactuValidator::new().validate(&modification(
            "<sum1:ImporteTotal>-5</sum1:ImporteTotal>",
        ));
        assert_eq!(result.count(ErrorCategory::Business), 1);
        assert_eq!(result.count(ErrorCategory::Structural), 0);
    }

    #[test]
    fn modification_without_references() {
        let xml = doc(
            "<sum1:TipoFactura>R1</sum1:TipoFactura>\
             <sum1:DescripcionOperacion>x</sum1:DescripcionOperacion>\
             <sum1:ImporteTotal>10</sum1:ImporteTotal>\
             <sum1:Desglose/>",
        );
        let result = VerifactuValidator::new().validate(&xml);
        let msgs = result.messages(ErrorCategory::Structural);
        assert_eq!(msgs.len(), 2, "{msgs:?}");
        assert!(msgs[0].contains("IDFacturaRectificada"));
        assert!(msgs[1].contains("DetalleDesglose"));
    }

    #[test]
    fn not_xml_is_general() {
        let result = VerifactuValidator::new().validate("not xml <");
        assert_eq!(result.count(ErrorCategory::General), 1);
        let result = VerifactuValidator::new().validate("<Invoice/>");
        assert_eq!(result.count(ErrorCategory::General), 1);
    }
}
