//! Verifactu document validation.
//!
//! Run with: `cargo test --test validator_tests`

#![cfg(feature = "validate")]

use chrono::{DateTime, NaiveDate};
use rust_decimal_macros::dec;
use verifactu::core::*;
use verifactu::validate::schema::validate_document;
use verifactu::validate::*;
use verifactu::xml::{Element, ns};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn system() -> SystemDescriptor {
    SystemDescriptor {
        producer: Party::with_nif("Software SL", "B12345678"),
        system_name: "Facturas".into(),
        system_id: "FA".into(),
        version: "1.0".into(),
        installation_number: "001".into(),
        verifactu_only: true,
        multi_taxpayer: false,
        multiple_taxpayers: false,
    }
}

fn registration_xml() -> String {
    RegistrationBuilder::new(InvoiceId::new("A39200019", "F-0001", date(2025, 8, 10)))
        .version(IdVersion::V1_0)
        .issuer_name("Empresa SA")
        .invoice_type(InvoiceType::Invoice)
        .description("Servicios")
        .recipient(Party::with_nif("Cliente SL", "B87654321"))
        .add_breakdown(TaxBreakdownEntry::taxed(dec!(100), dec!(21), dec!(21)))
        .total_quota(dec!(21))
        .total_amount(dec!(121))
        .chain(ChainLink::FirstInChain)
        .system(system())
        .generated_at(DateTime::parse_from_rfc3339("2025-08-10T05:02:18+00:00").unwrap())
        .build()
        .unwrap()
        .seal()
        .unwrap()
        .to_xml_string()
        .unwrap()
}

fn cancellation_xml() -> String {
    CancellationBuilder::new(InvoiceId::new("A39200019", "F-0001", date(2025, 8, 10)))
        .version(IdVersion::V1_0)
        .chain(ChainLink::FirstInChain)
        .system(system())
        .generated_at(DateTime::parse_from_rfc3339("2025-08-11T09:00:00+02:00").unwrap())
        .build()
        .unwrap()
        .seal()
        .unwrap()
        .to_xml_string()
        .unwrap()
}

/// R1 with the sub-blocks a modification needs, but none of the trailer
/// elements the record schema requires.
fn minimal_modification() -> String {
    format!(
        r#"<sum1:RegistroAlta xmlns:sum1="{}">
  <sum1:IDFactura>
    <sum1:IDEmisorFactura>A39200019</sum1:IDEmisorFactura>
    <sum1:NumSerieFactura>R-0001</sum1:NumSerieFactura>
    <sum1:FechaExpedicionFactura>10-08-2025</sum1:FechaExpedicionFactura>
  </sum1:IDFactura>
  <sum1:TipoFactura>R1</sum1:TipoFactura>
  <sum1:TipoRectificativa>I</sum1:TipoRectificativa>
  <sum1:FacturasRectificadas>
    <sum1:IDFacturaRectificada>
      <sum1:IDEmisorFactura>A39200019</sum1:IDEmisorFactura>
      <sum1:NumSerieFactura>F-0001</sum1:NumSerieFactura>
      <sum1:FechaExpedicionFactura>01-07-2025</sum1:FechaExpedicionFactura>
    </sum1:IDFacturaRectificada>
  </sum1:FacturasRectificadas>
  <sum1:DescripcionOperacion>Corrección de precio</sum1:DescripcionOperacion>
  <sum1:Desglose>
    <sum1:DetalleDesglose>
      <sum1:BaseImponibleOimporteNoSujeto>10.00</sum1:BaseImponibleOimporteNoSujeto>
    </sum1:DetalleDesglose>
  </sum1:Desglose>
  <sum1:ImporteTotal>12.10</sum1:ImporteTotal>
</sum1:RegistroAlta>"#,
        ns::SUM1
    )
}

// ── Valid documents ──

#[test]
fn generated_registration_is_valid() {
    let result = VerifactuValidator::new().validate(&registration_xml());
    assert!(result.is_valid(), "{:#?}", result.errors);
    assert_eq!(result.summary(), "Validation passed");
}

#[test]
fn generated_cancellation_is_valid() {
    let result = VerifactuValidator::new().validate(&cancellation_xml());
    assert!(result.is_valid(), "{:#?}", result.errors);
}

#[test]
fn record_inside_envelope_is_found() {
    let record = registration_xml();
    let body = record.trim_start_matches(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let envelope = format!(
        r#"<soapenv:Envelope xmlns:soapenv="{}" xmlns:sum="{}"><soapenv:Body><sum:RegFactuSistemaFacturacion><sum:RegistroFactura>{body}</sum:RegistroFactura></sum:RegFactuSistemaFacturacion></soapenv:Body></soapenv:Envelope>"#,
        ns::SOAP,
        ns::SUM
    );
    let root = Element::parse(&envelope).unwrap();
    assert_eq!(VerifactuValidator::classify(&root), DocumentKind::Registration);
    assert!(VerifactuValidator::new().validate_element(&root).is_valid());
}

// ── Completeness ──

#[test]
fn three_independent_schema_errors_are_all_reported() {
    let xml = registration_xml()
        .replace(
            "<sum1:TipoFactura>F1</sum1:TipoFactura>",
            "<sum1:TipoFactura>F9</sum1:TipoFactura>",
        )
        .replace(
            "<sum1:ImporteTotal>121.00</sum1:ImporteTotal>",
            "<sum1:ImporteTotal>abc</sum1:ImporteTotal>",
        )
        .replacen(
            "<sum1:FechaExpedicionFactura>10-08-2025</sum1:FechaExpedicionFactura>",
            "<sum1:FechaExpedicionFactura>2025-08-10</sum1:FechaExpedicionFactura>",
            1,
        );
    let result = VerifactuValidator::new().validate(&xml);
    assert_eq!(result.count(ErrorCategory::Schema), 3, "{:#?}", result.errors);
    assert_eq!(result.total(), 3);
    assert_eq!(result.worst_severity(), Some(Severity::High));
    assert_eq!(
        result.summary(),
        "Validation failed with 3 total error(s): schema: 3"
    );
}

#[test]
fn schema_messages_are_humanized() {
    let xml = registration_xml().replace(
        "<sum1:TipoFactura>F1</sum1:TipoFactura>",
        "<sum1:TipoFactura>F9</sum1:TipoFactura>",
    );
    let result = VerifactuValidator::new().validate(&xml);
    let msg = &result.messages(ErrorCategory::Schema)[0];
    assert!(!msg.contains('{'), "namespace left in: {msg}");
    assert!(msg.contains("TipoFactura"));
    assert!(msg.contains("F9"));
    assert!(!VerifactuValidator::new().suggest(msg).is_empty());
}

#[test]
fn modification_passes_structurally_but_not_schema() {
    let xml = minimal_modification();
    let root = Element::parse(&xml).unwrap();
    assert_eq!(VerifactuValidator::classify(&root), DocumentKind::Modification);

    let result = VerifactuValidator::new().validate(&xml);
    assert!(result.is_valid(), "{:#?}", result.errors);

    let raw = validate_document(verifactu_schema(), &root);
    assert!(!raw.is_empty());
}

#[test]
fn modification_stages_stop_at_first_failing_stage() {
    let xml = minimal_modification()
        .replace("<sum1:ImporteTotal>12.10</sum1:ImporteTotal>", "<sum1:ImporteTotal>0</sum1:ImporteTotal>")
        .replace(
            "<sum1:NumSerieFactura>F-0001</sum1:NumSerieFactura>",
            "",
        );
    let result = VerifactuValidator::new().validate(&xml);
    assert_eq!(result.count(ErrorCategory::Structural), 1);
    assert_eq!(result.count(ErrorCategory::Business), 0);
}

#[test]
fn modification_business_rule_is_low_severity() {
    let xml = minimal_modification().replace(
        "<sum1:ImporteTotal>12.10</sum1:ImporteTotal>",
        "<sum1:ImporteTotal>0</sum1:ImporteTotal>",
    );
    let result = VerifactuValidator::new().validate(&xml);
    assert_eq!(result.count(ErrorCategory::Business), 1);
    assert_eq!(result.worst_severity(), Some(Severity::Low));
}

// ── Error contract ──

#[test]
fn unrecognized_and_malformed_documents_are_general() {
    let v = VerifactuValidator::new();
    assert_eq!(v.validate("<Factura/>").count(ErrorCategory::General), 1);
    assert_eq!(v.validate("<<<").count(ErrorCategory::General), 1);
}

#[test]
fn grouped_export() {
    let xml = registration_xml().replace(
        "<sum1:ImporteTotal>121.00</sum1:ImporteTotal>",
        "<sum1:ImporteTotal>abc</sum1:ImporteTotal>",
    );
    let result = VerifactuValidator::new().validate(&xml);
    let export = result.grouped();
    assert_eq!(export.total, 1);
    assert_eq!(export.categories[0].category, ErrorCategory::Schema);
    assert_eq!(export.categories[0].severity, Severity::High);

    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["categories"][0]["category"], "schema");
    assert_eq!(json["categories"][0]["count"], 1);
}

#[test]
fn validator_is_reusable_across_threads() {
    let validator = VerifactuValidator::new();
    let good = registration_xml();
    let bad = good.replace(
        "<sum1:TipoFactura>F1</sum1:TipoFactura>",
        "<sum1:TipoFactura>F9</sum1:TipoFactura>",
    );
    std::thread::scope(|s| {
        let a = s.spawn(|| validator.validate(&good));
        let b = s.spawn(|| validator.validate(&bad));
        assert!(a.join().unwrap().is_valid());
        assert_eq!(b.join().unwrap().total(), 1);
    });
}
