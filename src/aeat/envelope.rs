//! SOAP 1.1 envelope around one record.

use crate::core::error::{Result, VerifactuError};
use crate::core::{Party, PartyId, SUM1_PREFIX};
use crate::xml::{Element, ns};

pub const SOAP_PREFIX: &str = "soapenv";
pub const SUM_PREFIX: &str = "sum";

/// `RegFactuSistemaFacturacion` request: header with the obligated issuer,
/// body with exactly one `RegistroAlta` or `RegistroAnulacion`.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionEnvelope {
    /// `ObligadoEmision`.
    pub issuer: Party,
    /// Record element, signed or not.
    pub record: Element,
}

impl SubmissionEnvelope {
    pub fn new(issuer: Party, record: Element) -> Self {
        Self { issuer, record }
    }

    pub fn to_element(&self) -> Result<Element> {
        let nif = match &self.issuer.id {
            PartyId::Nif(nif) => nif,
            PartyId::Other { .. } => {
                return Err(VerifactuError::Inconsistent(
                    "ObligadoEmision must be identified by NIF".into(),
                ));
            }
        };
        let sum = |name: &str| Element::ns(SUM_PREFIX, ns::SUM, name);
        let sum1 = |name: &str| Element::ns(SUM1_PREFIX, ns::SUM1, name);
        let soap = |name: &str| Element::ns(SOAP_PREFIX, ns::SOAP, name);

        let header = sum("Cabecera").with_child(
            sum1("ObligadoEmision")
                .with_child(sum1("NombreRazon").with_text(&self.issuer.name))
                .with_child(sum1("NIF").with_text(nif)),
        );
        let request = sum("RegFactuSistemaFacturacion")
            .with_child(header)
            .with_child(sum("RegistroFactura").with_child(self.record.clone()));

        Ok(soap("Envelope")
            .declare(SOAP_PREFIX, ns::SOAP)
            .declare(SUM_PREFIX, ns::SUM)
            .declare(SUM1_PREFIX, ns::SUM1)
            .with_child(soap("Header"))
            .with_child(soap("Body").with_child(request)))
    }

    pub fn to_xml_string(&self) -> Result<String> {
        self.to_element()?.to_xml_string()
    }

    /// Read an envelope back, e.g. one stored for audit.
    pub fn from_element(envelope: &Element) -> Result<Self> {
        let obligado = envelope
            .find(ns::SUM1, "ObligadoEmision")
            .ok_or_else(|| VerifactuError::MalformedDocument("ObligadoEmision missing".into()))?;
        let field = |name: &str| {
            obligado
                .child_text(ns::SUM1, name)
                .ok_or_else(|| VerifactuError::MalformedDocument(format!("{name} missing")))
        };
        let issuer = Party::with_nif(field("NombreRazon")?, field("NIF")?);
        Ok(Self {
            issuer,
            record: extract_record(envelope)?.clone(),
        })
    }
}

/// The record element inside an envelope.
pub fn extract_record(envelope: &Element) -> Result<&Element> {
    let registro = envelope
        .find(ns::SUM, "RegistroFactura")
        .ok_or_else(|| VerifactuError::MalformedDocument("RegistroFactura missing".into()))?;
    registro
        .elements()
        .find(|e| e.is(ns::SUM1, "RegistroAlta") || e.is(ns::SUM1, "RegistroAnulacion"))
        .ok_or_else(|| {
            VerifactuError::MalformedDocument(
                "RegistroFactura holds no RegistroAlta or RegistroAnulacion".into(),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envelope() -> SubmissionEnvelope {
        let record = Element::ns(SUM1_PREFIX, ns::SUM1, "RegistroAnulacion")
            .with_child(Element::ns(SUM1_PREFIX, ns::SUM1, "IDVersion").with_text("1.0"));
        SubmissionEnvelope::new(Party::with_nif("Empresa SA", "A39200019"), record)
    }

    #[test]
    fn layout() {
        let xml = envelope().to_xml_string().unwrap();
        assert!(xml.contains("<soapenv:Envelope"));
        assert!(xml.contains("<soapenv:Header/>") || xml.contains("<soapenv:Header></soapenv:Header>"));
        assert!(xml.contains("<sum:RegFactuSistemaFacturacion>"));
        assert!(xml.contains("<sum1:NIF>A39200019</sum1:NIF>"));
        let cabecera = xml.find("<sum:Cabecera>").unwrap();
        let registro = xml.find("<sum:RegistroFactura>").unwrap();
        assert!(cabecera < registro);
    }

    #[test]
    fn parse_back() {
        let original = envelope();
        let root = Element::parse(&original.to_xml_string().unwrap()).unwrap();
        let parsed = SubmissionEnvelope::from_element(&root).unwrap();
        assert_eq!(parsed.issuer, original.issuer);
        assert_eq!(parsed.record.name, "RegistroAnulacion");
        assert_eq!(parsed.record.child_text(ns::SUM1, "IDVersion").as_deref(), Some("1.0"));
    }

    #[test]
    fn foreign_issuer_rejected() {
        let mut env = envelope();
        env.issuer.id = PartyId::Other {
            country: Some("FR".into()),
            id_type: crate::core::OtherIdType::Passport,
            id: "X1".into(),
        };
        assert!(matches!(env.to_element(), Err(VerifactuError::Inconsistent(_))));
    }

    #[test]
    fn empty_body() {
        let root = Element::parse(&format!(
            r#"<s:Envelope xmlns:s="{}" xmlns:sum="{}"><s:Body><sum:RegistroFactura/></s:Body></s:Envelope>"#,
            ns::SOAP,
            ns::SUM
        ))
        .unwrap();
        assert!(matches!(extract_record(&root), Err(VerifactuError::MalformedDocument(_))));
    }
}
