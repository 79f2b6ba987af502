//! Namespace-aware XML element tree and exclusive canonicalization.
//!
//! Records, envelopes and signatures are assembled as [`Element`] trees and
//! only turned into text at the edges. Lookups always go by namespace URI
//! and local name, never by prefix.

pub mod c14n;
mod tree;

pub use tree::{Attribute, Element, Node};

/// Namespace URIs used across the crate.
pub mod ns {
    /// `SuministroLR.xsd`, conventionally prefixed `sum`.
    pub const SUM: &str = "https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/tike/cont/ws/SuministroLR.xsd";
    /// `SuministroInformacion.xsd`, conventionally prefixed `sum1` (or `sf`).
    pub const SUM1: &str = "https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/tike/cont/ws/SuministroInformacion.xsd";
    /// `RespuestaSuministro.xsd`.
    pub const RESPONSE: &str = "https://www2.agenciatributaria.gob.es/static_files/common/internet/dep/aplicaciones/es/aeat/tike/cont/ws/RespuestaSuministro.xsd";
    /// SOAP 1.1 envelope.
    pub const SOAP: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    /// XML digital signature.
    pub const DS: &str = "http://www.w3.org/2000/09/xmldsig#";
    /// UBL 2.1 invoice root.
    pub const UBL_INVOICE: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
    /// UBL 2.1 credit note root.
    pub const UBL_CREDIT_NOTE: &str = "urn:oasis:names:specification:ubl:schema:xsd:CreditNote-2";
    /// UBL common aggregate components.
    pub const CAC: &str =
        "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
    /// UBL common basic components.
    pub const CBC: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
}
