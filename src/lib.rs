//! # verifactu
//!
//! Spanish Verifactu invoice records: building `RegistroAlta` /
//! `RegistroAnulacion` records, chaining them with SHA-256 fingerprints,
//! validating them, signing them with XMLDSig and submitting them to the AEAT.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{DateTime, NaiveDate};
//! use verifactu::*;
//! use rust_decimal_macros::dec;
//!
//! let system = SystemDescriptor {
//!     producer: Party::with_nif("Software SL", "B12345678"),
//!     system_name: "Facturas".into(),
//!     system_id: "FA".into(),
//!     version: "1.0".into(),
//!     installation_number: "001".into(),
//!     verifactu_only: true,
//!     multi_taxpayer: false,
//!     multiple_taxpayers: false,
//! };
//! let id = InvoiceId::new("A39200019", "F-2025-1", NaiveDate::from_ymd_opt(2025, 8, 10).unwrap());
//! let record = RegistrationBuilder::new(id)
//!     .version(IdVersion::V1_0)
//!     .issuer_name("Empresa SA")
//!     .invoice_type(InvoiceType::Invoice)
//!     .description("Servicios")
//!     .add_breakdown(TaxBreakdownEntry::taxed(dec!(100), dec!(21), dec!(21)))
//!     .total_quota(dec!(21))
//!     .total_amount(dec!(121))
//!     .chain(ChainLink::FirstInChain)
//!     .system(system)
//!     .generated_at(DateTime::parse_from_rfc3339("2025-08-10T05:02:18+00:00").unwrap())
//!     .build()
//!     .unwrap()
//!     .seal()
//!     .unwrap();
//!
//! assert!(record.verify_fingerprint().unwrap());
//! assert!(record.to_xml_string().unwrap().contains("<sum1:Huella>"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Record model, fingerprints, chain state, XML tree and c14n |
//! | `validate` (default) | Verifactu record validation with categorized errors |
//! | `ubl` | Generic UBL invoice / credit note validation |
//! | `sign` | XMLDSig enveloped signatures (RSA-SHA256) |
//! | `submit` | SOAP envelope, AEAT response parsing, mutual-TLS submission |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod xml;

#[cfg(feature = "validate")]
pub mod validate;

#[cfg(feature = "sign")]
pub mod sign;

#[cfg(feature = "submit")]
pub mod aeat;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
