//! Verifactu record model, chain hash engine and chain state.
//!
//! Records are built from an [`InvoiceSnapshot`] (or directly with
//! [`RegistrationBuilder`] / [`CancellationBuilder`]), sealed with their
//! SHA-256 fingerprint and mapped to the schema's XML.

mod builder;
mod chain;
mod codes;
pub mod error;
mod fingerprint;
pub mod format;
mod record_xml;
mod snapshot;
mod types;

pub use builder::*;
pub use chain::*;
pub use codes::*;
pub use error::*;
pub use fingerprint::*;
pub use record_xml::SUM1_PREFIX;
pub use snapshot::*;
pub use types::*;
