//! XMLDSig enveloped signatures for Verifactu documents.
//!
//! ```rust,no_run
//! use verifactu::sign::{KeySource, sign, verify};
//! use verifactu::xml::Element;
//!
//! # fn main() -> verifactu::Result<()> {
//! let mut doc = Element::parse("<Root/>")?;
//! sign(&mut doc, &KeySource::path("key.pem"), &KeySource::path("cert.pem"))?;
//! assert!(verify(&doc, &KeySource::path("pub.pem"))?);
//! # Ok(())
//! # }
//! ```

mod keys;
mod xmldsig;

pub use keys::{KeySource, load_certificate, load_private_key, load_public_key};
pub use xmldsig::{ENVELOPED, RSA_SHA256, SHA256, sign, verify};
