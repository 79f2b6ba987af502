//! Key and certificate material addressable by path or by content.

use std::path::PathBuf;

use pem::Pem;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::core::error::{Result, VerifactuError};

/// Where PEM material comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl KeySource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        Self::Path(path.into())
    }

    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(bytes.into())
    }

    fn describe(&self) -> String {
        match self {
            Self::Path(p) => p.display().to_string(),
            Self::Bytes(b) => format!("<{} bytes>", b.len()),
        }
    }

    /// Raw content. Unreadable paths fail with [`VerifactuError::KeyNotFound`].
    pub fn read(&self) -> Result<Vec<u8>> {
        match self {
            Self::Path(p) => std::fs::read(p)
                .map_err(|e| VerifactuError::KeyNotFound(format!("{}: {e}", p.display()))),
            Self::Bytes(b) if b.is_empty() => {
                Err(VerifactuError::KeyNotFound("empty key material".into()))
            }
            Self::Bytes(b) => Ok(b.clone()),
        }
    }

    fn pem_blocks(&self) -> Result<Vec<Pem>> {
        let raw = self.read()?;
        let blocks = pem::parse_many(&raw)
            .map_err(|e| VerifactuError::InvalidKey(format!("{}: {e}", self.describe())))?;
        if blocks.is_empty() {
            return Err(VerifactuError::InvalidKey(format!(
                "{}: no PEM block found",
                self.describe()
            )));
        }
        Ok(blocks)
    }
}

fn invalid(source: &KeySource, e: impl std::fmt::Display) -> VerifactuError {
    VerifactuError::InvalidKey(format!("{}: {e}", source.describe()))
}

/// RSA private key from a `PRIVATE KEY` (PKCS#8) or `RSA PRIVATE KEY` (PKCS#1) block.
pub fn load_private_key(source: &KeySource) -> Result<RsaPrivateKey> {
    for block in source.pem_blocks()? {
        match block.tag() {
            "PRIVATE KEY" => {
                return RsaPrivateKey::from_pkcs8_der(block.contents())
                    .map_err(|e| invalid(source, e));
            }
            "RSA PRIVATE KEY" => {
                return RsaPrivateKey::from_pkcs1_der(block.contents())
                    .map_err(|e| invalid(source, e));
            }
            _ => {}
        }
    }
    Err(invalid(source, "no private key block"))
}

/// RSA public key from a `PUBLIC KEY` (SPKI) or `RSA PUBLIC KEY` (PKCS#1) block.
pub fn load_public_key(source: &KeySource) -> Result<RsaPublicKey> {
    for block in source.pem_blocks()? {
        match block.tag() {
            "PUBLIC KEY" => {
                return RsaPublicKey::from_public_key_der(block.contents())
                    .map_err(|e| invalid(source, e));
            }
            "RSA PUBLIC KEY" => {
                return RsaPublicKey::from_pkcs1_der(block.contents())
                    .map_err(|e| invalid(source, e));
            }
            _ => {}
        }
    }
    Err(invalid(source, "no public key block"))
}

/// DER bytes of the first `CERTIFICATE` block.
pub fn load_certificate(source: &KeySource) -> Result<Vec<u8>> {
    source
        .pem_blocks()?
        .into_iter()
        .find(|b| b.tag() == "CERTIFICATE")
        .map(Pem::into_contents)
        .ok_or_else(|| invalid(source, "no certificate block"))
}
