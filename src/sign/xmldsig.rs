//! Enveloped XMLDSig over the whole document.
//!
//! The reference (`URI=""`) covers the document root with the signature
//! removed, canonicalized with exclusive c14n and digested with SHA-256.
//! `SignedInfo` is canonicalized the same way and signed with RSA-SHA256
//! (PKCS#1 v1.5).

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::keys::{KeySource, load_certificate, load_private_key, load_public_key};
use crate::core::error::{Result, VerifactuError};
use crate::xml::c14n::{EXC_C14N, canonicalize, canonicalize_filtered};
use crate::xml::{Element, ns};

pub const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
pub const SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";
pub const ENVELOPED: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

const DS_PREFIX: &str = "ds";

fn ds(name: &str) -> Element {
    Element::ns(DS_PREFIX, ns::DS, name)
}

fn is_signature(el: &Element) -> bool {
    el.is(ns::DS, "Signature")
}

fn sig_err(e: impl std::fmt::Display) -> VerifactuError {
    VerifactuError::Signature(e.to_string())
}

/// Base64 SHA-256 of the document with every `ds:Signature` left out.
fn reference_digest(root: &Element) -> String {
    let canonical = canonicalize_filtered(root, &is_signature);
    STANDARD.encode(Sha256::digest(canonical.as_bytes()))
}

fn signed_info(digest: &str) -> Element {
    ds("SignedInfo")
        .with_child(ds("CanonicalizationMethod").with_attr("Algorithm", EXC_C14N))
        .with_child(ds("SignatureMethod").with_attr("Algorithm", RSA_SHA256))
        .with_child(
            ds("Reference")
                .with_attr("URI", "")
                .with_child(
                    ds("Transforms")
                        .with_child(ds("Transform").with_attr("Algorithm", ENVELOPED))
                        .with_child(ds("Transform").with_attr("Algorithm", EXC_C14N)),
                )
                .with_child(ds("DigestMethod").with_attr("Algorithm", SHA256))
                .with_child(ds("DigestValue").with_text(digest)),
        )
}

fn rsa_sign(key: &RsaPrivateKey, signed_info: &Element) -> Result<Vec<u8>> {
    let hashed = Sha256::digest(canonicalize(signed_info).as_bytes());
    key.sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
        .map_err(sig_err)
}

fn rsa_verify(key: &RsaPublicKey, signed_info: &Element, signature: &[u8]) -> bool {
    let hashed = Sha256::digest(canonicalize(signed_info).as_bytes());
    key.verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, signature)
        .is_ok()
}

/// Sign `document` in place, appending `ds:Signature` as the last child of
/// the root. An existing signature is replaced.
///
/// # Errors
///
/// [`VerifactuError::KeyNotFound`] if either key source is unreadable,
/// [`VerifactuError::InvalidKey`] if it does not hold the expected PEM block.
pub fn sign(document: &mut Element, private_key: &KeySource, certificate: &KeySource) -> Result<()> {
    let key = load_private_key(private_key)?;
    let cert = load_certificate(certificate)?;

    document.remove_children(ns::DS, "Signature");
    let digest = reference_digest(document);
    let info = signed_info(&digest);
    let value = rsa_sign(&key, &info)?;

    let signature = ds("Signature")
        .declare(DS_PREFIX, ns::DS)
        .with_child(info)
        .with_child(ds("SignatureValue").with_text(&STANDARD.encode(&value)))
        .with_child(
            ds("KeyInfo").with_child(
                ds("X509Data").with_child(ds("X509Certificate").with_text(&STANDARD.encode(&cert))),
            ),
        );
    document.push(signature);
    debug!(root = %document.name, "document signed");

    // self-check; a mismatch is logged, not returned
    match check(document, &key.to_public_key()) {
        Ok(true) => {}
        Ok(false) => warn!("signature self-check failed"),
        Err(e) => warn!(error = %e, "signature self-check could not run"),
    }
    Ok(())
}

/// Verify the enveloped signature on `document` against `public_key`.
///
/// Returns `Ok(false)` when the digest or the signature value does not
/// match.
///
/// # Errors
///
/// [`VerifactuError::SignatureNotFound`] if the document carries no
/// `ds:Signature`, [`VerifactuError::Signature`] if it is incomplete.
pub fn verify(document: &Element, public_key: &KeySource) -> Result<bool> {
    if document.find(ns::DS, "Signature").is_none() {
        return Err(VerifactuError::SignatureNotFound);
    }
    let key = load_public_key(public_key)?;
    check(document, &key)
}

fn check(document: &Element, key: &RsaPublicKey) -> Result<bool> {
    let signature = document
        .find(ns::DS, "Signature")
        .ok_or(VerifactuError::SignatureNotFound)?;
    let info = signature
        .child(ns::DS, "SignedInfo")
        .ok_or_else(|| sig_err("SignedInfo missing"))?;
    let expected_digest = info
        .child(ns::DS, "Reference")
        .and_then(|r| r.child_text(ns::DS, "DigestValue"))
        .ok_or_else(|| sig_err("DigestValue missing"))?;
    let value = signature
        .child_text(ns::DS, "SignatureValue")
        .ok_or_else(|| sig_err("SignatureValue missing"))?;
    let value: String = value.split_whitespace().collect();
    let value = STANDARD.decode(value).map_err(sig_err)?;

    if reference_digest(document) != expected_digest {
        debug!("reference digest mismatch");
        return Ok(false);
    }
    Ok(rsa_verify(key, info, &value))
}
