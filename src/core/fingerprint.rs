//! Chain hash engine.
//!
//! Each record's `Huella` is the SHA-256 of an ampersand-delimited
//! `key=value` string whose values use exactly the textual forms written
//! to XML. The string includes the previous record's `Huella`, so a change
//! anywhere breaks every later fingerprint.

use sha2::{Digest, Sha256};
use tracing::debug;

use super::error::{Result, VerifactuError};
use super::format::{format_amount, format_date, format_timestamp};
use super::types::*;

/// Canonical input for a `RegistroAlta`.
pub fn registration_canonical(record: &Record) -> Result<String> {
    let reg = record.as_registration().ok_or_else(|| {
        VerifactuError::Inconsistent("registration canonical form of a cancellation".into())
    })?;
    let timestamp = format_timestamp(&record.generated_at);
    canonical(&[
        ("IDEmisorFactura", Some(&reg.id.issuer_nif)),
        ("NumSerieFactura", Some(&reg.id.series_number)),
        ("FechaExpedicionFactura", Some(&format_date(&reg.id.issue_date))),
        ("TipoFactura", Some(&reg.invoice_type.code().to_string())),
        ("CuotaTotal", Some(&format_amount(reg.total_quota))),
        ("ImporteTotal", Some(&format_amount(reg.total_amount))),
        ("Huella", previous(&record.chain)),
        ("FechaHoraHusoGenRegistro", Some(&timestamp)),
    ])
}

/// Canonical input for a `RegistroAnulacion`.
pub fn cancellation_canonical(record: &Record) -> Result<String> {
    let can = record.as_cancellation().ok_or_else(|| {
        VerifactuError::Inconsistent("cancellation canonical form of a registration".into())
    })?;
    let timestamp = format_timestamp(&record.generated_at);
    canonical(&[
        ("IDEmisorFacturaAnulada", Some(&can.cancelled.issuer_nif)),
        ("NumSerieFacturaAnulada", Some(&can.cancelled.series_number)),
        (
            "FechaExpedicionFacturaAnulada",
            Some(&format_date(&can.cancelled.issue_date)),
        ),
        ("Huella", previous(&record.chain)),
        ("FechaHoraHusoGenRegistro", Some(&timestamp)),
    ])
}

/// Canonical input for either record variant.
pub fn canonical_input(record: &Record) -> Result<String> {
    match record.variant {
        RecordVariant::Registration(_) => registration_canonical(record),
        RecordVariant::Cancellation(_) => cancellation_canonical(record),
    }
}

/// SHA-256 of the canonical string, upper-case hex.
pub fn compute_fingerprint(canonical: &str) -> Fingerprint {
    let digest = Sha256::digest(canonical.as_bytes());
    Fingerprint::sha256(hex::encode_upper(digest))
}

// `None` marks the "Huella" slot of a first record, which is legitimately empty.
// Any other blank value is a missing field. Values go in exactly as the XML
// mapping writes them; the builders trim identifiers.
fn canonical(fields: &[(&str, Option<&String>)]) -> Result<String> {
    let mut out = String::with_capacity(256);
    for (i, (key, value)) in fields.iter().enumerate() {
        let value = match value {
            Some(v) => {
                if v.trim().is_empty() {
                    return Err(VerifactuError::missing(*key));
                }
                v.as_str()
            }
            None => "",
        };
        if i > 0 {
            out.push('&');
        }
        out.push_str(key);
        out.push('=');
        out.push_str(value);
    }
    Ok(out)
}

fn previous(link: &ChainLink) -> Option<&String> {
    match link {
        ChainLink::FirstInChain => None,
        ChainLink::Follows(prev) => Some(&prev.fingerprint),
    }
}

impl Record {
    /// Compute and store the fingerprint. Fails with
    /// [`VerifactuError::Inconsistent`] if the record is already sealed.
    pub fn seal(mut self) -> Result<Record> {
        if self.fingerprint.is_some() {
            return Err(VerifactuError::Inconsistent(
                "record fingerprint is already set".into(),
            ));
        }
        let fingerprint = compute_fingerprint(&canonical_input(&self)?);
        debug!(
            issuer = %self.invoice_id().issuer_nif,
            huella = &fingerprint.value[..16],
            "fingerprint computed"
        );
        self.fingerprint = Some(fingerprint);
        Ok(self)
    }

    /// True if the stored fingerprint matches the record's current content.
    pub fn verify_fingerprint(&self) -> Result<bool> {
        let stored = self
            .fingerprint
            .as_ref()
            .ok_or_else(|| VerifactuError::missing("Huella"))?;
        let expected = compute_fingerprint(&canonical_input(self)?);
        Ok(stored.value == expected.value)
    }
}

/// First inconsistency found by [`verify_chain`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    /// Position of the offending record.
    pub index: usize,
    pub reason: String,
}

impl std::fmt::Display for ChainBreak {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "chain broken at record {}: {}", self.index, self.reason)
    }
}

impl std::error::Error for ChainBreak {}

/// Check a sequence of records from one issuer, oldest first.
///
/// The first record must be `FirstInChain`; every later record must point
/// at its predecessor's identity and fingerprint, and every stored
/// fingerprint must recompute.
pub fn verify_chain(records: &[Record]) -> std::result::Result<(), ChainBreak> {
    let brk = |index: usize, reason: String| ChainBreak { index, reason };

    for (index, record) in records.iter().enumerate() {
        match record.verify_fingerprint() {
            Ok(true) => {}
            Ok(false) => return Err(brk(index, "fingerprint does not match content".into())),
            Err(e) => return Err(brk(index, e.to_string())),
        }

        match (index, &record.chain) {
            (0, ChainLink::FirstInChain) => {}
            (0, ChainLink::Follows(_)) => {
                return Err(brk(index, "first record links to a predecessor".into()));
            }
            (_, ChainLink::FirstInChain) => {
                return Err(brk(index, "record restarts the chain".into()));
            }
            (_, ChainLink::Follows(prev)) => {
                let before = &records[index - 1];
                if &prev.id != before.invoice_id() {
                    return Err(brk(
                        index,
                        format!(
                            "links to {} instead of {}",
                            prev.id.series_number,
                            before.invoice_id().series_number
                        ),
                    ));
                }
                let before_fp = before
                    .fingerprint
                    .as_ref()
                    .map(|f| f.value.as_str())
                    .unwrap_or_default();
                if prev.fingerprint != before_fp {
                    return Err(brk(index, "previous fingerprint mismatch".into()));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builder::{CancellationBuilder, RegistrationBuilder};
    use crate::core::codes::*;
    use chrono::{FixedOffset, NaiveDate, TimeZone};
    use rust_decimal_macros::dec;

    const PRIOR: &str = "E5A23515881D696FCD1CA8EE4902632BFC6D892BA8EB79CB656A5F84963079D3";

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

    fn record(chain: ChainLink) -> Record {
        let date = NaiveDate::from_ymd_opt(2025, 8, 10).unwrap();
        RegistrationBuilder::new(InvoiceId::new("A39200019", "TEST0033343459", date))
            .version(IdVersion::V1_0)
            .issuer_name("Empresa SA")
            .invoice_type(InvoiceType::Invoice)
            .description("Servicios")
            .add_breakdown(TaxBreakdownEntry::taxed(dec!(100), dec!(21), dec!(21)))
            .total_quota(dec!(21))
            .total_amount(dec!(121))
            .chain(chain)
            .system(system())
            .generated_at(
                FixedOffset::east_opt(0)
                    .unwrap()
                    .with_ymd_and_hms(2025, 8, 10, 5, 2, 18)
                    .unwrap(),
            )
            .build()
            .unwrap()
    }

    fn follows(fp: &str) -> ChainLink {
        ChainLink::Follows(PreviousRecord {
            id: InvoiceId::new(
                "A39200019",
                "TEST0033343458",
                NaiveDate::from_ymd_opt(2025, 8, 9).unwrap(),
            ),
            fingerprint: fp.into(),
        })
    }

    #[test]
    fn registration_canonical_form() {
        let s = registration_canonical(&record(follows(PRIOR))).unwrap();
        insta::assert_snapshot!(s, @"IDEmisorFactura=A39200019&NumSerieFactura=TEST0033343459&FechaExpedicionFactura=10-08-2025&TipoFactura=F1&CuotaTotal=21.00&ImporteTotal=121.00&Huella=E5A23515881D696FCD1CA8EE4902632BFC6D892BA8EB79CB656A5F84963079D3&FechaHoraHusoGenRegistro=2025-08-10T05:02:18+00:00");
    }

    #[test]
    fn first_record_has_empty_huella() {
        let s = registration_canonical(&record(ChainLink::FirstInChain)).unwrap();
        assert!(s.contains("&Huella=&FechaHoraHusoGenRegistro="));
    }

    #[test]
    fn cancellation_canonical_form() {
        let target = InvoiceId::new(
            "A39200019",
            "TEST0033343459",
            NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(),
        );
        let rec = CancellationBuilder::new(target)
            .version(IdVersion::V1_0)
            .chain(follows(PRIOR))
            .system(system())
            .generated_at(
                FixedOffset::east_opt(7200)
                    .unwrap()
                    .with_ymd_and_hms(2025, 8, 11, 9, 0, 0)
                    .unwrap(),
            )
            .build()
            .unwrap();
        assert_eq!(
            cancellation_canonical(&rec).unwrap(),
            format!(
                "IDEmisorFacturaAnulada=A39200019&NumSerieFacturaAnulada=TEST0033343459&FechaExpedicionFacturaAnulada=10-08-2025&Huella={PRIOR}&FechaHoraHusoGenRegistro=2025-08-11T09:00:00+02:00"
            )
        );
        assert!(registration_canonical(&rec).is_err());
    }

    #[test]
    fn values_are_hashed_as_stored() {
        let mut rec = record(ChainLink::FirstInChain);
        if let RecordVariant::Registration(r) = &mut rec.variant {
            r.id.series_number = "  TEST0033343459 ".into();
        }
        assert!(canonical_input(&rec)
            .unwrap()
            .contains("&NumSerieFactura=  TEST0033343459 &"));
    }

    #[test]
    fn empty_values_are_missing_fields() {
        let mut rec = record(ChainLink::FirstInChain);
        if let RecordVariant::Registration(r) = &mut rec.variant {
            r.id.issuer_nif = " ".into();
        }
        assert!(matches!(
            canonical_input(&rec),
            Err(VerifactuError::MissingField(f)) if f == "IDEmisorFactura"
        ));

        let rec = record(follows(""));
        assert!(matches!(
            canonical_input(&rec),
            Err(VerifactuError::MissingField(f)) if f == "Huella"
        ));
    }

    #[test]
    fn known_digest() {
        // sha256("abc")
        assert_eq!(
            compute_fingerprint("abc").value,
            "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
        );
    }

    #[test]
    fn seal_is_write_once() {
        let sealed = record(ChainLink::FirstInChain).seal().unwrap();
        assert!(sealed.verify_fingerprint().unwrap());
        assert!(matches!(sealed.seal(), Err(VerifactuError::Inconsistent(_))));
    }

    #[test]
    fn tampering_is_detected() {
        let mut sealed = record(ChainLink::FirstInChain).seal().unwrap();
        if let RecordVariant::Registration(r) = &mut sealed.variant {
            r.total_amount = dec!(122);
        }
        assert!(!sealed.verify_fingerprint().unwrap());
    }

    #[test]
    fn chain_of_two() {
        let first = record(ChainLink::FirstInChain).seal().unwrap();
        let mut second = record(ChainLink::Follows(PreviousRecord {
            id: first.invoice_id().clone(),
            fingerprint: first.fingerprint.clone().unwrap().value,
        }));
        if let RecordVariant::Registration(r) = &mut second.variant {
            r.id.series_number = "TEST0033343460".into();
        }
        let second = second.seal().unwrap();
        assert!(verify_chain(&[first.clone(), second.clone()]).is_ok());

        let brk = verify_chain(&[second, first]).unwrap_err();
        assert_eq!(brk.index, 0);
    }
}
