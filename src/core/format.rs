//! Textual forms shared by the XML mapping and the fingerprint input.
//!
//! Both must agree byte for byte, so every amount, date and timestamp that
//! reaches either goes through this module.

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use super::error::{Result, VerifactuError};

/// `DD-MM-YYYY`, the only date form the schema accepts.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// ISO 8601 with seconds and a `+hh:mm` offset.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Round to the two decimals an amount carries on the wire, half away from zero.
pub fn round_amount(d: Decimal) -> Decimal {
    let mut rounded = d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Format an amount with exactly two decimal places, never scientific.
pub fn format_amount(d: Decimal) -> String {
    let rounded = round_amount(d);
    if rounded.is_zero() {
        // -0.00 is not a valid schema amount
        return "0.00".to_string();
    }
    rounded.to_string()
}

/// Parse an amount written by [`format_amount`] (or any plain decimal).
pub fn parse_amount(field: &str, s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim()).map_err(|e| {
        VerifactuError::MalformedDocument(format!("invalid amount '{s}' in {field}: {e}"))
    })
}

pub fn format_date(date: &NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(field: &str, s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|e| {
        VerifactuError::MalformedDocument(format!("invalid date '{s}' in {field}: {e}"))
    })
}

/// True if `s` has the exact `DD-MM-YYYY` shape and is a real calendar date.
pub fn is_schema_date(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[2] == b'-'
        && b[5] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| i == 2 || i == 5 || c.is_ascii_digit())
        && NaiveDate::parse_from_str(s, DATE_FORMAT).is_ok()
}

pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(field: &str, s: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s.trim()).map_err(|e| {
        VerifactuError::MalformedDocument(format!("invalid timestamp '{s}' in {field}: {e}"))
    })
}

/// `S` / `N` flags.
pub fn format_flag(value: bool) -> &'static str {
    if value { "S" } else { "N" }
}

pub fn parse_flag(field: &str, s: &str) -> Result<bool> {
    match s.trim() {
        "S" => Ok(true),
        "N" => Ok(false),
        other => Err(VerifactuError::invalid_code(field, other, &["S", "N"])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn format_amount_cases() {
        assert_eq!(format_amount(dec!(121)), "121.00");
        assert_eq!(format_amount(dec!(21.0)), "21.00");
        assert_eq!(format_amount(dec!(49.9)), "49.90");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
        assert_eq!(format_amount(dec!(-10.5)), "-10.50");
        assert_eq!(format_amount(dec!(1833.484)), "1833.48");
        assert_eq!(format_amount(dec!(0)), "0.00");
        assert_eq!(format_amount(dec!(-0.001)), "0.00");
        assert_eq!(format_amount(dec!(123456789012.34)), "123456789012.34");
    }

    #[test]
    fn amount_roundtrip() {
        let s = format_amount(dec!(1234.5));
        assert_eq!(parse_amount("ImporteTotal", &s).unwrap(), dec!(1234.50));
        assert!(parse_amount("ImporteTotal", "12,50").is_err());
    }

    #[test]
    fn dates() {
        let d = NaiveDate::from_ymd_opt(2025, 8, 10).unwrap();
        assert_eq!(format_date(&d), "10-08-2025");
        assert_eq!(parse_date("FechaExpedicionFactura", "10-08-2025").unwrap(), d);
        assert!(parse_date("FechaExpedicionFactura", "2025-08-10").is_err());
        assert!(is_schema_date("10-08-2025"));
        assert!(!is_schema_date("1-8-2025"));
        assert!(!is_schema_date("31-02-2025"));
    }

    #[test]
    fn timestamps_keep_offset() {
        let ts = FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2025, 8, 10, 5, 2, 18)
            .unwrap();
        assert_eq!(format_timestamp(&ts), "2025-08-10T05:02:18+00:00");

        let madrid = FixedOffset::east_opt(2 * 3600)
            .unwrap()
            .with_ymd_and_hms(2025, 8, 10, 7, 2, 18)
            .unwrap();
        let s = format_timestamp(&madrid);
        assert_eq!(s, "2025-08-10T07:02:18+02:00");
        assert_eq!(parse_timestamp("FechaHoraHusoGenRegistro", &s).unwrap(), madrid);
    }

    #[test]
    fn flags() {
        assert_eq!(format_flag(true), "S");
        assert!(!parse_flag("Macrodato", "N").unwrap());
        assert!(parse_flag("Macrodato", "Y").is_err());
    }
}
