//! Fingerprint and chain properties.
//!
//! Run with: `cargo test --test fingerprint_tests`

#![cfg(feature = "core")]

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use verifactu::core::*;

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

fn ts(offset_secs: i64) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2025-08-10T05:02:18+00:00").unwrap() + Duration::seconds(offset_secs)
}

fn record(series: &str, base: Decimal, chain: ChainLink, at: DateTime<FixedOffset>) -> Record {
    let quota = (base * dec!(0.21)).round_dp(2);
    RegistrationBuilder::new(InvoiceId::new(
        "A39200019",
        series,
        NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(),
    ))
    .version(IdVersion::V1_0)
    .issuer_name("Empresa SA")
    .invoice_type(InvoiceType::Invoice)
    .description("Servicios")
    .add_breakdown(TaxBreakdownEntry::taxed(base, dec!(21), quota))
    .total_quota(quota)
    .total_amount(base + quota)
    .chain(chain)
    .system(system())
    .generated_at(at)
    .build()
    .unwrap()
    .seal()
    .unwrap()
}

fn link_to(prev: &Record) -> ChainLink {
    ChainLink::Follows(PreviousRecord {
        id: prev.invoice_id().clone(),
        fingerprint: prev.fingerprint.as_ref().unwrap().value.clone(),
    })
}

fn chain_of(n: usize) -> Vec<Record> {
    let mut records: Vec<Record> = Vec::with_capacity(n);
    for i in 0..n {
        let link = records.last().map_or(ChainLink::FirstInChain, link_to);
        records.push(record(
            &format!("F-{i:04}"),
            Decimal::from(100 + i as i64),
            link,
            ts(i as i64),
        ));
    }
    records
}

// ── Proptest Strategies ─────────────────────────────────────────────────────

fn arb_series() -> impl Strategy<Value = String> {
    "[A-Z]{1,4}-[0-9]{1,8}"
}

fn arb_base() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

proptest! {
    #[test]
    fn fingerprint_is_deterministic(series in arb_series(), base in arb_base()) {
        let a = record(&series, base, ChainLink::FirstInChain, ts(0));
        let b = record(&series, base, ChainLink::FirstInChain, ts(0));
        prop_assert_eq!(&a.fingerprint, &b.fingerprint);
        prop_assert_eq!(a.fingerprint.as_ref().unwrap().value.len(), 64);
    }

    #[test]
    fn one_field_changes_the_fingerprint(series in arb_series(), base in arb_base(), secs in 1i64..86_400) {
        let reference = record(&series, base, ChainLink::FirstInChain, ts(0));
        let other_series = record(&format!("{series}X"), base, ChainLink::FirstInChain, ts(0));
        let other_amount = record(&series, base + dec!(0.01), ChainLink::FirstInChain, ts(0));
        let other_time = record(&series, base, ChainLink::FirstInChain, ts(secs));
        for other in [&other_series, &other_amount, &other_time] {
            prop_assert_ne!(&reference.fingerprint, &other.fingerprint);
        }
    }

    #[test]
    fn previous_fingerprint_feeds_the_next(series in arb_series(), base in arb_base()) {
        let first = record("F-0000", dec!(100), ChainLink::FirstInChain, ts(0));
        let linked = record(&series, base, link_to(&first), ts(1));
        let forged = record(
            &series,
            base,
            ChainLink::Follows(PreviousRecord {
                id: first.invoice_id().clone(),
                fingerprint: "0".repeat(64),
            }),
            ts(1),
        );
        prop_assert_ne!(&linked.fingerprint, &forged.fingerprint);
    }
}

// ── Chain integrity ──

#[test]
fn chain_of_twenty_verifies() {
    let records = chain_of(20);
    assert!(verify_chain(&records).is_ok());
    for pair in records.windows(2) {
        let expected = pair[0].fingerprint.as_ref().unwrap().value.as_str();
        assert_eq!(pair[1].chain.previous_fingerprint(), expected);
        assert!(pair[1].verify_fingerprint().unwrap());
    }
}

#[test]
fn substituted_predecessor_is_detected() {
    let mut records = chain_of(5);
    let stale = records[0].fingerprint.as_ref().unwrap().value.clone();
    let ChainLink::Follows(prev) = &mut records[3].chain else {
        panic!("record 3 must follow record 2");
    };
    prev.fingerprint = stale;
    let brk = verify_chain(&records).unwrap_err();
    assert_eq!(brk.index, 3);
}

#[test]
fn reordered_chain_is_detected() {
    let mut records = chain_of(4);
    records.swap(1, 2);
    assert_eq!(verify_chain(&records).unwrap_err().index, 1);
}

#[test]
fn known_digest() {
    let fp = compute_fingerprint("abc");
    assert_eq!(
        fp.value,
        "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD"
    );
}
