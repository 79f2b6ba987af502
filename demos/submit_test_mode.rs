use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;
use verifactu::aeat::{Submitter, VerifactuConfig};
use verifactu::core::*;

fn main() {
    // VERIFACTU_TEST_MODE=true skips the network and TLS material
    let config = VerifactuConfig::from_env().unwrap_or_else(|_| VerifactuConfig::test_mode());
    let store = Arc::new(InMemoryChainStore::new());
    let system = SystemDescriptor {
        producer: Party::with_nif("Software SL", "B12345678"),
        system_name: "Facturas".into(),
        system_id: "FA".into(),
        version: "1.0".into(),
        installation_number: "001".into(),
        verifactu_only: true,
        multi_taxpayer: false,
        multiple_taxpayers: false,
    };
    let submitter = Submitter::from_config(&config, store.clone(), system).unwrap();

    for (i, base) in [dec!(100), dec!(250), dec!(40)].into_iter().enumerate() {
        let quota = base * dec!(0.21);
        let snapshot = InvoiceSnapshot {
            issuer: Party::with_nif("Empresa SA", "A39200019"),
            series_number: format!("F-2025-{:04}", i + 1),
            issue_date: NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(),
            operation_date: None,
            description: "Servicios".into(),
            intent: DocumentIntent::Standard {
                invoice_type: InvoiceType::Invoice,
                substitutes: vec![],
            },
            recipients: vec![Party::with_nif("Cliente SL", "B87654321")],
            breakdown: vec![TaxBreakdownEntry::taxed(base, dec!(21), quota)],
            total_quota: Some(quota),
            total_amount: Some(base + quota),
            without_recipient_id: false,
            simplified_art_7273: false,
            external_ref: None,
        };

        match submitter.submit(&snapshot) {
            Ok(outcome) => {
                let summary = match &outcome.result.details {
                    verifactu::aeat::SendDetails::Accepted(r)
                    | verifactu::aeat::SendDetails::Rejected(r) => format!("{:?}", r.summary()),
                    other => format!("{other:?}"),
                };
                println!(
                    "{} -> {:?} {}",
                    snapshot.series_number,
                    outcome.state(),
                    summary
                );
            }
            Err(e) => eprintln!("{}: {e}", snapshot.series_number),
        }
    }

    if let Ok(Some(head)) = store.get_last("A39200019") {
        println!("Chain head: {} ({})", head.series_number, head.fingerprint);
    }
}
