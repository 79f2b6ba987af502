use chrono::{DateTime, NaiveDate};
use rust_decimal_macros::dec;
use verifactu::core::*;

fn main() {
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

    // First record of the issuer: empty previous fingerprint
    let record = RegistrationBuilder::new(InvoiceId::new(
        "A39200019",
        "F-2025-0001",
        NaiveDate::from_ymd_opt(2025, 8, 10).unwrap(),
    ))
    .version(IdVersion::V1_0)
    .issuer_name("Empresa SA")
    .invoice_type(InvoiceType::Invoice)
    .description("Desarrollo de software")
    .recipient(Party::with_nif("Cliente SL", "B87654321"))
    .add_breakdown(TaxBreakdownEntry::taxed(dec!(800), dec!(21), dec!(168)))
    .add_breakdown(TaxBreakdownEntry::taxed(dec!(50), dec!(10), dec!(5)))
    .total_quota(dec!(173))
    .total_amount(dec!(1023))
    .chain(ChainLink::FirstInChain)
    .system(system)
    .generated_at(DateTime::parse_from_rfc3339("2025-08-10T09:30:00+02:00").unwrap())
    .build()
    .unwrap()
    .seal()
    .unwrap();

    println!("Canonical: {}", canonical_input(&record).unwrap());
    println!("Huella:    {}", record.fingerprint.as_ref().unwrap().value);
    println!("---");
    println!("{}", record.to_xml().unwrap().to_pretty_string().unwrap());
}
