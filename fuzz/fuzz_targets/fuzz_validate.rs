#![no_main]

use libfuzzer_sys::fuzz_target;
use verifactu::validate::{DocumentValidator, UblValidator, VerifactuValidator};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let result = VerifactuValidator::new().validate(s);
        let _ = result.summary();
        let _ = result.to_json();
        let _ = UblValidator::xrechnung().validate(s);
    }
});
