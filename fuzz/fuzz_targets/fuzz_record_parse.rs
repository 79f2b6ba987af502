#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        // errors are fine, panics are bugs
        if let Ok(record) = verifactu::Record::from_xml_str(s) {
            let _ = record.verify_fingerprint();
            if record.fingerprint.is_some() {
                let xml = record.to_xml_string().expect("parsed record must serialize");
                let again = verifactu::Record::from_xml_str(&xml).expect("own output must parse");
                assert_eq!(record, again);
            }
        }
    }
});
