#![no_main]

use diba_decrypt::provider::{PrimitiveProvider, RustCryptoProvider};
use diba_decrypt::sexp;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(record) = sexp::parse(data) {
        let canonical = record.to_canonical();
        assert_eq!(sexp::parse(&canonical).ok(), Some(record.clone()));
        if let Some(private) = RustCryptoProvider::find_token(&record, "private-key") {
            let _ = RustCryptoProvider::private_key_from_record(private);
        }
    }
});
