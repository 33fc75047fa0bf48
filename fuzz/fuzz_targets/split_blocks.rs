#![no_main]

use diba_decrypt::framing::{split_blocks, LENGTH_PREFIX_BYTES};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(blocks) = split_blocks(data) {
        let consumed: usize = blocks.iter().map(|b| LENGTH_PREFIX_BYTES + b.payload.len()).sum();
        assert_eq!(consumed, data.len());
    }
});
