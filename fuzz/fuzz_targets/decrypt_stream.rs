#![no_main]

use diba_decrypt::assemble::decrypt_all;
use diba_decrypt::framing::split_blocks;
use diba_decrypt::{CapacityBound, PrivateKeyHandle, RustCryptoProvider};
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::SeedableRng;

static KEY: Lazy<PrivateKeyHandle> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(0xF022);
    let key = rsa::RsaPrivateKey::new(&mut rng, 512).expect("keygen");
    PrivateKeyHandle::new(key, None)
});

fuzz_target!(|data: &[u8]| {
    let Ok(blocks) = split_blocks(data) else { return };
    let limit = CapacityBound::Heuristic.limit(blocks.len(), data.len(), KEY.byte_len());
    if let Ok(plain) = decrypt_all::<RustCryptoProvider>(&blocks, &KEY, limit) {
        assert!(plain.len() <= limit);
    }
});
