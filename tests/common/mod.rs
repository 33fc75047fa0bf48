//! Producer side for the integration tests: key generation, sealed
//! containers and framed raw-RSA streams.

#![allow(dead_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use aes::cipher::{block_padding::NoPadding, BlockEncryptMut, KeyIvInit};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rsa::traits::{PrivateKeyParts, PublicKeyParts};
use rsa::{BigUint, RsaPrivateKey};

use diba_decrypt::sexp::Sexp;
use diba_decrypt::{armor, container, framing, PassphrasePrompt};

pub const PASS: &str = "correct-horse";

/// Low round count keeps the debug-build tests fast.
pub const TEST_ITERATIONS: u32 = 1000;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

pub fn key_1024() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| generate(1024, 0xD1BA))
}

pub fn key_512() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| generate(512, 0x0512))
}

fn generate(bits: usize, seed: u64) -> RsaPrivateKey {
    let mut rng = StdRng::seed_from_u64(seed);
    RsaPrivateKey::new(&mut rng, bits).expect("keygen")
}

/// Unsigned MPI the way the container producer writes it: minimal
/// big-endian with a leading zero when the high bit is set.
fn mpi(v: &BigUint) -> Vec<u8> {
    let bytes = v.to_bytes_be();
    if bytes[0] & 0x80 != 0 {
        let mut out = vec![0];
        out.extend_from_slice(&bytes);
        out
    } else {
        bytes
    }
}

pub fn public_record(key: &RsaPrivateKey) -> Sexp {
    Sexp::list([
        Sexp::atom("public-key"),
        Sexp::list([Sexp::atom("rsa"), Sexp::pair("n", mpi(key.n())), Sexp::pair("e", mpi(key.e()))]),
    ])
}

pub fn private_record(key: &RsaPrivateKey) -> Sexp {
    let primes = key.primes();
    Sexp::list([
        Sexp::atom("private-key"),
        Sexp::list([
            Sexp::atom("rsa"),
            Sexp::pair("n", mpi(key.n())),
            Sexp::pair("e", mpi(key.e())),
            Sexp::pair("d", mpi(key.d())),
            Sexp::pair("p", mpi(&primes[0])),
            Sexp::pair("q", mpi(&primes[1])),
        ]),
    ])
}

/// `(key-data (public-key ...) (private-key ...))`
pub fn key_record(key: &RsaPrivateKey) -> Vec<u8> {
    Sexp::list([Sexp::atom("key-data"), public_record(key), private_record(key)]).to_canonical()
}

/// A record that decrypts fine but has no private half.
pub fn public_only_record(key: &RsaPrivateKey) -> Vec<u8> {
    Sexp::list([Sexp::atom("key-data"), public_record(key)]).to_canonical()
}

/// Sealed and armored container.
pub fn seal(record: &[u8], pass: &str) -> String {
    let mut rng = StdRng::seed_from_u64(record.len() as u64);
    let salt: [u8; container::SALT_BYTES] = rng.gen();
    let iv: [u8; container::IV_BYTES] = rng.gen();

    let mut body = record.to_vec();
    let padded = record.len().div_ceil(container::CIPHER_BLOCK_BYTES) * container::CIPHER_BLOCK_BYTES;
    body.resize(padded, 0);
    let key = container::derive_key(pass.as_bytes(), &salt, TEST_ITERATIONS);
    Aes256CbcEnc::new_from_slices(key.as_slice(), &iv)
        .expect("cipher setup")
        .encrypt_padded_mut::<NoPadding>(&mut body, padded)
        .expect("block aligned");

    let mut out = container::MAGIC.to_vec();
    out.extend_from_slice(&TEST_ITERATIONS.to_be_bytes());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&iv);
    out.extend_from_slice(&body);
    armor::encode(&out, armor::CONTAINER_LABEL)
}

/// Unsealed container for no-decrypt mode.
pub fn plain(record: &[u8]) -> String {
    armor::encode(record, armor::CONTAINER_LABEL)
}

/// Raw-RSA encrypt each chunk, pad to the modulus width and frame.
pub fn encrypt_chunks(key: &RsaPrivateKey, chunks: &[&[u8]]) -> Vec<u8> {
    let width = key.size();
    let payloads: Vec<Vec<u8>> = chunks
        .iter()
        .map(|chunk| {
            let c = BigUint::from_bytes_be(chunk).modpow(key.e(), key.n()).to_bytes_be();
            let mut payload = vec![0u8; width - c.len()];
            payload.extend_from_slice(&c);
            payload
        })
        .collect();
    framing::frame_blocks(payloads.iter().map(Vec::as_slice)).expect("frame")
}

pub fn stream(key: &RsaPrivateKey, chunks: &[&[u8]]) -> String {
    armor::encode(&encrypt_chunks(key, chunks), armor::STREAM_LABEL)
}

/// Random chunk that survives minimal serialization (no leading zero).
pub fn random_chunk(rng: &mut StdRng, len: usize) -> Vec<u8> {
    let mut chunk: Vec<u8> = (0..len).map(|_| rng.gen()).collect();
    if let Some(first) = chunk.first_mut() {
        *first = rng.gen_range(1..=0x7F);
    }
    chunk
}

pub fn write(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write fixture");
    path
}

pub fn data_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data").join(name)
}

/// Answers every prompt with the same passphrase and counts the prompts.
pub struct Fixed {
    pub answer: &'static str,
    pub asked: usize,
}

impl Fixed {
    pub fn new(answer: &'static str) -> Self {
        Self { answer, asked: 0 }
    }
}

impl PassphrasePrompt for Fixed {
    fn read_passphrase(&mut self, _prompt: &str) -> io::Result<String> {
        self.asked += 1;
        Ok(self.answer.to_string())
    }
}
