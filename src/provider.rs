//! Primitive provider: the narrow seam between the pipeline and the
//! cryptographic/decoding primitives it consumes.
//!
//! The pipeline never touches AES, RSA, base64 or the record parser
//! directly; it goes through a [`PrimitiveProvider`]. The default
//! implementation, [`RustCryptoProvider`], is built on the RustCrypto crates.

use rand_core::OsRng;
use rsa::{BigUint, RsaPrivateKey};
use zeroize::Zeroizing;

use crate::armor;
use crate::buffer::SecureBuffer;
use crate::composite::PrivateKeyHandle;
use crate::container;
use crate::error::{Error, Result};
use crate::passphrase::Passphrase;
use crate::sexp::{self, Sexp};

// ---------------------------------------------------------------------------
// Provider trait
// ---------------------------------------------------------------------------

pub trait PrimitiveProvider {
    /// Remove the key container's outer wrapping.
    fn decode_container_encoding(data: &[u8]) -> Result<SecureBuffer>;

    /// Remove the ciphertext stream's outer wrapping.
    fn decode_stream_encoding(data: &[u8]) -> Result<SecureBuffer>;

    /// Decrypt the container in place with a passphrase-derived key.
    fn symmetric_decrypt(buffer: &mut SecureBuffer, passphrase: &Passphrase) -> Result<()>;

    /// Parse decrypted container bytes into a structured record.
    fn parse_structured_record(data: &[u8]) -> Result<Sexp>;

    fn find_token<'a>(record: &'a Sexp, name: &str) -> Option<&'a Sexp> {
        record.find_token(name)
    }

    /// Build the RSA key from a `(private-key ...)` record.
    fn private_key_from_record(private_key: &Sexp) -> Result<RsaPrivateKey>;

    /// Raw RSA decryption of one ciphertext integer.
    fn asymmetric_decrypt(ciphertext: &BigUint, key: &PrivateKeyHandle) -> Result<BigUint>;

    /// Minimal unsigned big-endian serialization; zero has no bytes.
    fn integer_to_bytes(value: &BigUint) -> Zeroizing<Vec<u8>> {
        if value.bits() == 0 {
            Zeroizing::new(Vec::new())
        } else {
            Zeroizing::new(value.to_bytes_be())
        }
    }
}

// ---------------------------------------------------------------------------
// RustCrypto implementation
// ---------------------------------------------------------------------------

/// Armor + AES-256-CBC/PBKDF2 + canonical S-expressions + raw RSA.
pub struct RustCryptoProvider;

impl PrimitiveProvider for RustCryptoProvider {
    fn decode_container_encoding(data: &[u8]) -> Result<SecureBuffer> {
        armor::decode(data, armor::CONTAINER_LABEL)
    }

    fn decode_stream_encoding(data: &[u8]) -> Result<SecureBuffer> {
        armor::decode(data, armor::STREAM_LABEL)
    }

    fn symmetric_decrypt(buffer: &mut SecureBuffer, passphrase: &Passphrase) -> Result<()> {
        container::unseal_in_place(buffer, passphrase)
    }

    fn parse_structured_record(data: &[u8]) -> Result<Sexp> {
        sexp::parse(data)
    }

    fn private_key_from_record(private_key: &Sexp) -> Result<RsaPrivateKey> {
        let params = private_key
            .find_token("rsa")
            .ok_or_else(|| Error::InvalidKey("private-key holds no rsa parameters".into()))?;

        let n = required_mpi(params, "n")?;
        let e = required_mpi(params, "e")?;
        let d = required_mpi(params, "d")?;
        // Without both primes the rsa crate recovers them from (n, e, d).
        let primes = match (params.find_value("p"), params.find_value("q")) {
            (Some(p), Some(q)) => vec![BigUint::from_bytes_be(p), BigUint::from_bytes_be(q)],
            _ => Vec::new(),
        };

        RsaPrivateKey::from_components(n, e, d, primes)
            .map_err(|e| Error::InvalidKey(format!("rsa parameters rejected: {}", e)))
    }

    fn asymmetric_decrypt(ciphertext: &BigUint, key: &PrivateKeyHandle) -> Result<BigUint> {
        rsa::hazmat::rsa_decrypt_and_check(key.rsa(), Some(&mut OsRng), ciphertext).map_err(|e| {
            Error::Decrypt { block: 0, reason: e.to_string() }
        })
    }
}

fn required_mpi(params: &Sexp, name: &str) -> Result<BigUint> {
    let bytes = params
        .find_value(name)
        .ok_or_else(|| Error::InvalidKey(format!("missing rsa parameter '{}'", name)))?;
    let value = BigUint::from_bytes_be(bytes);
    if value.bits() == 0 {
        return Err(Error::InvalidKey(format!("rsa parameter '{}' is zero", name)));
    }
    Ok(value)
}
