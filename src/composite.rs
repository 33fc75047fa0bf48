//! Composite-key loader: container bytes -> unlocked private-key handle.

use std::fmt;
use std::marker::PhantomData;
use std::time::Duration;

use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use sha3::{Digest, Sha3_256};

use crate::buffer::SecureBuffer;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::passphrase::Passphrase;
use crate::provider::PrimitiveProvider;
use crate::sexp::Sexp;

/// Token that marks the private half of a key record.
pub const PRIVATE_KEY_TOKEN: &str = "private-key";

/// Token that marks the public half of a key record.
pub const PUBLIC_KEY_TOKEN: &str = "public-key";

// ---------------------------------------------------------------------------
// Private-key handle
// ---------------------------------------------------------------------------

/// Unlocked RSA key. Read-only after construction; the `rsa` crate wipes
/// the private parameters on drop.
pub struct PrivateKeyHandle {
    key: RsaPrivateKey,
    public: Sexp,
}

impl PrivateKeyHandle {
    /// `public` is the record's `(public-key ...)` entry, when it has one.
    pub fn new(key: RsaPrivateKey, public: Option<Sexp>) -> Self {
        let public = public.unwrap_or_else(|| public_record(&key));
        Self { key, public }
    }

    pub fn rsa(&self) -> &RsaPrivateKey {
        &self.key
    }

    /// Modulus length in bits.
    pub fn bits(&self) -> usize {
        self.key.n().bits()
    }

    /// Modulus length in bytes; the largest plaintext one block can yield.
    pub fn byte_len(&self) -> usize {
        self.key.size()
    }

    /// Public portion of the record.
    pub fn public_record(&self) -> &Sexp {
        &self.public
    }

    /// SHA3-256 over the canonical public record, hex encoded.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha3_256::digest(self.public.to_canonical()))
    }
}

impl fmt::Debug for PrivateKeyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKeyHandle")
            .field("bits", &self.bits())
            .finish_non_exhaustive()
    }
}

fn public_record(key: &RsaPrivateKey) -> Sexp {
    Sexp::list([
        Sexp::atom(PUBLIC_KEY_TOKEN),
        Sexp::list([
            Sexp::atom("rsa"),
            Sexp::pair("n", key.n().to_bytes_be()),
            Sexp::pair("e", key.e().to_bytes_be()),
        ]),
    ])
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

pub struct KeyLoader<P: PrimitiveProvider> {
    skip_decrypt: bool,
    failure_delay: Duration,
    _marker: PhantomData<P>,
}

impl<P: PrimitiveProvider> KeyLoader<P> {
    pub fn new(skip_decrypt: bool, failure_delay: Duration) -> Self {
        Self {
            skip_decrypt,
            failure_delay,
            _marker: PhantomData,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.skip_decrypt, config.unlock_failure_delay)
    }

    /// Unlock the container. `name` identifies it in error messages.
    pub fn load(&self, name: &str, container: &[u8], passphrase: &Passphrase) -> Result<PrivateKeyHandle> {
        let decoded = self.decode(name, container)?;
        self.unlock(name, decoded, passphrase)
    }

    /// Strip the container's outer encoding. Needs no passphrase, so a
    /// corrupt file is rejected before anyone is asked for one.
    pub fn decode(&self, name: &str, container: &[u8]) -> Result<SecureBuffer> {
        if container.is_empty() {
            return Err(Error::Encoding(format!("composite key '{}' is empty", name)));
        }
        P::decode_container_encoding(container).map_err(|e| match e {
            Error::Encoding(msg) => Error::Encoding(format!("decode key failed for '{}': {}", name, msg)),
            other => other,
        })
    }

    /// Decrypt and parse a container already passed through [`Self::decode`].
    pub fn unlock(&self, name: &str, mut record_bytes: SecureBuffer, passphrase: &Passphrase) -> Result<PrivateKeyHandle> {
        if !self.skip_decrypt && passphrase.is_empty() {
            return Err(Error::Passphrase("empty passphrase".into()));
        }

        if !self.skip_decrypt {
            P::symmetric_decrypt(&mut record_bytes, passphrase)?;
        }

        let record = match P::parse_structured_record(record_bytes.as_slice()) {
            Ok(record) => record,
            Err(e) => {
                // Slow down automated passphrase guessing.
                tracing::warn!(container = name, "composite key did not parse; delaying rejection");
                std::thread::sleep(self.failure_delay);
                return Err(match e {
                    Error::Parse(msg) => Error::Parse(msg),
                    other => Error::Parse(other.to_string()),
                });
            }
        };
        drop(record_bytes);

        let private = P::find_token(&record, PRIVATE_KEY_TOKEN)
            .ok_or_else(|| Error::MissingKey(name.to_string()))?;
        let key = P::private_key_from_record(private)?;
        let public = P::find_token(&record, PUBLIC_KEY_TOKEN).cloned();

        let handle = PrivateKeyHandle::new(key, public);
        if handle.bits() == 0 {
            return Err(Error::InvalidKey("modulus has no bits".into()));
        }
        tracing::debug!(container = name, bits = handle.bits(), "composite key unlocked");
        Ok(handle)
    }
}
