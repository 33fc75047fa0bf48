//! Sealed composite-key container (symmetric layer).
//!
//! Format (after the armor is removed):
//!   magic[4] = "DCK1" || iterations[4] (u32 BE) || salt[16] || iv[16]
//!   || ciphertext[16 * k], k >= 1
//!
//! key        = PBKDF2-HMAC-SHA256(passphrase, salt, iterations, 32)
//! ciphertext = AES-256-CBC(key, iv, record || zero padding), no padding scheme
//!
//! CBC without authentication is deliberate for this format: a wrong
//! passphrase is only detected when the decrypted record fails to parse.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, KeyIvInit};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::buffer::SecureBuffer;
use crate::error::{Error, Result};
use crate::passphrase::Passphrase;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

pub const MAGIC: &[u8; 4] = b"DCK1";

pub const SALT_BYTES: usize = 16;
pub const IV_BYTES: usize = 16;
pub const CIPHER_BLOCK_BYTES: usize = 16;
pub const KEY_BYTES: usize = 32;

/// magic + iterations + salt + iv
pub const HEADER_BYTES: usize = 4 + 4 + SALT_BYTES + IV_BYTES; // 40

/// Upper bound on PBKDF2 rounds accepted from a container header.
pub const MAX_ITERATIONS: u32 = 10_000_000;

/// Borrowed view of a container header.
#[derive(Debug, Clone, Copy)]
pub struct SealedHeader<'a> {
    pub iterations: u32,
    pub salt: &'a [u8; SALT_BYTES],
    pub iv: &'a [u8; IV_BYTES],
    pub body_len: usize,
}

pub fn parse_header(data: &[u8]) -> Result<SealedHeader<'_>> {
    if data.len() < MAGIC.len() || &data[..MAGIC.len()] != MAGIC {
        return Err(Error::Encoding("not a sealed composite key (bad magic)".into()));
    }
    if data.len() < HEADER_BYTES {
        return Err(Error::Cipher(format!("truncated container header ({} bytes)", data.len())));
    }

    let iterations = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if iterations == 0 || iterations > MAX_ITERATIONS {
        return Err(Error::Cipher(format!("unsupported KDF iteration count {}", iterations)));
    }

    let salt: &[u8; SALT_BYTES] = data[8..8 + SALT_BYTES]
        .try_into()
        .map_err(|_| Error::Cipher("bad salt".into()))?;
    let iv: &[u8; IV_BYTES] = data[8 + SALT_BYTES..HEADER_BYTES]
        .try_into()
        .map_err(|_| Error::Cipher("bad iv".into()))?;

    let body_len = data.len() - HEADER_BYTES;
    if body_len == 0 || body_len % CIPHER_BLOCK_BYTES != 0 {
        return Err(Error::Cipher(format!(
            "ciphertext length {} is not a positive multiple of {}",
            body_len, CIPHER_BLOCK_BYTES
        )));
    }

    Ok(SealedHeader { iterations, salt, iv, body_len })
}

/// Stretch the passphrase into the AES-256 key.
pub fn derive_key(passphrase: &[u8], salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_BYTES]> {
    let mut key = Zeroizing::new([0u8; KEY_BYTES]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase, salt, iterations, key.as_mut_slice());
    key
}

/// Decrypt the container in place. On success `buf` holds the padded record
/// and the header is gone.
pub fn unseal_in_place(buf: &mut SecureBuffer, passphrase: &Passphrase) -> Result<()> {
    let (iterations, salt, iv, body_len) = {
        let h = parse_header(buf.as_slice())?;
        (h.iterations, *h.salt, *h.iv, h.body_len)
    };
    tracing::debug!(iterations, body_len, "unsealing composite key");

    let key = derive_key(passphrase.as_bytes(), &salt, iterations);
    let cipher = Aes256CbcDec::new_from_slices(key.as_slice(), &iv)
        .map_err(|e| Error::Cipher(format!("cipher setup failed: {}", e)))?;

    let plain_len = cipher
        .decrypt_padded_mut::<NoPadding>(&mut buf.as_mut_slice()[HEADER_BYTES..])
        .map_err(|_| Error::Cipher("failed to decrypt key pair".into()))?
        .len();

    buf.discard_front(HEADER_BYTES);
    buf.truncate(plain_len);
    Ok(())
}
