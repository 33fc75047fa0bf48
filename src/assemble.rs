//! Block-decrypt loop: framed RSA blocks -> one contiguous plaintext buffer.

use rsa::BigUint;

use crate::buffer::SecureBuffer;
use crate::composite::PrivateKeyHandle;
use crate::error::{Error, Result};
use crate::framing::Block;
use crate::provider::PrimitiveProvider;

/// Label of the plaintext buffer in capacity errors.
pub const PLAINTEXT_LABEL: &str = "plaintext buffer";

/// Decrypt `blocks` in stream order and concatenate the results.
///
/// The output never grows past `limit`; a block that would push it over
/// fails the whole run with [`Error::Capacity`]. A block the provider cannot
/// decrypt fails it with [`Error::Decrypt`] carrying the block index.
pub fn decrypt_all<P: PrimitiveProvider>(
    blocks: &[Block<'_>],
    key: &PrivateKeyHandle,
    limit: usize,
) -> Result<SecureBuffer> {
    let mut out = SecureBuffer::with_limit(PLAINTEXT_LABEL, limit);

    for block in blocks {
        check_payload_width(block, key)?;
        let ciphertext = BigUint::from_bytes_be(block.payload);
        let plain = P::asymmetric_decrypt(&ciphertext, key).map_err(|e| Error::Decrypt {
            block: block.index,
            reason: match e {
                Error::Decrypt { reason, .. } => reason,
                other => other.to_string(),
            },
        })?;
        let bytes = P::integer_to_bytes(&plain);
        out.extend_checked(&bytes)?;
        tracing::trace!(block = block.index, produced = bytes.len(), "block decrypted");
    }

    tracing::debug!(blocks = blocks.len(), plaintext = out.len(), limit, "stream assembled");
    Ok(out)
}

fn check_payload_width(block: &Block<'_>, key: &PrivateKeyHandle) -> Result<()> {
    let width = block.payload.len();
    if width == 0 {
        return Err(Error::Decrypt { block: block.index, reason: "empty ciphertext block".into() });
    }
    if width > key.byte_len() {
        return Err(Error::Decrypt {
            block: block.index,
            reason: format!("block of {} bytes exceeds {}-byte modulus", width, key.byte_len()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer;
    use crate::error::ErrorKind;
    use crate::framing::{frame_blocks, split_blocks};
    use crate::passphrase::Passphrase;
    use crate::provider::RustCryptoProvider;
    use crate::sexp::Sexp;
    use rsa::RsaPrivateKey;

    fn textbook_key() -> PrivateKeyHandle {
        let key = RsaPrivateKey::from_components(
            BigUint::from(3233u32),
            BigUint::from(17u32),
            BigUint::from(2753u32),
            vec![BigUint::from(61u32), BigUint::from(53u32)],
        )
        .unwrap();
        PrivateKeyHandle::new(key, None)
    }

    /// Returns a value one byte wider than the modulus for every block.
    struct Bloated;

    impl PrimitiveProvider for Bloated {
        fn decode_container_encoding(data: &[u8]) -> Result<SecureBuffer> {
            RustCryptoProvider::decode_container_encoding(data)
        }
        fn decode_stream_encoding(data: &[u8]) -> Result<SecureBuffer> {
            RustCryptoProvider::decode_stream_encoding(data)
        }
        fn symmetric_decrypt(buffer: &mut SecureBuffer, passphrase: &Passphrase) -> Result<()> {
            RustCryptoProvider::symmetric_decrypt(buffer, passphrase)
        }
        fn parse_structured_record(data: &[u8]) -> Result<Sexp> {
            RustCryptoProvider::parse_structured_record(data)
        }
        fn private_key_from_record(private_key: &Sexp) -> Result<RsaPrivateKey> {
            RustCryptoProvider::private_key_from_record(private_key)
        }
        fn asymmetric_decrypt(_ciphertext: &BigUint, key: &PrivateKeyHandle) -> Result<BigUint> {
            Ok(BigUint::from_bytes_be(&vec![0xFF; key.byte_len() + 1]))
        }
    }

    /// Fails on every block.
    struct Broken;

    impl PrimitiveProvider for Broken {
        fn decode_container_encoding(data: &[u8]) -> Result<SecureBuffer> {
            RustCryptoProvider::decode_container_encoding(data)
        }
        fn decode_stream_encoding(data: &[u8]) -> Result<SecureBuffer> {
            RustCryptoProvider::decode_stream_encoding(data)
        }
        fn symmetric_decrypt(buffer: &mut SecureBuffer, passphrase: &Passphrase) -> Result<()> {
            RustCryptoProvider::symmetric_decrypt(buffer, passphrase)
        }
        fn parse_structured_record(data: &[u8]) -> Result<Sexp> {
            RustCryptoProvider::parse_structured_record(data)
        }
        fn private_key_from_record(private_key: &Sexp) -> Result<RsaPrivateKey> {
            RustCryptoProvider::private_key_from_record(private_key)
        }
        fn asymmetric_decrypt(_ciphertext: &BigUint, _key: &PrivateKeyHandle) -> Result<BigUint> {
            Err(Error::Cipher("hardware gone".into()))
        }
    }

    #[test]
    fn textbook_known_answer() {
        // 65^17 mod 3233 = 2790
        let key = textbook_key();
        let stream = frame_blocks([&2790u16.to_be_bytes()[..]]).unwrap();
        let blocks = split_blocks(&stream).unwrap();
        let out = decrypt_all::<RustCryptoProvider>(&blocks, &key, 2).unwrap();
        assert_eq!(out.as_slice(), &[65]);
    }

    #[test]
    fn blocks_concatenate_in_order() {
        let key = textbook_key();
        let c66 = BigUint::from(66u32).modpow(&BigUint::from(17u32), &BigUint::from(3233u32));
        let c66 = c66.to_bytes_be();
        let stream = frame_blocks([&2790u16.to_be_bytes()[..], c66.as_slice()]).unwrap();
        let blocks = split_blocks(&stream).unwrap();
        let out = decrypt_all::<RustCryptoProvider>(&blocks, &key, 4).unwrap();
        assert_eq!(out.as_slice(), &[65, 66]);
    }

    #[test]
    fn no_blocks_no_plaintext() {
        let out = decrypt_all::<RustCryptoProvider>(&[], &textbook_key(), 0).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn over_production_is_a_capacity_error() {
        let key = textbook_key();
        let stream = frame_blocks([&[1u8][..], &[2u8][..]]).unwrap();
        let blocks = split_blocks(&stream).unwrap();
        let before = buffer::outstanding();
        let err = decrypt_all::<Bloated>(&blocks, &key, blocks.len() * key.byte_len()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);
        assert_eq!(buffer::outstanding(), before);
    }

    #[test]
    fn failure_names_the_block() {
        let key = textbook_key();
        let stream = frame_blocks([&[1u8][..]]).unwrap();
        let blocks = split_blocks(&stream).unwrap();
        match decrypt_all::<Broken>(&blocks, &key, 16).unwrap_err() {
            Error::Decrypt { block, reason } => {
                assert_eq!(block, 0);
                assert!(reason.contains("hardware gone"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn empty_frame_fails_on_block_zero() {
        let key = textbook_key();
        let stream = frame_blocks([&b""[..], &2790u16.to_be_bytes()[..]]).unwrap();
        let blocks = split_blocks(&stream).unwrap();
        let before = buffer::outstanding();
        match decrypt_all::<Broken>(&blocks, &key, 4).unwrap_err() {
            Error::Decrypt { block, reason } => {
                assert_eq!(block, 0);
                assert!(reason.contains("empty"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(buffer::outstanding(), before);
    }

    #[test]
    fn empty_frame_after_good_blocks_names_its_index() {
        let key = textbook_key();
        let stream = frame_blocks([&2790u16.to_be_bytes()[..], &b""[..]]).unwrap();
        let blocks = split_blocks(&stream).unwrap();
        match decrypt_all::<RustCryptoProvider>(&blocks, &key, 4).unwrap_err() {
            Error::Decrypt { block, .. } => assert_eq!(block, 1),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn payload_wider_than_modulus_is_rejected() {
        let key = textbook_key();
        let stream = frame_blocks([&[0x00, 0x0A, 0xE6][..]]).unwrap();
        let blocks = split_blocks(&stream).unwrap();
        match decrypt_all::<Broken>(&blocks, &key, 4).unwrap_err() {
            Error::Decrypt { block, reason } => {
                assert_eq!(block, 0);
                assert!(reason.contains("exceeds 2-byte modulus"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn ciphertext_above_modulus_fails_decrypt() {
        let key = textbook_key();
        let stream = frame_blocks([&2790u16.to_be_bytes()[..], &[0xFF, 0xFF][..]]).unwrap();
        let blocks = split_blocks(&stream).unwrap();
        match decrypt_all::<RustCryptoProvider>(&blocks, &key, 4).unwrap_err() {
            Error::Decrypt { block, .. } => assert_eq!(block, 1),
            other => panic!("unexpected error: {}", other),
        }
    }
}
