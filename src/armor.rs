//! Outer text encoding for key containers and ciphertext streams.
//!
//! Format:
//!   -----BEGIN <LABEL>-----
//!   base64 body (standard alphabet, padded, any line length)
//!   -----END <LABEL>-----
//!
//! The BEGIN/END lines are optional; a bare base64 body is accepted.
//! Whitespace inside the body is ignored.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::buffer::SecureBuffer;
use crate::error::{Error, Result};

/// Armor label of a sealed composite-key container.
pub const CONTAINER_LABEL: &str = "DIBA COMPOSITE KEY";

/// Armor label of a framed RSA ciphertext stream.
pub const STREAM_LABEL: &str = "DIBA RSA CIPHER";

const BEGIN: &str = "-----BEGIN ";
const END: &str = "-----END ";
const DASHES: &str = "-----";

/// Decode an armored (or bare base64) payload into an owned buffer.
pub fn decode(data: &[u8], label: &'static str) -> Result<SecureBuffer> {
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::Encoding(format!("{} is not text", label.to_lowercase())))?;
    let text = text.trim();

    let body = if text.starts_with(BEGIN) {
        strip_armor(text, label)?
    } else {
        text
    };

    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if compact.is_empty() {
        return Err(Error::Encoding(format!("empty {} payload", label.to_lowercase())));
    }

    let decoded = STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| Error::Encoding(format!("invalid base64 in {}: {}", label.to_lowercase(), e)))?;
    Ok(SecureBuffer::from_vec(label, decoded))
}

/// Wrap `data` in BEGIN/END lines with 64-column base64.
pub fn encode(data: &[u8], label: &str) -> String {
    let b64 = STANDARD.encode(data);
    let mut out = String::with_capacity(b64.len() + b64.len() / 64 + 2 * (label.len() + 32));
    out.push_str(BEGIN);
    out.push_str(label);
    out.push_str(DASHES);
    out.push('\n');
    for line in b64.as_bytes().chunks(64) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(line).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(END);
    out.push_str(label);
    out.push_str(DASHES);
    out.push('\n');
    out
}

fn strip_armor<'a>(text: &'a str, label: &str) -> Result<&'a str> {
    let (first, rest) = text.split_once('\n').unwrap_or((text, ""));
    let found = first
        .trim_end()
        .strip_prefix(BEGIN)
        .and_then(|l| l.strip_suffix(DASHES))
        .ok_or_else(|| Error::Encoding("malformed BEGIN line".into()))?;
    if found != label {
        return Err(Error::Encoding(format!("expected '{}' block, found '{}'", label, found)));
    }

    let footer = format!("{}{}{}", END, label, DASHES);
    let end = rest
        .find(&footer)
        .ok_or_else(|| Error::Encoding(format!("missing END line for '{}'", label)))?;
    if !rest[end + footer.len()..].trim().is_empty() {
        return Err(Error::Encoding("trailing data after END line".into()));
    }
    Ok(&rest[..end])
}
