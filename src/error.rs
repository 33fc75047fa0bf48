//! Unified error type for the unlock and decrypt pipeline.
//!
//! Every failure is fatal to the pipeline. The variants keep the failure
//! classes apart because they mean different things to an operator: a
//! record that fails to parse after decryption is most likely a wrong
//! passphrase, while a record without a private key is a format problem.

use std::fmt;
use std::io;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// Error kind (cheap to compare in tests and at the CLI boundary)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Io,
    Encoding,
    Cipher,
    Parse,
    MissingKey,
    InvalidKey,
    Framing,
    Decrypt,
    Capacity,
    Passphrase,
    Usage,
}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// File open/read/write failure. `path` is `None` for stdin/stdout.
    Io { path: Option<PathBuf>, source: io::Error },
    /// Outer wrapper (armor/base64) could not be decoded.
    Encoding(String),
    /// Symmetric context setup or decryption failed.
    Cipher(String),
    /// Structured record did not parse after unsealing (likely wrong passphrase).
    Parse(String),
    /// Record parsed but holds no `private-key` token. Carries the container name.
    MissingKey(String),
    /// `private-key` token present but its parameters do not form a usable key.
    InvalidKey(String),
    /// A frame's payload would read past the end of the stream. `declared`
    /// is the payload length from the frame's prefix; `remaining` counts the
    /// bytes after that prefix.
    Framing { offset: usize, declared: usize, remaining: usize },
    /// Fewer than two bytes are left where a length prefix should start.
    TruncatedPrefix { offset: usize, remaining: usize },
    /// Asymmetric decryption of one block failed.
    Decrypt { block: usize, reason: String },
    /// A bounded buffer would have been overrun.
    Capacity { what: &'static str, needed: usize, limit: usize },
    /// Passphrase missing or rejected by policy.
    Passphrase(String),
    /// The run was configured in a way that cannot produce output.
    Usage(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } => ErrorKind::Io,
            Self::Encoding(_) => ErrorKind::Encoding,
            Self::Cipher(_) => ErrorKind::Cipher,
            Self::Parse(_) => ErrorKind::Parse,
            Self::MissingKey(_) => ErrorKind::MissingKey,
            Self::InvalidKey(_) => ErrorKind::InvalidKey,
            Self::Framing { .. } | Self::TruncatedPrefix { .. } => ErrorKind::Framing,
            Self::Decrypt { .. } => ErrorKind::Decrypt,
            Self::Capacity { .. } => ErrorKind::Capacity,
            Self::Passphrase(_) => ErrorKind::Passphrase,
            Self::Usage(_) => ErrorKind::Usage,
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> u8 {
        match self.kind() {
            ErrorKind::Usage => 2,
            _ => 1,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io { path: Some(path.into()), source }
    }

    pub(crate) fn stdio(source: io::Error) -> Self {
        Self::Io { path: None, source }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path: Some(path), source } => {
                write!(f, "i/o error on '{}': {}", path.display(), source)
            }
            Self::Io { path: None, source } => write!(f, "i/o error on standard stream: {}", source),
            Self::Encoding(msg) => write!(f, "corrupt encoding: {}", msg),
            Self::Cipher(msg) => write!(f, "cipher error: {}", msg),
            Self::Parse(msg) => write!(f, "failed to load composite key (pass?): {}", msg),
            Self::MissingKey(name) => write!(f, "no private key present in '{}'", name),
            Self::InvalidKey(msg) => write!(f, "invalid private key: {}", msg),
            Self::Framing { offset, declared, remaining } => write!(
                f,
                "reading past last byte: frame at offset {} declares {} bytes, {} remain",
                offset, declared, remaining
            ),
            Self::TruncatedPrefix { offset, remaining } => write!(
                f,
                "reading past last byte: length prefix at offset {} has only {} byte(s)",
                offset, remaining
            ),
            Self::Decrypt { block, reason } => {
                write!(f, "decryption failed on block {}: {}", block, reason)
            }
            Self::Capacity { what, needed, limit } => {
                write!(f, "{} exhausted: need {} bytes, limit is {}", what, needed, limit)
            }
            Self::Passphrase(msg) => write!(f, "passphrase: {}", msg),
            Self::Usage(msg) => write!(f, "usage: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usage_errors_exit_with_two() {
        assert_eq!(Error::Usage("need data".into()).exit_code(), 2);
        assert_eq!(Error::Parse("bad".into()).exit_code(), 1);
        assert_eq!(Error::MissingKey("k".into()).exit_code(), 1);
    }

    #[test]
    fn parse_and_missing_key_render_differently() {
        let parse = Error::Parse("unexpected byte".into()).to_string();
        let missing = Error::MissingKey("vault.key".into()).to_string();
        assert!(parse.contains("pass?"));
        assert!(missing.contains("vault.key"));
        assert_ne!(Error::Parse(String::new()).kind(), Error::MissingKey(String::new()).kind());
    }

    #[test]
    fn io_error_names_the_file() {
        let e = Error::io("/tmp/nope", io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(e.to_string().contains("/tmp/nope"));
        assert!(std::error::Error::source(&e).is_some());
    }
}
