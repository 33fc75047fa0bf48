//! Canonical S-expression records.
//!
//! Grammar (canonical form only):
//!   sexp  = "(" *elem ")"
//!   elem  = sexp / atom
//!   atom  = decimal-length ":" bytes
//!
//! A key record looks like
//!   (key-data (public-key (rsa (n #..#) (e #..#)))
//!             (private-key (rsa (n ..) (e ..) (d ..) (p ..) (q ..) (u ..))))
//!
//! After the top-level list only zero bytes may follow (cipher block padding).

use std::fmt;

use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Nesting limit; key records are four levels deep.
pub const MAX_DEPTH: usize = 32;

/// Longest decimal length prefix accepted.
const MAX_LEN_DIGITS: usize = 9;

#[derive(Clone, PartialEq, Eq)]
pub enum Sexp {
    Atom(Zeroizing<Vec<u8>>),
    List(Vec<Sexp>),
}

impl Sexp {
    pub fn atom(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Atom(Zeroizing::new(bytes.into()))
    }

    pub fn list(items: impl IntoIterator<Item = Sexp>) -> Self {
        Self::List(items.into_iter().collect())
    }

    /// `(name value)` with a single data atom.
    pub fn pair(name: &str, value: impl Into<Vec<u8>>) -> Self {
        Self::list([Self::atom(name), Self::atom(value)])
    }

    pub fn as_atom(&self) -> Option<&[u8]> {
        match self {
            Self::Atom(bytes) => Some(bytes.as_slice()),
            Self::List(_) => None,
        }
    }

    pub fn items(&self) -> &[Sexp] {
        match self {
            Self::List(items) => items,
            Self::Atom(_) => &[],
        }
    }

    /// The leading atom of a list, if any.
    pub fn car(&self) -> Option<&[u8]> {
        self.items().first().and_then(Sexp::as_atom)
    }

    /// Depth-first search for the first list whose leading atom is `token`.
    pub fn find_token(&self, token: &str) -> Option<&Sexp> {
        match self {
            Self::Atom(_) => None,
            Self::List(items) => {
                if self.car() == Some(token.as_bytes()) {
                    return Some(self);
                }
                items.iter().find_map(|item| item.find_token(token))
            }
        }
    }

    /// Data atom of the `(token value)` list below this node.
    pub fn find_value(&self, token: &str) -> Option<&[u8]> {
        self.find_token(token)?.items().get(1)?.as_atom()
    }

    /// Canonical encoding.
    pub fn to_canonical(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_canonical(&mut out);
        out
    }

    fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Self::Atom(bytes) => {
                out.extend_from_slice(bytes.len().to_string().as_bytes());
                out.push(b':');
                out.extend_from_slice(bytes);
            }
            Self::List(items) => {
                out.push(b'(');
                for item in items {
                    item.write_canonical(out);
                }
                out.push(b')');
            }
        }
    }
}

/// Advanced (human readable) form: printable tokens bare, binary atoms as `#hex#`.
impl fmt::Display for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(bytes) => {
                if is_token(bytes) {
                    // checked ASCII above
                    f.write_str(std::str::from_utf8(bytes).map_err(|_| fmt::Error)?)
                } else {
                    write!(f, "#{}#", hex::encode_upper(bytes.as_slice()))
                }
            }
            Self::List(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Never prints atom contents; records carry key material.
impl fmt::Debug for Sexp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Atom(bytes) => write!(f, "Atom({} bytes)", bytes.len()),
            Self::List(items) => f.debug_list().entries(items).finish(),
        }
    }
}

fn is_token(bytes: &[u8]) -> bool {
    !bytes.is_empty()
        && !bytes[0].is_ascii_digit()
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'/' | b'_' | b':' | b'*' | b'+' | b'='))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

/// Parse one canonical S-expression. Trailing bytes must all be zero.
pub fn parse(data: &[u8]) -> Result<Sexp> {
    let mut parser = Parser { data, pos: 0 };
    if parser.peek() != Some(b'(') {
        return Err(Error::Parse("record does not start with a list".into()));
    }
    let sexp = parser.list(0)?;
    if data[parser.pos..].iter().any(|&b| b != 0) {
        return Err(Error::Parse(format!("unexpected data after record at offset {}", parser.pos)));
    }
    Ok(sexp)
}

struct Parser<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn list(&mut self, depth: usize) -> Result<Sexp> {
        if depth >= MAX_DEPTH {
            return Err(Error::Parse(format!("nesting deeper than {}", MAX_DEPTH)));
        }
        // consume '('
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            match self.peek() {
                Some(b'(') => items.push(self.list(depth + 1)?),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Sexp::List(items));
                }
                Some(b) if b.is_ascii_digit() => items.push(self.atom()?),
                Some(b) => {
                    return Err(Error::Parse(format!("unexpected byte 0x{:02x} at offset {}", b, self.pos)))
                }
                None => return Err(Error::Parse("unterminated list".into())),
            }
        }
    }

    fn atom(&mut self) -> Result<Sexp> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.pos += 1;
        }
        let digits = &self.data[start..self.pos];
        if digits.len() > MAX_LEN_DIGITS || (digits.len() > 1 && digits[0] == b'0') {
            return Err(Error::Parse(format!("bad atom length at offset {}", start)));
        }
        if self.peek() != Some(b':') {
            return Err(Error::Parse(format!("missing ':' after length at offset {}", self.pos)));
        }
        self.pos += 1;

        let len = digits.iter().fold(0usize, |acc, d| acc * 10 + usize::from(d - b'0'));
        let remaining = self.data.len() - self.pos;
        if len > remaining {
            return Err(Error::Parse(format!(
                "atom at offset {} declares {} bytes, {} remain",
                start, len, remaining
            )));
        }
        let bytes = self.data[self.pos..self.pos + len].to_vec();
        self.pos += len;
        Ok(Sexp::atom(bytes))
    }
}
