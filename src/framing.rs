//! Ciphertext framing codec.
//!
//! Stream format (after the outer armor is removed):
//!   frame* where frame = len[2] (u16 little-endian) || payload[len]
//!
//! Each payload is one raw RSA ciphertext integer, big-endian. The length
//! prefix is little-endian by convention of the paired producer; it is not
//! a portable wire protocol.

use crate::error::{Error, Result};

/// Size of the per-frame length prefix.
pub const LENGTH_PREFIX_BYTES: usize = 2;

/// Largest payload one frame can declare.
pub const MAX_FRAME_PAYLOAD: usize = u16::MAX as usize;

/// One ciphertext block, borrowed from the decoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    /// Position in stream order, starting at 0.
    pub index: usize,
    /// Offset of the frame's length prefix in the stream.
    pub offset: usize,
    pub payload: &'a [u8],
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Bounds-checked forward reader over a byte slice.
#[derive(Debug, Clone)]
pub struct FrameCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos == self.data.len()
    }

    /// Take the next `n` bytes, or fail without moving.
    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.data.len())?;
        let out = &self.data[self.pos..end];
        self.pos = end;
        Some(out)
    }

    fn read_u16_le(&mut self) -> Option<u16> {
        let bytes = self.take(LENGTH_PREFIX_BYTES)?;
        Some(u16::from_le_bytes([bytes[0], bytes[1]]))
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

/// Iterator over the frames of a stream. Yields each block once, in order;
/// the first framing error ends iteration.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    cursor: FrameCursor<'a>,
    index: usize,
    failed: bool,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            cursor: FrameCursor::new(data),
            index: 0,
            failed: false,
        }
    }

    fn next_block(&mut self) -> Result<Block<'a>> {
        let offset = self.cursor.position();
        let remaining = self.cursor.remaining();

        let declared = self
            .cursor
            .read_u16_le()
            .ok_or(Error::TruncatedPrefix { offset, remaining })? as usize;

        let payload = self.cursor.take(declared).ok_or(Error::Framing {
            offset,
            declared,
            remaining: remaining - LENGTH_PREFIX_BYTES,
        })?;

        let block = Block { index: self.index, offset, payload };
        self.index += 1;
        Ok(block)
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<Block<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.is_exhausted() {
            return None;
        }
        let item = self.next_block();
        self.failed = item.is_err();
        Some(item)
    }
}

/// Split a decoded stream into blocks. Any framing error aborts the split.
pub fn split_blocks(data: &[u8]) -> Result<Vec<Block<'_>>> {
    FrameReader::new(data).collect()
}

/// Frame `payloads` into a stream that [`split_blocks`] accepts.
pub fn frame_blocks<'p, I>(payloads: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = &'p [u8]>,
{
    let mut out = Vec::new();
    for payload in payloads {
        let len = u16::try_from(payload.len()).map_err(|_| Error::Capacity {
            what: "frame payload",
            needed: payload.len(),
            limit: MAX_FRAME_PAYLOAD,
        })?;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(payload);
    }
    Ok(out)
}
