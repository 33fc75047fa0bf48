//! Owned byte buffers with a hard capacity limit and an allocation ledger.
//!
//! Every buffer the pipeline owns (raw container, decoded input, plaintext)
//! is a [`SecureBuffer`]. Contents are zeroized on drop. Each buffer
//! registers itself in a per-thread ledger so a run can be checked for
//! leaked buffers at teardown.

use std::cell::Cell;
use std::fmt;
use std::ops::Deref;

use zeroize::Zeroize;

use crate::error::{Error, Result};

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Snapshot of the current thread's buffer ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    /// Buffers allocated and not yet dropped.
    pub live: usize,
    /// Buffers allocated since the thread started.
    pub allocated: u64,
    /// Buffers dropped since the thread started.
    pub released: u64,
    /// Largest number of simultaneously live buffers.
    pub peak: usize,
}

thread_local! {
    static LEDGER: Cell<LedgerStats> = const {
        Cell::new(LedgerStats { live: 0, allocated: 0, released: 0, peak: 0 })
    };
}

fn record_alloc() {
    LEDGER.with(|l| {
        let mut s = l.get();
        s.live += 1;
        s.allocated += 1;
        s.peak = s.peak.max(s.live);
        l.set(s);
    });
}

fn record_release() {
    LEDGER.with(|l| {
        let mut s = l.get();
        s.live = s.live.saturating_sub(1);
        s.released += 1;
        l.set(s);
    });
}

/// Ledger snapshot for the calling thread.
pub fn stats() -> LedgerStats {
    LEDGER.with(|l| l.get())
}

/// Number of buffers currently live on the calling thread.
pub fn outstanding() -> usize {
    stats().live
}

/// Log the ledger and return the number of leaked buffers.
pub fn report_leaks() -> usize {
    let s = stats();
    if s.live == 0 {
        tracing::debug!(allocated = s.allocated, peak = s.peak, "no outstanding buffers");
    } else {
        tracing::warn!(live = s.live, allocated = s.allocated, released = s.released, "buffers leaked");
    }
    s.live
}

// ---------------------------------------------------------------------------
// SecureBuffer
// ---------------------------------------------------------------------------

/// Growable byte buffer that refuses to grow past its limit.
pub struct SecureBuffer {
    label: &'static str,
    data: Vec<u8>,
    limit: usize,
}

impl SecureBuffer {
    /// Empty buffer that may hold at most `limit` bytes.
    ///
    /// Nothing is reserved up front; storage grows with each append and
    /// never past the limit.
    pub fn with_limit(label: &'static str, limit: usize) -> Self {
        record_alloc();
        Self {
            label,
            data: Vec::new(),
            limit,
        }
    }

    /// Take ownership of `data`; the limit is its current length.
    pub fn from_vec(label: &'static str, data: Vec<u8>) -> Self {
        record_alloc();
        let limit = data.len();
        Self { label, data, limit }
    }

    /// Append `bytes`, failing with [`Error::Capacity`] instead of growing
    /// past the limit. Nothing is written on failure.
    pub fn extend_checked(&mut self, bytes: &[u8]) -> Result<()> {
        let needed = self
            .data
            .len()
            .checked_add(bytes.len())
            .ok_or(Error::Capacity { what: self.label, needed: usize::MAX, limit: self.limit })?;
        if needed > self.limit {
            return Err(Error::Capacity { what: self.label, needed, limit: self.limit });
        }
        self.grow_to(needed);
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    /// Move into a larger allocation, wiping the old one. Capacity doubles
    /// but is clamped to the limit.
    fn grow_to(&mut self, needed: usize) {
        if needed <= self.data.capacity() {
            return;
        }
        let target = needed.max(self.data.capacity().saturating_mul(2)).min(self.limit);
        let mut grown = Vec::with_capacity(target);
        grown.extend_from_slice(&self.data);
        let mut old = std::mem::replace(&mut self.data, grown);
        old.zeroize();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit - self.data.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Drop the first `n` bytes, shifting the rest to the front.
    pub fn discard_front(&mut self, n: usize) {
        let n = n.min(self.data.len());
        self.data[..n].zeroize();
        self.data.drain(..n);
    }

    /// Shorten to `len` bytes, wiping the tail.
    pub fn truncate(&mut self, len: usize) {
        if len < self.data.len() {
            self.data[len..].zeroize();
            self.data.truncate(len);
        }
    }
}

impl Deref for SecureBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for SecureBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl Drop for SecureBuffer {
    fn drop(&mut self) {
        self.data.zeroize();
        record_release();
    }
}

impl fmt::Debug for SecureBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureBuffer")
            .field("label", &self.label)
            .field("len", &self.data.len())
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
