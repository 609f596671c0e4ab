//! Global write-order sequence numbers.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Position of a write in the global order.
///
/// Only the low 56 bits are usable: internal keys pack the sequence number
/// with an 8-bit value type into one fixed64.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    pub const ZERO: SequenceNumber = SequenceNumber(0);

    /// Largest representable sequence number, `2^56 - 1`.
    pub const MAX: SequenceNumber = SequenceNumber((1 << 56) - 1);

    /// # Panics
    ///
    /// If `value` exceeds [`SequenceNumber::MAX`].
    pub fn new(value: u64) -> Self {
        assert!(value <= Self::MAX.0, "sequence number {} exceeds 2^56 - 1", value);
        SequenceNumber(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl From<SequenceNumber> for u64 {
    fn from(seq: SequenceNumber) -> u64 {
        seq.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Monotonic sequence number allocator.
///
/// Safe to share between threads; every `next` returns a distinct, strictly
/// larger number than any earlier `next` on the same counter.
#[derive(Debug, Default)]
pub struct SequenceCounter {
    last: AtomicU64,
}

impl SequenceCounter {
    /// Starts a counter whose first allocation is `last + 1`, e.g. when
    /// resuming from the largest sequence number found on disk.
    pub fn new(last: SequenceNumber) -> Self {
        Self {
            last: AtomicU64::new(last.0),
        }
    }

    /// Allocates the next sequence number.
    pub fn next(&self) -> Result<SequenceNumber> {
        self.next_n(1)
    }

    /// Reserves `n` consecutive numbers and returns the first. A write batch
    /// of `n` entries uses `first..first + n`.
    pub fn next_n(&self, n: u64) -> Result<SequenceNumber> {
        assert!(n > 0, "cannot reserve zero sequence numbers");
        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                last.checked_add(n).filter(|&end| end <= SequenceNumber::MAX.0)
            })
            .map(|prev| SequenceNumber(prev + 1))
            .map_err(|_| Error::SeqnoOverflow)
    }

    /// Most recently allocated number, or the starting point if none yet.
    pub fn last(&self) -> SequenceNumber {
        SequenceNumber(self.last.load(Ordering::SeqCst))
    }
}
