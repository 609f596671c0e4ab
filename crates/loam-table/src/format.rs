//! Sorted block layout.
//!
//! ```text
//! [entry 0] [entry 1] ... [entry N-1]
//! [restart offset: u32 LE] * R
//! [restart count R: u32 LE]
//! ```
//!
//! Each entry is:
//!
//! | Field | Encoding |
//! |-------|----------|
//! | shared key bytes with the previous entry | varint32 |
//! | unshared key bytes | varint32 |
//! | value length | varint32 |
//! | unshared key suffix | bytes |
//! | value | bytes |
//!
//! Every `restart_interval` entries the shared length is forced to zero and
//! the entry's offset is recorded as a restart point. Offset 0 is always a
//! restart point, so a block holds at least one.

/// Default target size of an uncompressed block (4 KiB).
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Entries between restart points.
pub const DEFAULT_RESTART_INTERVAL: usize = 16;

/// Bytes per restart offset and for the trailing restart count.
pub const RESTART_ENTRY_SIZE: usize = 4;

/// Smallest well-formed block: a restart count and nothing else.
pub const MIN_BLOCK_LEN: usize = RESTART_ENTRY_SIZE;
