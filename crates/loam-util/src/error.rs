//! Error types for loam-util.

use thiserror::Error;

/// Malformed-input conditions reported by the decoders in [`crate::coding`].
///
/// A decode failure means "stop parsing this structure": the input cursor is
/// left where it was before the failed call, but nothing after it can be
/// trusted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodingError {
    /// Input ended before a fixed-width value or varint terminator.
    #[error("Incomplete data")]
    Incomplete,

    /// Varint kept its continuation bit set past the widest legal encoding.
    #[error("varint longer than {max_bytes} bytes")]
    VarintOverflow { max_bytes: usize },

    /// Length-prefixed slice declares more bytes than the input holds.
    #[error("length prefix {declared} exceeds remaining input {remaining}")]
    LengthOverflow { declared: u64, remaining: usize },
}

/// Errors for loam-util components other than the codec.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Coding error: {0}")]
    Coding(#[from] CodingError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
