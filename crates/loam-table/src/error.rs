//! Error types for loam-table operations.

use loam_util::CodingError;
use thiserror::Error;

/// Errors that can occur while configuring or decoding blocks.
#[derive(Debug, Error)]
pub enum TableError {
    /// A varint or fixed-width field could not be decoded.
    #[error("Coding error: {0}")]
    Coding(#[from] CodingError),

    /// Block contents are structurally invalid.
    #[error("Corrupted block: {0}")]
    Corruption(String),

    /// Invalid configuration parameter.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for table operations.
pub type Result<T> = std::result::Result<T, TableError>;
