//! Error types for loam-log.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LogError {
    /// The sink rejected an append, flush or sync.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, LogError>;
