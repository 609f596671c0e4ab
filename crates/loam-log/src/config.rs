//! Log writer configuration.

use crate::error::{LogError, Result};
use crate::format::{BLOCK_SIZE, HEADER_SIZE};
use serde::{Deserialize, Serialize};

/// Configuration for a [`crate::LogWriter`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Size of a physical block (default: 32 KiB).
    ///
    /// Readers must use the same value; it is part of the on-disk format.
    pub block_size: usize,
    /// Call the sink's `sync()` once a whole logical record is written
    /// (default: false; every fragment is still flushed).
    pub sync_on_append: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            block_size: BLOCK_SIZE,
            sync_on_append: false,
        }
    }
}

impl LogConfig {
    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        // A block must hold a header plus at least one payload byte, or a
        // non-empty record could never make progress.
        if self.block_size <= HEADER_SIZE {
            return Err(LogError::InvalidConfig(format!(
                "block_size ({}) must exceed the {}-byte record header",
                self.block_size, HEADER_SIZE
            )));
        }

        if self.block_size - HEADER_SIZE > u16::MAX as usize {
            return Err(LogError::InvalidConfig(format!(
                "block_size ({}) leaves fragments too large for a 16-bit length",
                self.block_size
            )));
        }

        Ok(())
    }
}
