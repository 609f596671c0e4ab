//! Block builder configuration.

use crate::error::{Result, TableError};
use crate::format::{DEFAULT_BLOCK_SIZE, DEFAULT_RESTART_INTERVAL};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Target uncompressed block size; callers flush once
    /// `current_size_estimate()` reaches it (default: 4096).
    pub block_size: usize,
    /// Entries between restart points (default: 16).
    pub restart_interval: usize,
}

impl Default for BlockConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            restart_interval: DEFAULT_RESTART_INTERVAL,
        }
    }
}

impl BlockConfig {
    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.restart_interval == 0 {
            return Err(TableError::InvalidConfig(
                "restart_interval must be >= 1".to_string(),
            ));
        }

        if self.block_size == 0 {
            return Err(TableError::InvalidConfig(
                "block_size must be > 0".to_string(),
            ));
        }

        // Restart offsets are stored as u32.
        if self.block_size > u32::MAX as usize {
            return Err(TableError::InvalidConfig(format!(
                "block_size ({}) must fit in a u32 restart offset",
                self.block_size
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BlockConfig::default();
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.restart_interval, 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_restart_interval_rejected() {
        let config = BlockConfig {
            restart_interval: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TableError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_serde_fills_nothing_implicitly() {
        let json = r#"{"block_size":8192,"restart_interval":4}"#;
        let config: BlockConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.block_size, 8192);
        assert_eq!(config.restart_interval, 4);
        assert!(serde_json::from_str::<BlockConfig>(r#"{"block_size":1}"#).is_err());
    }
}
