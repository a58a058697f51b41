//! Configuration management for RadixStore
//!
//! Provides size-limit presets and validation against the node format
//! ceilings.

use crate::error::{StoreError, StoreResult};
use crate::format::{MAX_KEY_BYTES, MAX_VALUE_BYTES};

/// RadixStore configuration with size-limit presets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum key size in bytes
    pub max_key_size: usize,
    /// Maximum value size in bytes
    pub max_value_size: u64,
}

impl Config {
    /// Full format range: 64KB keys, 4GB values
    pub fn standard() -> Self {
        Self {
            max_key_size: MAX_KEY_BYTES,
            max_value_size: MAX_VALUE_BYTES,
        }
    }

    /// Memory-constrained hosts: 1KB keys, 16MB values
    pub fn constrained() -> Self {
        Self {
            max_key_size: 1024,
            max_value_size: 16 * 1024 * 1024,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> StoreResult<()> {
        if self.max_key_size == 0 || self.max_key_size > MAX_KEY_BYTES {
            return Err(StoreError::InvalidConfig {
                reason: format!("max_key_size must be in [1, {}]", MAX_KEY_BYTES),
            });
        }
        if self.max_value_size == 0 || self.max_value_size > MAX_VALUE_BYTES {
            return Err(StoreError::InvalidConfig {
                reason: format!("max_value_size must be in [1, {}]", MAX_VALUE_BYTES),
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self { Self::standard() }
}
