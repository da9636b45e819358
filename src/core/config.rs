//! Block store configuration
//!
//! Loaded from TOML:
//!
//! ```toml
//! storage_classes = 2
//! block_selection = "random"
//! affinity_lookup = true
//! ```

use crate::error::{BlockStoreError, Result};
use crate::selection::SelectionPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound on configured storage classes
pub const MAX_STORAGE_CLASSES: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockStoreConfig {
    /// Number of storage class partitions (class 0 is the fallback class)
    pub storage_classes: usize,

    /// Start-index policy for pool sweeps
    pub block_selection: SelectionPolicy,

    /// Honour locality hints on allocation
    pub affinity_lookup: bool,
}

impl Default for BlockStoreConfig {
    fn default() -> Self {
        BlockStoreConfig {
            storage_classes: 2,
            block_selection: SelectionPolicy::RoundRobin,
            affinity_lookup: true,
        }
    }
}

impl BlockStoreConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: BlockStoreConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_classes == 0 || self.storage_classes > MAX_STORAGE_CLASSES {
            return Err(BlockStoreError::InvalidConfig(format!(
                "storage_classes must be between 1 and {}, got {}",
                MAX_STORAGE_CLASSES, self.storage_classes
            )));
        }
        Ok(())
    }
}
