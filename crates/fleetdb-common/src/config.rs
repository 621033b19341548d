//! Configuration types for the embedded store

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the embedded FleetDB store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory holding every key's version log.
    pub root_dir: PathBuf,
    /// Maximum number of cached read-writer handles per entity kind.
    /// Bounds open file handles and memory under many managed services.
    pub max_cached_handles: usize,
    /// Bounded retries for transient I/O failures at the log layer.
    /// Conditional failures are never retried.
    pub io_retry_limit: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/var/lib/fleetdb"),
            max_cached_handles: 512,
            io_retry_limit: 3,
        }
    }
}

impl StoreConfig {
    /// Store rooted at the given directory, other settings defaulted.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_cached_handles == 0 {
            return Err(Error::invalid_request(
                "max_cached_handles must be at least 1",
            ));
        }
        if self.root_dir.as_os_str().is_empty() {
            return Err(Error::invalid_request("root_dir must not be empty"));
        }
        Ok(())
    }
}
