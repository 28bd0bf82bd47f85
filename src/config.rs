//! Configuration for tsmcache
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{CacheError, Result};

/// Default cache byte budget (500 MB)
pub const DEFAULT_CACHE_MAX_MEMORY_SIZE: u64 = 500 * 1024 * 1024;

/// Default zstd level for WAL payloads
pub const DEFAULT_WAL_COMPRESSION_LEVEL: i32 = 3;

/// Default upper bound on one framed WAL payload (64 MB)
pub const DEFAULT_MAX_WAL_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// Main configuration for a shard's cache and WAL
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Byte budget for the cache (active + pending generations)
    pub cache_max_memory_size: u64,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Directory holding WAL segment files
    pub wal_dir: PathBuf,

    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// zstd compression level for entry payloads
    pub wal_compression_level: i32,

    /// Largest payload length a reader will accept before calling the
    /// frame corrupt
    pub max_wal_entry_size: u32,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_max_memory_size: DEFAULT_CACHE_MAX_MEMORY_SIZE,
            wal_dir: PathBuf::from("./wal"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            wal_compression_level: DEFAULT_WAL_COMPRESSION_LEVEL,
            max_wal_entry_size: DEFAULT_MAX_WAL_ENTRY_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the settings can actually be used
    pub fn validate(&self) -> Result<()> {
        if self.cache_max_memory_size == 0 {
            return Err(CacheError::Config(
                "cache_max_memory_size must be greater than zero".to_string(),
            ));
        }

        let levels = zstd::compression_level_range();
        if !levels.contains(&self.wal_compression_level) {
            return Err(CacheError::Config(format!(
                "wal_compression_level {} outside {}..={}",
                self.wal_compression_level,
                levels.start(),
                levels.end()
            )));
        }

        if self.max_wal_entry_size == 0 {
            return Err(CacheError::Config(
                "max_wal_entry_size must be greater than zero".to_string(),
            ));
        }

        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(CacheError::Config(
                "EveryNEntries sync count must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the cache byte budget
    pub fn cache_max_memory_size(mut self, bytes: u64) -> Self {
        self.config.cache_max_memory_size = bytes;
        self
    }

    /// Set the WAL directory
    pub fn wal_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wal_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the zstd level used for WAL payloads
    pub fn wal_compression_level(mut self, level: i32) -> Self {
        self.config.wal_compression_level = level;
        self
    }

    /// Set the largest accepted WAL payload
    pub fn max_wal_entry_size(mut self, bytes: u32) -> Self {
        self.config.max_wal_entry_size = bytes;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
