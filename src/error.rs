//! Error types for tsmcache
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CacheError
pub type Result<T> = std::result::Result<T, CacheError>;

/// Unified error type for tsmcache operations
#[derive(Debug, Error)]
pub enum CacheError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Cache Errors
    // -------------------------------------------------------------------------
    /// Admitting the write would push the cache past its byte budget.
    /// The cache is left exactly as it was before the call.
    #[error("cache memory exceeded: write would grow cache to {requested} bytes, max is {max}")]
    MemoryExceeded { requested: u64, max: u64 },

    /// Snapshot lifecycle called out of order, or with handles that do not
    /// match the pending generations.
    #[error("snapshot protocol misuse: {0}")]
    ProtocolMisuse(String),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    /// A frame failed its checksum, length, decompression or decode check.
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    /// The segment ends part-way through a frame (torn write).
    #[error("WAL truncated: {0}")]
    WalTruncated(String),

    /// A valid frame of another record kind where a write entry was required.
    #[error("expected a write entry, found record type 0x{0:02x}")]
    UnexpectedEntryType(u8),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Compression error: {0}")]
    Compression(String),

    // -------------------------------------------------------------------------
    // Statistics Errors
    // -------------------------------------------------------------------------
    #[error("statistic '{0}' has already been declared")]
    StatAlreadyDeclared(String),

    #[error("statistic '{0}' has not been declared")]
    StatNotDeclared(String),

    #[error("statistic '{name}' declared as {declared}")]
    StatTypeMismatch { name: String, declared: &'static str },

    #[error("statistics '{0}' already closed")]
    StatsClosed(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    /// True for the recoverable "cache is full" condition.
    pub fn is_memory_exceeded(&self) -> bool {
        matches!(self, CacheError::MemoryExceeded { .. })
    }

    /// True for any damaged-log condition a replay recovers from by
    /// stopping at the damaged record.
    pub fn is_corrupt_log_record(&self) -> bool {
        matches!(
            self,
            CacheError::WalCorruption(_) | CacheError::WalTruncated(_)
        )
    }
}
