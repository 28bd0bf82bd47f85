//! # tsmcache
//!
//! The hot-path write buffer of a time-series storage engine:
//! - Size-bounded in-memory cache with last-write-wins series per key
//! - Snapshot / commit / rollback of frozen generations for a compactor
//! - Write-Ahead Log (WAL) segment codec with checksummed, compressed frames
//! - Cache rebuild from WAL segments, tolerating torn or corrupt tails
//! - Explicit statistics registry for cache counters
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────┐          ┌──────────────────────┐
//! │       Writers        │          │   WAL segment files  │
//! │ (many threads)       │          │  (written elsewhere) │
//! └──────────┬───────────┘          └──────────┬───────────┘
//!            │ write / write_multi             │ CacheLoader (startup)
//!            ▼                                 ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Cache                           │
//! │   active generation  +  pending generations (frozen)     │
//! └──────────┬──────────────────────────────────┬────────────┘
//!            │ values / keys                    │ prepare / commit / rollback
//!            ▼                                  ▼
//!      ┌───────────┐                     ┌─────────────┐
//!      │  Readers  │                     │  Compactor  │
//!      └───────────┘                     └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod value;
pub mod wal;
pub mod cache;
pub mod stats;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CacheError, Result};
pub use config::Config;
pub use cache::{Cache, CacheLoader, Snapshot};
pub use value::{Payload, Value, Values};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tsmcache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
