//! Cache Module
//!
//! The in-memory hot write buffer of a shard, sitting in front of the
//! columnar files a compactor eventually writes.
//!
//! ## Responsibilities
//! - Absorb concurrent writes under a fixed byte budget
//! - Last-write-wins merge per key and timestamp
//! - Freeze writes into pending generations for a compactor (snapshot),
//!   then discard them (commit) or keep them for a retry (rollback)
//! - Rebuild from WAL segments at startup (loader)
//!
//! ## Generations
//! ```text
//!            prepare_snapshots(files)
//!  writes ──► [ active ] ──────────────► [ pending 0 | pending 1 | ... ]
//!                                              │
//!                    commit_snapshots ─────────┤ discard all
//!                    rollback_snapshots ───────┘ discard the persisted ones
//! ```
//!
//! Reads merge oldest pending → active, so readers see the same series
//! before and after a snapshot is prepared.

mod generation;
mod loader;
mod snapshot;
mod store;

pub use generation::Generation;
pub use loader::{CacheLoader, LoadSummary};
pub use snapshot::Snapshot;
pub use store::{
    Cache, STAT_ACTIVE_KEYS, STAT_MEM_BYTES, STAT_PENDING_GENERATIONS, STAT_SNAPSHOTS,
    STAT_WRITES_OK, STAT_WRITES_REJECTED,
};
