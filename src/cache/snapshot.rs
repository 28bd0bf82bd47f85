//! Snapshot handles
//!
//! Read-only views of pending generations returned by `prepare_snapshots`.

use std::sync::Arc;

use crate::value::Values;

use super::Generation;

/// A read-only handle to one pending generation.
///
/// Handles are views, not owners: the cache decides when the generation is
/// discarded. Callers should drop their handles once the snapshot has been
/// committed or rolled back.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: Arc<Generation>,
}

impl Snapshot {
    pub(crate) fn new(generation: Arc<Generation>) -> Self {
        Self { generation }
    }

    /// True if both handles view the same generation
    pub(crate) fn refers_to(&self, generation: &Arc<Generation>) -> bool {
        Arc::ptr_eq(&self.generation, generation)
    }

    /// WAL segment files this generation corresponds to
    pub fn files(&self) -> &[String] {
        self.generation.files()
    }

    /// Values for `key` in this generation alone; empty if absent
    pub fn values(&self, key: &str) -> Values {
        self.generation.series(key).cloned().unwrap_or_default()
    }

    /// Keys in this generation, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.generation.keys().map(str::to_string).collect();
        keys.sort_unstable();
        keys
    }

    /// Bytes held by this generation
    pub fn size(&self) -> u64 {
        self.generation.size()
    }

    /// True when the generation holds no series (files only)
    pub fn is_empty(&self) -> bool {
        self.generation.is_empty()
    }
}
