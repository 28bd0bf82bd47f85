//! Generation
//!
//! One batch of per-key series between two snapshot boundaries, plus the WAL
//! segment files it corresponds to.

use std::collections::HashMap;

use crate::value::Values;

/// A set of per-key series and the WAL segments holding the same writes.
///
/// Created mutable as the cache's active generation; frozen exactly once
/// when a snapshot is prepared, after which the cache only shares it
/// behind an `Arc` and never mutates it again.
#[derive(Debug, Default)]
pub struct Generation {
    series: HashMap<String, Values>,
    files: Vec<String>,
    /// Sum of `Value::size()` over every series
    size: u64,
    frozen: bool,
}

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    /// WAL segment files attached when the generation was frozen
    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Series stored for `key` in this generation alone
    pub fn series(&self, key: &str) -> Option<&Values> {
        self.series.get(key)
    }

    /// Keys in this generation, unordered
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn key_count(&self) -> usize {
        self.series.len()
    }

    /// Bytes held by this generation
    pub fn size(&self) -> u64 {
        self.size
    }

    /// True when no series are held
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Store `series` under `key`, replacing any previous series, and keep
    /// the byte count in step.
    pub(crate) fn replace(&mut self, key: String, series: Values) {
        debug_assert!(!self.frozen, "write into a frozen generation");

        let added = series.size() as u64;
        let removed = self
            .series
            .insert(key, series)
            .map(|old| old.size() as u64)
            .unwrap_or(0);
        self.size = self.size + added - removed;
    }

    /// Freeze this generation and attach its WAL segment files
    pub(crate) fn freeze(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self.frozen = true;
        self
    }
}
