//! Cache Loader
//!
//! Rebuilds a cache from WAL segments at startup.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{Config, DEFAULT_MAX_WAL_ENTRY_SIZE};
use crate::error::Result;
use crate::wal::{RecoveryResult, WalRecovery};

use super::Cache;

/// File extension of WAL segment files
const WAL_SEGMENT_EXTENSION: &str = "wal";

/// Replays WAL segment files into a cache
pub struct CacheLoader {
    files: Vec<PathBuf>,
    max_entry_size: u32,
}

/// Outcome of a load: one report per segment, in load order
#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub segments: Vec<RecoveryResult>,
}

impl LoadSummary {
    pub fn entries_recovered(&self) -> u64 {
        self.segments.iter().map(|s| s.entries_recovered).sum()
    }

    pub fn values_recovered(&self) -> u64 {
        self.segments.iter().map(|s| s.values_recovered).sum()
    }

    /// Well-formed records of other kinds passed over during replay
    pub fn entries_skipped(&self) -> u64 {
        self.segments.iter().map(|s| s.entries_skipped).sum()
    }

    /// Segments whose replay stopped at a torn or corrupt record
    pub fn truncated_segments(&self) -> impl Iterator<Item = &Path> {
        self.segments
            .iter()
            .filter(|s| s.was_truncated)
            .map(|s| s.path.as_path())
    }
}

impl CacheLoader {
    /// Create a loader for `files`, replayed in the given order
    pub fn new<I, P>(files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            files: files.into_iter().map(Into::into).collect(),
            max_entry_size: DEFAULT_MAX_WAL_ENTRY_SIZE,
        }
    }

    /// Create a loader honoring the WAL limits in `config`
    pub fn with_config<I, P>(files: I, config: &Config) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut loader = Self::new(files);
        loader.max_entry_size = config.max_wal_entry_size;
        loader
    }

    /// Create a loader for every segment in `config.wal_dir`.
    ///
    /// Segments are files with the `.wal` extension, replayed in file name
    /// order. A missing directory yields a loader with no segments.
    pub fn from_config(config: &Config) -> Result<Self> {
        let dir = &config.wal_dir;
        let mut files = Vec::new();

        if dir.is_dir() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_file() && Self::is_segment(&path) {
                    files.push(path);
                }
            }
        }
        files.sort();

        debug!(dir = %dir.display(), segments = files.len(), "discovered WAL segments");
        Ok(Self::with_config(files, config))
    }

    fn is_segment(path: &Path) -> bool {
        path.extension().and_then(|ext| ext.to_str()) == Some(WAL_SEGMENT_EXTENSION)
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    /// Replay every segment into `cache`.
    ///
    /// A torn or corrupt record ends replay of that segment only; entries
    /// before it are kept and the next segment is loaded. Failing to open a
    /// segment, or a write the cache rejects, aborts the load.
    ///
    /// Runs single-threaded; the caller must keep other writers away from
    /// `cache` until it returns.
    pub fn load(&self, cache: &Cache) -> Result<LoadSummary> {
        let mut summary = LoadSummary::default();

        for path in &self.files {
            let result = WalRecovery::replay(path, self.max_entry_size, |entry| {
                cache.write_multi(entry.values)
            })?;
            summary.segments.push(result);
        }

        info!(
            segments = summary.segments.len(),
            entries = summary.entries_recovered(),
            values = summary.values_recovered(),
            skipped = summary.entries_skipped(),
            truncated = summary.truncated_segments().count(),
            cache_bytes = cache.size(),
            "loaded cache from WAL"
        );
        Ok(summary)
    }
}
