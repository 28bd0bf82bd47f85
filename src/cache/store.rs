//! Cache implementation
//!
//! Active generation + pending generations behind one RwLock, with a
//! separate commit lock serializing the snapshot lifecycle.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::iter;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::stats::{Recorder, Registry};
use crate::value::{Value, Values};

use super::{Generation, Snapshot};

/// Level: bytes held across all generations
pub const STAT_MEM_BYTES: &str = "mem_bytes";
/// Level: keys in the active generation
pub const STAT_ACTIVE_KEYS: &str = "active_keys";
/// Level: frozen generations awaiting commit
pub const STAT_PENDING_GENERATIONS: &str = "pending_generations";
/// Counter: admitted write calls
pub const STAT_WRITES_OK: &str = "writes_ok";
/// Counter: write calls rejected for memory
pub const STAT_WRITES_REJECTED: &str = "writes_rejected";
/// Counter: prepare_snapshots calls
pub const STAT_SNAPSHOTS: &str = "snapshots";

/// Everything guarded by the state lock
struct CacheState {
    /// Generation receiving writes
    active: Generation,
    /// Frozen generations, oldest first
    pending: Vec<Arc<Generation>>,
    /// Sum of every generation's size
    size: u64,
}

/// Size-bounded write cache for one storage shard
///
/// ## Concurrency Model
///
/// - **Reads and writes** (`write`, `write_multi`, `values`, `keys`, `size`):
///   Go through `state` only
///   - A write's memory check and mutation happen under one write-lock
///     acquisition, so concurrent writers cannot both pass the check
///   - Readers share the read lock and build fresh merged copies
///
/// - **Snapshot lifecycle** (`prepare_snapshots` → `commit_snapshots` /
///   `rollback_snapshots`): Serialized by the commit lock
///   - Held from prepare until the matching commit or rollback
///   - A second prepare blocks until then
///   - Writers never touch it, so they keep filling the new active
///     generation while earlier ones are persisted
///
/// - **Statistics**: levels (`mem_bytes`, `active_keys`,
///   `pending_generations`) are published before the state write lock is
///   released, so the last published level matches the last mutation
///
/// Lock order: commit lock → state lock → recorder.
pub struct Cache {
    max_size: u64,

    state: RwLock<CacheState>,

    /// True while a prepared snapshot awaits commit or rollback
    snapshotting: Mutex<bool>,
    snapshot_released: Condvar,

    /// Optional statistics sink
    stats: Option<Recorder>,
}

/// A series staged by a write but not yet applied
struct Staged {
    series: Values,
    /// Size of the series it replaces
    replaced: u64,
}

impl Cache {
    /// Create an empty cache with a fixed byte budget
    pub fn new(max_size: u64) -> Self {
        Self {
            max_size,
            state: RwLock::new(CacheState {
                active: Generation::new(),
                pending: Vec::new(),
                size: 0,
            }),
            snapshotting: Mutex::new(false),
            snapshot_released: Condvar::new(),
            stats: None,
        }
    }

    /// Create a cache sized from `config`
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.cache_max_memory_size))
    }

    /// Create a cache that publishes its statistics to `registry`
    pub fn with_stats(
        max_size: u64,
        registry: &Arc<Registry>,
        key: &str,
        tags: BTreeMap<String, String>,
    ) -> Result<Self> {
        let recorder = registry
            .builder(key, "tsm1_cache", tags)
            .declare_int(STAT_MEM_BYTES, 0)?
            .declare_int(STAT_ACTIVE_KEYS, 0)?
            .declare_int(STAT_PENDING_GENERATIONS, 0)?
            .declare_int(STAT_WRITES_OK, 0)?
            .declare_int(STAT_WRITES_REJECTED, 0)?
            .declare_int(STAT_SNAPSHOTS, 0)?
            .open();

        let mut cache = Self::new(max_size);
        cache.stats = Some(recorder);
        Ok(cache)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Merge `values` into the active series for `key`.
    ///
    /// Fails with `MemoryExceeded`, leaving the cache unchanged, if the merge
    /// would push the cache past its budget. An empty batch is a no-op.
    pub fn write(&self, key: &str, values: Vec<Value>) -> Result<()> {
        self.write_multi(iter::once((key, values)))
    }

    /// Merge several keys' values as one all-or-nothing batch.
    ///
    /// The combined size change of the whole batch is checked against the
    /// budget; either every key is applied or none is.
    pub fn write_multi<I, K>(&self, batch: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, Vec<Value>)>,
        K: Into<String>,
    {
        let mut state = self.state.write();

        // Stage every merge first; nothing is applied until the batch fits.
        let mut staged: HashMap<String, Staged> = HashMap::new();
        for (key, values) in batch {
            if values.is_empty() {
                continue;
            }
            let key = key.into();

            let next = match staged.get(&key) {
                Some(prev) => Staged {
                    series: prev.series.merged(values),
                    replaced: prev.replaced,
                },
                None => match state.active.series(&key) {
                    Some(existing) => Staged {
                        series: existing.merged(values),
                        replaced: existing.size() as u64,
                    },
                    None => Staged {
                        series: Values::from_unsorted(values),
                        replaced: 0,
                    },
                },
            };
            staged.insert(key, next);
        }

        if staged.is_empty() {
            return Ok(());
        }

        let added: u64 = staged.values().map(|s| s.series.size() as u64).sum();
        let replaced: u64 = staged.values().map(|s| s.replaced).sum();
        let new_size = state.size + added - replaced;

        if new_size > self.max_size {
            drop(state);
            debug!(
                requested = new_size,
                max = self.max_size,
                keys = staged.len(),
                "rejected cache write"
            );
            self.record(|r| r.add_int(STAT_WRITES_REJECTED, 1));
            return Err(CacheError::MemoryExceeded {
                requested: new_size,
                max: self.max_size,
            });
        }

        for (key, s) in staged {
            state.active.replace(key, s.series);
        }
        state.size = new_size;

        self.record(|r| {
            r.add_int(STAT_WRITES_OK, 1)?;
            r.set_int(STAT_MEM_BYTES, new_size as i64)?;
            r.set_int(STAT_ACTIVE_KEYS, state.active.key_count() as i64)
        });
        Ok(())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Merged view of `key` across every generation.
    ///
    /// Generations are merged oldest pending → active, so the newest write
    /// for a timestamp wins. Returns an empty series for an unknown key.
    /// Never mutates any generation.
    pub fn values(&self, key: &str) -> Values {
        let state = self.state.read();

        let generations = state
            .pending
            .iter()
            .map(|g| g.as_ref())
            .chain(iter::once(&state.active));

        let mut merged: Option<Values> = None;
        for series in generations.filter_map(|g| g.series(key)) {
            merged = Some(match merged {
                None => series.clone(),
                Some(acc) => acc.merged(series.to_vec()),
            });
        }

        merged.unwrap_or_default()
    }

    /// Keys present in any generation, sorted lexicographically
    pub fn keys(&self) -> Vec<String> {
        let state = self.state.read();

        let keys: BTreeSet<&str> = state
            .pending
            .iter()
            .flat_map(|g| g.keys())
            .chain(state.active.keys())
            .collect();

        keys.into_iter().map(str::to_string).collect()
    }

    /// Bytes held across the active and pending generations
    pub fn size(&self) -> u64 {
        self.state.read().size
    }

    /// Configured byte budget
    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Number of frozen generations awaiting commit
    pub fn pending_count(&self) -> usize {
        self.state.read().pending.len()
    }

    /// True while a prepared snapshot awaits commit or rollback
    pub fn is_snapshotting(&self) -> bool {
        *self.snapshotting.lock()
    }

    // =========================================================================
    // Snapshot Lifecycle
    // =========================================================================

    /// Freeze accumulated writes and return every pending generation.
    ///
    /// Blocks while another snapshot is outstanding, then takes the commit
    /// lock; it is held until `commit_snapshots` or `rollback_snapshots`.
    ///
    /// `segment_files` lists the WAL segments covering all unpersisted writes,
    /// oldest first. Pending generations already own a prefix of that list
    /// (one entry per file they hold); the remaining suffix is attached to the
    /// newly frozen generation. A generation is frozen when there are new
    /// writes or leftover files, so no filename is ever dropped.
    pub fn prepare_snapshots<I, S>(&self, segment_files: I) -> Vec<Snapshot>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        {
            let mut busy = self.snapshotting.lock();
            while *busy {
                self.snapshot_released.wait(&mut busy);
            }
            *busy = true;
        }

        let segment_files: Vec<String> = segment_files.into_iter().map(Into::into).collect();
        let mut state = self.state.write();

        let claimed: Vec<&String> = state.pending.iter().flat_map(|g| g.files()).collect();
        if !claimed.iter().zip(&segment_files).all(|(a, b)| *a == b) {
            warn!(
                pending = ?claimed,
                given = ?segment_files,
                "segment files do not start with the files of pending generations"
            );
        }
        let leftover: Vec<String> = segment_files.into_iter().skip(claimed.len()).collect();

        if !state.active.is_empty() || !leftover.is_empty() {
            let active = std::mem::take(&mut state.active);
            debug!(
                keys = active.key_count(),
                bytes = active.size(),
                files = ?leftover,
                "froze active generation"
            );
            state.pending.push(Arc::new(active.freeze(leftover)));
        }

        let snapshots: Vec<Snapshot> = state
            .pending
            .iter()
            .map(|g| Snapshot::new(Arc::clone(g)))
            .collect();

        self.record(|r| {
            r.add_int(STAT_SNAPSHOTS, 1)?;
            r.set_int(STAT_PENDING_GENERATIONS, state.pending.len() as i64)?;
            r.set_int(STAT_ACTIVE_KEYS, state.active.key_count() as i64)
        });
        snapshots
    }

    /// Discard every pending generation and release the commit lock.
    ///
    /// Irreversible: the caller must already have persisted the snapshots.
    pub fn commit_snapshots(&self) -> Result<()> {
        let mut busy = self.snapshotting.lock();
        if !*busy {
            return Err(CacheError::ProtocolMisuse(
                "commit_snapshots called without prepared snapshots".to_string(),
            ));
        }

        let (committed, freed) = {
            let mut state = self.state.write();
            let committed = state.pending.len();
            let freed: u64 = state.pending.drain(..).map(|g| g.size()).sum();
            state.size -= freed;

            self.record(|r| {
                r.set_int(STAT_PENDING_GENERATIONS, 0)?;
                r.set_int(STAT_MEM_BYTES, state.size as i64)
            });
            (committed, freed)
        };

        *busy = false;
        drop(busy);
        self.snapshot_released.notify_one();

        debug!(generations = committed, freed, "committed snapshots");
        Ok(())
    }

    /// Resolve a prepared snapshot position by position and release the
    /// commit lock.
    ///
    /// `handles[i]` corresponds to pending generation `i`:
    /// - `None`: that generation was persisted; it is discarded
    /// - `Some(handle)`: it was not; it stays pending for the next prepare
    ///
    /// Generations past the end of `handles` stay pending. A list longer than
    /// the pending queue, or a handle that is not the generation at its
    /// position, is `ProtocolMisuse`: nothing is discarded, but the commit
    /// lock is still released.
    pub fn rollback_snapshots(&self, handles: &[Option<Snapshot>]) -> Result<()> {
        let mut busy = self.snapshotting.lock();
        if !*busy {
            return Err(CacheError::ProtocolMisuse(
                "rollback_snapshots called without prepared snapshots".to_string(),
            ));
        }

        let outcome = {
            let mut state = self.state.write();
            match check_handles(&state.pending, handles) {
                Ok(()) => {
                    let mut freed = 0;
                    let pending = std::mem::take(&mut state.pending);
                    for (i, generation) in pending.into_iter().enumerate() {
                        if matches!(handles.get(i), Some(None)) {
                            freed += generation.size();
                        } else {
                            state.pending.push(generation);
                        }
                    }
                    state.size -= freed;

                    self.record(|r| {
                        r.set_int(STAT_PENDING_GENERATIONS, state.pending.len() as i64)?;
                        r.set_int(STAT_MEM_BYTES, state.size as i64)
                    });
                    Ok((freed, state.pending.len()))
                }
                Err(e) => Err(e),
            }
        };

        *busy = false;
        drop(busy);
        self.snapshot_released.notify_one();

        let (freed, remaining) = outcome?;
        debug!(freed, remaining, "rolled back snapshots");
        Ok(())
    }

    /// Publish to the statistics sink, if any. Failures never affect the cache.
    fn record<F>(&self, f: F)
    where
        F: FnOnce(&Recorder) -> Result<()>,
    {
        if let Some(recorder) = &self.stats {
            if let Err(e) = f(recorder) {
                debug!(error = %e, "failed to record cache statistics");
            }
        }
    }
}

/// Every handle must be the pending generation at its position
fn check_handles(pending: &[Arc<Generation>], handles: &[Option<Snapshot>]) -> Result<()> {
    if handles.len() > pending.len() {
        return Err(CacheError::ProtocolMisuse(format!(
            "{} snapshot handles for {} pending generations",
            handles.len(),
            pending.len()
        )));
    }

    for (i, handle) in handles.iter().enumerate() {
        if let Some(handle) = handle {
            if !handle.refers_to(&pending[i]) {
                return Err(CacheError::ProtocolMisuse(format!(
                    "snapshot handle {} does not match the pending generation at that position",
                    i
                )));
            }
        }
    }

    Ok(())
}
