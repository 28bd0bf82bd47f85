//! Statistics Registry
//!
//! Holds every open statistics set and hands out builders for new ones.
//! Observers either poll (`collect`, `for_each`, `filter`) or subscribe to
//! newly opened sets with `on_open`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::recorder::StatsSet;
use super::{Lifecycle, StatsBuilder, StatsSnapshot};

/// Registry of statistics sets
///
/// ## Concurrency:
/// - `sets`: Protected by Mutex (registration and collection are rare)
/// - `listeners`: Protected by its own Mutex, always taken after `sets`
/// - Each set guards its own values, so recorders never take these locks
/// - Listeners and `for_each` callbacks run with no registry lock held
pub struct Registry {
    /// Registered sets in registration order
    sets: Mutex<BTreeMap<u64, Arc<StatsSet>>>,

    /// `on_open` listeners by subscription id
    listeners: Mutex<BTreeMap<u64, OpenListener>>,

    /// Next registration or subscription id (atomic, lock-free)
    next_id: AtomicU64,
}

type OpenListener = Arc<dyn Fn(&StatsSnapshot) + Send + Sync>;

/// Keeps an `on_open` listener registered; dropping it deregisters.
#[must_use = "dropping a Subscription deregisters its listener"]
pub struct Subscription {
    registry: Weak<Registry>,
    id: u64,
}

impl Subscription {
    /// Deregister the listener now
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.listeners.lock().remove(&self.id);
        }
    }
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            sets: Mutex::new(BTreeMap::new()),
            listeners: Mutex::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Start declaring a new statistics set
    pub fn builder(
        self: &Arc<Self>,
        key: impl Into<String>,
        name: impl Into<String>,
        tags: BTreeMap<String, String>,
    ) -> StatsBuilder {
        StatsBuilder::new(Arc::clone(self), key.into(), name.into(), tags)
    }

    pub(super) fn register(&self, set: Arc<StatsSet>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let listeners: Vec<OpenListener> = {
            let mut sets = self.sets.lock();
            sets.insert(id, Arc::clone(&set));
            self.listeners.lock().values().cloned().collect()
        };

        if !listeners.is_empty() {
            let snapshot = set.snapshot();
            for listener in listeners {
                listener(&snapshot);
            }
        }
    }

    /// Call `listener` for every set opened from now on.
    ///
    /// Sets that are already open are delivered first, before this returns.
    /// Each set is delivered exactly once per listener, but sets opened
    /// concurrently may arrive out of registration order.
    pub fn on_open<F>(self: &Arc<Self>, listener: F) -> Subscription
    where
        F: Fn(&StatsSnapshot) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: OpenListener = Arc::new(listener);

        let existing: Vec<Arc<StatsSet>> = {
            let sets = self.sets.lock();
            self.listeners.lock().insert(id, Arc::clone(&listener));
            sets.values().cloned().collect()
        };

        for set in existing {
            let snapshot = set.snapshot();
            if snapshot.state == Lifecycle::Open {
                listener(&snapshot);
            }
        }

        Subscription {
            registry: Arc::downgrade(self),
            id,
        }
    }

    /// Call `f` with a snapshot of every open set, in registration order.
    ///
    /// Closed sets are passed over and left for the next `collect`.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&StatsSnapshot),
    {
        for snapshot in self.open_snapshots() {
            f(&snapshot);
        }
    }

    /// Snapshots of the open sets matching `predicate`
    pub fn filter<F>(&self, predicate: F) -> Vec<StatsSnapshot>
    where
        F: Fn(&StatsSnapshot) -> bool,
    {
        self.open_snapshots()
            .into_iter()
            .filter(|s| predicate(s))
            .collect()
    }

    fn open_snapshots(&self) -> Vec<StatsSnapshot> {
        let sets: Vec<Arc<StatsSet>> = self.sets.lock().values().cloned().collect();
        sets.iter()
            .map(|set| set.snapshot())
            .filter(|s| s.state == Lifecycle::Open)
            .collect()
    }

    /// Copy out every open set and every set closed since the last collect.
    ///
    /// Closed sets are reported with their final values exactly once and
    /// then removed from the registry.
    pub fn collect(&self) -> Vec<StatsSnapshot> {
        let mut sets = self.sets.lock();
        let mut snapshots = Vec::with_capacity(sets.len());
        let mut reported_closed = Vec::new();

        for (id, set) in sets.iter() {
            let snapshot = set.snapshot();
            // A set closing after its snapshot was taken stays for one more
            // collect, so its final values are not missed.
            if snapshot.state == Lifecycle::Closed {
                reported_closed.push(*id);
            }
            snapshots.push(snapshot);
        }

        for id in reported_closed {
            sets.remove(&id);
        }
        snapshots
    }

    /// Number of sets currently held (open, or closed but not yet collected)
    pub fn len(&self) -> usize {
        self.sets.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
