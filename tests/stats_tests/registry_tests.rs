//! Tests for the statistics registry
//!
//! These tests verify:
//! - The declared → open → closed lifecycle
//! - Typed updates and their errors
//! - Closed sets are reported once with final values
//! - Observers see open sets through on_open, for_each and filter
//! - The cache publishes its counters when given a registry

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use tsmcache::cache::{
    STAT_ACTIVE_KEYS, STAT_MEM_BYTES, STAT_PENDING_GENERATIONS, STAT_SNAPSHOTS, STAT_WRITES_OK,
    STAT_WRITES_REJECTED,
};
use tsmcache::stats::{Lifecycle, Registry};
use tsmcache::value::Value;
use tsmcache::{Cache, CacheError};

fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =============================================================================
// Lifecycle
// =============================================================================

#[test]
fn test_declared_sets_are_invisible() {
    let registry = Registry::new();

    let builder = registry
        .builder("shard1", "tsm1_cache", tags(&[("path", "/data/1")]))
        .declare_int("hits", 0)
        .unwrap();

    assert_eq!(builder.state(), Lifecycle::Declared);
    assert!(registry.is_empty());
    assert!(registry.collect().is_empty());
}

#[test]
fn test_open_set_is_collected_repeatedly() {
    let registry = Registry::new();
    let recorder = registry
        .builder("shard1", "tsm1_cache", tags(&[("path", "/data/1")]))
        .declare_int("hits", 0)
        .unwrap()
        .declare_float("ratio", 0.5)
        .unwrap()
        .declare_string("mode", "idle")
        .unwrap()
        .open();

    assert_eq!(recorder.state(), Lifecycle::Open);
    assert_eq!(recorder.key(), "shard1");

    recorder.add_int("hits", 3).unwrap();
    recorder.add_float("ratio", 0.25).unwrap();
    recorder.set_string("mode", "busy").unwrap();

    for _ in 0..2 {
        let collected = registry.collect();
        assert_eq!(collected.len(), 1);
        let snapshot = &collected[0];
        assert_eq!(snapshot.name, "tsm1_cache");
        assert_eq!(snapshot.tags.get("path").map(String::as_str), Some("/data/1"));
        assert_eq!(snapshot.state, Lifecycle::Open);
        assert_eq!(snapshot.int("hits"), Some(3));
        assert_eq!(snapshot.float("ratio"), Some(0.75));
        assert_eq!(snapshot.string("mode"), Some("busy"));
    }
}

#[test]
fn test_closed_set_reported_once_with_final_values() {
    let registry = Registry::new();
    let recorder = registry
        .builder("shard1", "tsm1_cache", BTreeMap::new())
        .declare_int("hits", 0)
        .unwrap()
        .open();

    recorder.set_int("hits", 42).unwrap();
    recorder.close();
    assert_eq!(recorder.state(), Lifecycle::Closed);

    let collected = registry.collect();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].state, Lifecycle::Closed);
    assert_eq!(collected[0].int("hits"), Some(42));

    assert!(registry.collect().is_empty());
    assert!(registry.is_empty());
}

#[test]
fn test_drop_closes_set() {
    let registry = Registry::new();
    {
        let _recorder = registry
            .builder("shard1", "tsm1_cache", BTreeMap::new())
            .declare_int("hits", 0)
            .unwrap()
            .open();
        assert_eq!(registry.len(), 1);
    }

    let collected = registry.collect();
    assert_eq!(collected[0].state, Lifecycle::Closed);
    assert!(registry.is_empty());
}

// =============================================================================
// Observers
// =============================================================================

fn open_set(registry: &Arc<Registry>, key: &str, engine: &str) -> tsmcache::stats::Recorder {
    registry
        .builder(key, "tsm1_cache", tags(&[("engine", engine)]))
        .declare_int("hits", 0)
        .unwrap()
        .open()
}

#[test]
fn test_on_open_sees_existing_then_new_sets() {
    let registry = Registry::new();
    let _first = open_set(&registry, "shard1", "tsm1");
    let closed = open_set(&registry, "shard0", "tsm1");
    closed.close();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = registry.on_open(move |s| sink.lock().push(s.key.clone()));

    assert_eq!(*seen.lock(), vec!["shard1"]);

    let _second = open_set(&registry, "shard2", "tsm1");
    assert_eq!(*seen.lock(), vec!["shard1", "shard2"]);

    subscription.cancel();
    let _third = open_set(&registry, "shard3", "tsm1");
    assert_eq!(*seen.lock(), vec!["shard1", "shard2"]);
}

#[test]
fn test_dropped_subscription_stops_notifications() {
    let registry = Registry::new();
    let seen = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&seen);

    {
        let _subscription = registry.on_open(move |_| *sink.lock() += 1);
        let _a = open_set(&registry, "a", "tsm1");
    }
    let _b = open_set(&registry, "b", "tsm1");

    assert_eq!(*seen.lock(), 1);
}

#[test]
fn test_on_open_delivers_each_set_once_under_concurrent_opens() {
    let registry = Registry::new();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let recorders = thread::scope(|s| {
        let opener = s.spawn(|| {
            (0..50)
                .map(|i| open_set(&registry, &format!("shard{:02}", i), "tsm1"))
                .collect::<Vec<_>>()
        });

        let sink = Arc::clone(&seen);
        let subscription = registry.on_open(move |s| sink.lock().push(s.key.clone()));
        let recorders = opener.join().unwrap();
        drop(subscription);
        recorders
    });

    let mut keys = seen.lock().clone();
    keys.sort();
    let expected: Vec<String> = (0..50).map(|i| format!("shard{:02}", i)).collect();
    assert_eq!(keys, expected);
    assert_eq!(recorders.len(), 50);
}

#[test]
fn test_for_each_and_filter_skip_closed_sets() {
    let registry = Registry::new();
    let _a = open_set(&registry, "a", "tsm1");
    let _b = open_set(&registry, "b", "inmem");
    let closed = open_set(&registry, "c", "tsm1");
    closed.set_int("hits", 7).unwrap();
    closed.close();

    let mut visited = Vec::new();
    registry.for_each(|s| visited.push(s.key.clone()));
    assert_eq!(visited, vec!["a", "b"]);

    let tsm: Vec<String> = registry
        .filter(|s| s.tags.get("engine").map(String::as_str) == Some("tsm1"))
        .into_iter()
        .map(|s| s.key)
        .collect();
    assert_eq!(tsm, vec!["a"]);

    // The closed set is still owed to the next collect.
    let collected = registry.collect();
    assert_eq!(collected.len(), 3);
    assert_eq!(collected[2].int("hits"), Some(7));
    assert_eq!(registry.len(), 2);
}

// =============================================================================
// Errors
// =============================================================================

#[test]
fn test_duplicate_declaration_rejected() {
    let registry = Registry::new();

    let result = registry
        .builder("shard1", "tsm1_cache", BTreeMap::new())
        .declare_int("hits", 0)
        .unwrap()
        .declare_float("hits", 0.0);

    assert!(matches!(result, Err(CacheError::StatAlreadyDeclared(_))));
}

#[test]
fn test_update_errors() {
    let registry = Registry::new();
    let recorder = registry
        .builder("shard1", "tsm1_cache", BTreeMap::new())
        .declare_int("hits", 0)
        .unwrap()
        .open();

    assert!(matches!(
        recorder.set_int("misses", 1),
        Err(CacheError::StatNotDeclared(_))
    ));
    assert!(matches!(
        recorder.set_float("hits", 1.0),
        Err(CacheError::StatTypeMismatch { declared: "int", .. })
    ));

    recorder.close();
    assert!(matches!(
        recorder.add_int("hits", 1),
        Err(CacheError::StatsClosed(_))
    ));
}

// =============================================================================
// Cache Statistics
// =============================================================================

#[test]
fn test_cache_publishes_statistics() {
    let registry = Registry::new();
    let cache = Cache::with_stats(32, &registry, "shard1", tags(&[("engine", "tsm1")])).unwrap();

    cache.write("a", vec![Value::new(1, 1.0)]).unwrap();
    cache.write("b", vec![Value::new(1, 1.0)]).unwrap();
    assert!(cache.write("c", vec![Value::new(1, 1.0)]).is_err());

    let collected = registry.collect();
    let stats = &collected[0];
    assert_eq!(stats.key, "shard1");
    assert_eq!(stats.int(STAT_MEM_BYTES), Some(32));
    assert_eq!(stats.int(STAT_ACTIVE_KEYS), Some(2));
    assert_eq!(stats.int(STAT_WRITES_OK), Some(2));
    assert_eq!(stats.int(STAT_WRITES_REJECTED), Some(1));

    let _ = cache.prepare_snapshots(["seg1"]);
    let collected = registry.collect();
    let stats = &collected[0];
    assert_eq!(stats.int(STAT_SNAPSHOTS), Some(1));
    assert_eq!(stats.int(STAT_PENDING_GENERATIONS), Some(1));
    assert_eq!(stats.int(STAT_ACTIVE_KEYS), Some(0));

    cache.commit_snapshots().unwrap();
    let collected = registry.collect();
    let stats = &collected[0];
    assert_eq!(stats.int(STAT_PENDING_GENERATIONS), Some(0));
    assert_eq!(stats.int(STAT_MEM_BYTES), Some(0));

    drop(cache);
    let stats = registry.collect();
    assert_eq!(stats[0].state, Lifecycle::Closed);
    assert!(registry.is_empty());
}
