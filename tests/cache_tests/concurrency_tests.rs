//! Concurrency tests for Cache
//!
//! These tests verify:
//! - The commit lock serializes prepare against commit
//! - Writers are never blocked by an outstanding snapshot
//! - The memory check and the mutation are one critical section
//! - Published levels match the cache once writers finish

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use std::collections::BTreeMap;

use crossbeam::channel;
use tsmcache::cache::{STAT_ACTIVE_KEYS, STAT_MEM_BYTES, STAT_WRITES_OK};
use tsmcache::stats::Registry;
use tsmcache::value::Value;
use tsmcache::Cache;

#[test]
fn test_commit_lock_blocks_second_prepare() {
    let cache = Cache::new(512);
    let v0 = Value::new(2_000_000_000, 0.0);

    let _ = cache.prepare_snapshots(["sync"]);

    let (tx, rx) = channel::bounded(1);
    thread::scope(|s| {
        let cache = &cache;

        s.spawn(move || {
            let snapshots = cache.prepare_snapshots(["sync", "async"]);
            let files = snapshots[0].files().to_vec();
            tx.send((snapshots.len(), files)).unwrap();
            cache.commit_snapshots().unwrap();
        });

        // Writers keep going while the lock is held.
        let writer = s.spawn(|| cache.write("foo", vec![v0.clone()]));
        writer.join().unwrap().unwrap();
        assert_eq!(cache.values("foo").as_slice(), &[v0.clone()]);

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

        cache.commit_snapshots().unwrap();

        let (pending, files) = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(pending, 1);
        assert_eq!(files, vec!["sync".to_string(), "async".to_string()]);
    });

    assert!(!cache.is_snapshotting());
    assert!(cache.values("foo").is_empty());
}

#[test]
fn test_concurrent_writes_and_reads() {
    let cache = Cache::new(1024 * 1024);
    let writers = 8;
    let per_writer = 200;

    thread::scope(|s| {
        for w in 0..writers {
            let cache = &cache;
            s.spawn(move || {
                let key = format!("series{}", w % 4);
                for i in 0..per_writer {
                    let t = (w * per_writer + i) as i64;
                    cache.write(&key, vec![Value::new(t, t as f64)]).unwrap();
                }
            });
        }

        for _ in 0..4 {
            let cache = &cache;
            s.spawn(move || {
                for _ in 0..100 {
                    for key in cache.keys() {
                        let series = cache.values(&key);
                        assert!(series
                            .windows(2)
                            .all(|w| w[0].unix_nano() < w[1].unix_nano()));
                    }
                }
            });
        }
    });

    let total: usize = cache.keys().iter().map(|k| cache.values(k).len()).sum();
    assert_eq!(total, writers * per_writer);
    assert_eq!(cache.size(), (writers * per_writer * 16) as u64);
}

#[test]
fn test_concurrent_writers_cannot_overshoot_budget() {
    let slots = 10;
    let cache = Cache::new(16 * slots as u64);
    let admitted = AtomicUsize::new(0);

    thread::scope(|s| {
        for i in 0..(slots * 3) {
            let cache = &cache;
            let admitted = &admitted;
            s.spawn(move || {
                if cache.write(&format!("k{}", i), vec![Value::new(1, 1.0)]).is_ok() {
                    admitted.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(admitted.load(Ordering::SeqCst), slots);
    assert_eq!(cache.size(), cache.max_size());
    assert_eq!(cache.keys().len(), slots);
}

#[test]
fn test_snapshots_interleaved_with_writes_lose_nothing() {
    let cache = Cache::new(1024 * 1024);
    let count = 1000;

    thread::scope(|s| {
        let cache = &cache;
        s.spawn(move || {
            for t in 0..count {
                cache.write("k", vec![Value::new(t, t)]).unwrap();
            }
        });

        for _ in 0..20 {
            let snapshots = cache.prepare_snapshots(Vec::<String>::new());
            let keep: Vec<_> = snapshots.into_iter().map(Some).collect();
            cache.rollback_snapshots(&keep).unwrap();
            thread::yield_now();
        }
    });

    let series = cache.values("k");
    assert_eq!(series.len(), count as usize);
    assert_eq!(cache.size(), count as u64 * 16);
}

#[test]
fn test_published_levels_match_cache_after_racing_writers() {
    let registry = Registry::new();
    let cache = Cache::with_stats(1024 * 1024, &registry, "shard1", BTreeMap::new()).unwrap();
    let writers = 8;
    let per_writer = 300;

    thread::scope(|s| {
        for w in 0..writers {
            let cache = &cache;
            s.spawn(move || {
                for i in 0..per_writer {
                    let key = format!("w{}-k{}", w, i % 17);
                    cache
                        .write(&key, vec![Value::new(i as i64, i as f64)])
                        .unwrap();
                }
            });
        }
    });

    let collected = registry.collect();
    let stats = &collected[0];
    assert_eq!(stats.int(STAT_MEM_BYTES), Some(cache.size() as i64));
    assert_eq!(stats.int(STAT_ACTIVE_KEYS), Some(cache.keys().len() as i64));
    assert_eq!(stats.int(STAT_WRITES_OK), Some((writers * per_writer) as i64));
}
