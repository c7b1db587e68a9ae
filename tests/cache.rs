//! Cache layer laws and concurrent access over shared state.
//!
//! The process-wide caches are exercised from a single test function so
//! clear/resize assertions cannot race sibling tests in this binary; the
//! remaining tests use private `LruCache` instances.

use std::sync::Arc;
use std::thread;

use std::result::Result;

use rebind::prelude::*;
use rebind_core::LruCache;

#[test]
fn cached_value_round_trips_below_capacity() {
    let cache: LruCache<String, String> = LruCache::new(8);
    for i in 0..7 {
        cache.insert(format!("k{i}"), format!("v{i}"));
    }
    for i in 0..7 {
        assert_eq!(cache.get(format!("k{i}").as_str()), Some(format!("v{i}")));
    }
}

#[test]
fn lru_evicts_exactly_the_least_recently_accessed() {
    let cache: LruCache<String, u32> = LruCache::new(4);
    for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
        cache.insert((*key).to_string(), i as u32);
    }
    // Touch everything except "b", then overflow by one.
    let _ = cache.get("a");
    let _ = cache.get("c");
    let _ = cache.get("d");
    cache.insert("e".to_string(), 9);

    assert_eq!(cache.get("b"), None);
    for key in ["a", "c", "d", "e"] {
        assert!(cache.get(key).is_some(), "{key} should survive");
    }
}

#[test]
fn stats_expose_hits_misses_and_evictions() {
    let cache: LruCache<String, u32> = LruCache::new(2);
    cache.insert("a".to_string(), 1);
    cache.insert("b".to_string(), 2);
    let _ = cache.get("a");
    let _ = cache.get("zzz");
    cache.insert("c".to_string(), 3);

    let stats = cache.stats();
    assert_eq!(stats.hit_count, 1);
    assert_eq!(stats.miss_count, 1);
    assert_eq!(stats.eviction_count, 1);
    assert_eq!(stats.size, 2);
    assert!((stats.hit_rate() - 0.5).abs() < 1e-9);
}

#[test]
fn concurrent_fills_converge_on_one_value() {
    let cache: Arc<LruCache<String, u64>> = Arc::new(LruCache::new(16));
    let mut handles = Vec::new();
    for worker in 0..8u64 {
        let cache = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            cache.get_or_insert_with("shared", move || worker * 100)
        }));
    }
    let results: Vec<u64> = handles.into_iter().map(|h| h.join().expect("no panics")).collect();
    let first = results[0];
    assert!(results.iter().all(|&v| v == first), "all threads observed one fill");
    assert_eq!(cache.get("shared"), Some(first));
}

#[test]
fn fallible_fill_caches_nothing_on_error() {
    let cache: LruCache<String, u32> = LruCache::new(4);
    let result: Result<u32, &str> = cache.try_get_or_insert_with("k", || Err("parse failed"));
    assert!(result.is_err());
    assert_eq!(cache.get("k"), None);

    let result: Result<u32, &str> = cache.try_get_or_insert_with("k", || Ok(5));
    assert_eq!(result, Ok(5));
    assert_eq!(cache.get("k"), Some(5));
}

// All assertions against the process-wide caches live here, in order, so
// no sibling test observes a half-cleared state.
#[test]
fn global_caches_lifecycle() {
    // Parallel compiles over shared and unique statements.
    let config = Arc::new(DriverConfig::postgres());
    let mut handles = Vec::new();
    for worker in 0..8i64 {
        let config = Arc::clone(&config);
        handles.push(thread::spawn(move || {
            let options = CompileOptions::default().dialect(Dialect::PostgreSQL);
            for round in 0..20i64 {
                let table = if round % 2 == 0 {
                    "shared_tbl".to_string()
                } else {
                    format!("tbl_{worker}")
                };
                let sql = format!("SELECT * FROM {table} WHERE a = ? AND b = ?");
                let state = compile(
                    &sql,
                    Params::positional([ParamValue::Int(worker), ParamValue::Int(round)]),
                    &config,
                    &options,
                )
                .expect("compile succeeds under contention");
                assert_eq!(state.placeholder_list.len(), 2);
                assert!(state.final_sql.contains("$1"));
            }
        }));
    }
    for handle in handles {
        handle.join().expect("no worker panicked");
    }

    let stats = cache_stats();
    assert!(stats.compiled.size >= 1);
    assert!(stats.lexer.size >= 1);
    assert!(stats.compiled.hit_count + stats.compiled.miss_count >= 160);

    // Capacity overrides, applied and reverted.
    configure_caches(CacheConfig {
        lexer_capacity: 64,
        ast_capacity: 128,
        compiled_capacity: 32,
    });
    let resized = cache_stats();
    assert_eq!(resized.lexer.capacity, 64);
    assert_eq!(resized.ast.capacity, 128);
    assert_eq!(resized.compiled.capacity, 32);
    assert!(resized.compiled.size <= 32);
    configure_caches(CacheConfig::default());
    assert_eq!(cache_stats().compiled.capacity, 1000);
    assert_eq!(cache_stats().ast.capacity, 5000);

    // Clearing is explicit and resets counters and contents.
    clear_caches();
    let cleared = cache_stats();
    assert_eq!(cleared.compiled.size, 0);
    assert_eq!(cleared.lexer.size, 0);
    assert_eq!(cleared.ast.size, 0);
    assert_eq!(cleared.compiled.hit_count, 0);

    // The caches refill transparently afterwards.
    let state = compile(
        "SELECT * FROM shared_tbl WHERE a = ? AND b = ?",
        Params::positional([ParamValue::Int(1), ParamValue::Int(2)]),
        &DriverConfig::postgres(),
        &CompileOptions::default().dialect(Dialect::PostgreSQL),
    )
    .unwrap();
    assert_eq!(state.final_sql, "SELECT * FROM shared_tbl WHERE a = $1 AND b = $2");
    assert!(cache_stats().compiled.size >= 1);
}
