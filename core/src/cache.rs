//! Thread-safe bounded LRU caches for the normalization pipeline
//!
//! Three process-wide caches back the expensive stages: lexed placeholder
//! lists keyed on raw SQL, parsed AST fragments keyed on normalized SQL and
//! dialect, and compiled statements keyed on the full compile signature.
//! Each cache is a `Mutex`-guarded intrusive LRU: a slab of doubly-linked
//! slots plus a key map, so hit, insert, and eviction are all O(1).
//!
//! Fills use double-checked locking: probe, compute outside the lock when
//! the computation is pure, re-probe under the lock, and abort the insert if
//! a concurrent fill won the race.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{LazyLock, Mutex, MutexGuard};

use rebind_types::{Dialect, ParameterInfo};

use crate::processor::ProcessedState;

pub const DEFAULT_LEXER_CACHE_CAPACITY: usize = 1000;
pub const DEFAULT_AST_CACHE_CAPACITY: usize = 5000;
pub const DEFAULT_COMPILED_CACHE_CAPACITY: usize = 1000;

/// Capacity overrides applied at library init via [`configure_caches`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub lexer_capacity: usize,
    pub ast_capacity: usize,
    pub compiled_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lexer_capacity: DEFAULT_LEXER_CACHE_CAPACITY,
            ast_capacity: DEFAULT_AST_CACHE_CAPACITY,
            compiled_capacity: DEFAULT_COMPILED_CACHE_CAPACITY,
        }
    }
}

/// Point-in-time statistics for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    #[must_use]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 { 0.0 } else { self.hit_count as f64 / total as f64 }
    }
}

/// Statistics for all three caches, read atomically per cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStatsReport {
    pub lexer: CacheStats,
    pub ast: CacheStats,
    pub compiled: CacheStats,
}

struct Slot<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

struct LruInner<K, V> {
    map: HashMap<K, usize>,
    slots: Vec<Slot<K, V>>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    capacity: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> LruInner<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::new(),
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            capacity,
            hits: 0,
            misses: 0,
            evictions: 0,
        }
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.slots[idx].prev, self.slots[idx].next);
        match prev {
            Some(p) => self.slots[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.slots[n].prev = prev,
            None => self.tail = prev,
        }
        self.slots[idx].prev = None;
        self.slots[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.slots[idx].prev = None;
        self.slots[idx].next = self.head;
        if let Some(old) = self.head {
            self.slots[old].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        match self.map.get(key).copied() {
            Some(idx) => {
                self.hits += 1;
                self.detach(idx);
                self.push_front(idx);
                Some(self.slots[idx].value.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        if let Some(idx) = self.map.get(&key).copied() {
            self.slots[idx].value = value;
            self.detach(idx);
            self.push_front(idx);
            return;
        }
        if self.map.len() >= self.capacity {
            self.evict_tail();
        }
        let slot = Slot { key: key.clone(), value, prev: None, next: None };
        let idx = match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = slot;
                idx
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    fn evict_tail(&mut self) {
        if let Some(idx) = self.tail {
            self.detach(idx);
            let key = self.slots[idx].key.clone();
            self.map.remove(&key);
            self.free.push(idx);
            self.evictions += 1;
        }
    }

    fn resize(&mut self, capacity: usize) {
        self.capacity = capacity;
        while self.map.len() > capacity {
            self.evict_tail();
        }
    }

    fn clear(&mut self) {
        self.map.clear();
        self.slots.clear();
        self.free.clear();
        self.head = None;
        self.tail = None;
        self.hits = 0;
        self.misses = 0;
        self.evictions = 0;
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hits,
            miss_count: self.misses,
            eviction_count: self.evictions,
            size: self.map.len(),
            capacity: self.capacity,
        }
    }
}

/// A thread-safe bounded LRU cache.
///
/// `get` moves the entry to the most-recent end; `insert` above capacity
/// drops the least-recently accessed entry. Values are cloned out, so
/// callers may mutate their copy freely.
pub struct LruCache<K, V> {
    inner: Mutex<LruInner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> LruCache<K, V> {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { inner: Mutex::new(LruInner::new(capacity)) }
    }

    fn lock(&self) -> MutexGuard<'_, LruInner<K, V>> {
        // A poisoned cache holds no broken invariants worth propagating;
        // recover the guard and keep serving.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().get(key)
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().insert(key, value);
    }

    /// Cached fill with double-checked locking. The fill runs outside the
    /// lock; the re-probe under the lock discards this fill if another
    /// thread inserted first.
    pub fn get_or_insert_with<Q>(&self, key: &Q, fill: impl FnOnce() -> V) -> V
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = fill();
        let mut inner = self.lock();
        // Second read under the lock; does not touch the hit/miss counters.
        if let Some(idx) = inner.map.get(key).copied() {
            inner.detach(idx);
            inner.push_front(idx);
            return inner.slots[idx].value.clone();
        }
        inner.insert(key.to_owned(), value.clone());
        value
    }

    /// Fallible variant of [`LruCache::get_or_insert_with`]; a failed fill
    /// inserts nothing.
    pub fn try_get_or_insert_with<Q, E>(
        &self,
        key: &Q,
        fill: impl FnOnce() -> std::result::Result<V, E>,
    ) -> std::result::Result<V, E>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ToOwned<Owned = K> + ?Sized,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fill()?;
        let mut inner = self.lock();
        if let Some(idx) = inner.map.get(key).copied() {
            inner.detach(idx);
            inner.push_front(idx);
            return Ok(inner.slots[idx].value.clone());
        }
        inner.insert(key.to_owned(), value.clone());
        Ok(value)
    }

    pub fn resize(&self, capacity: usize) {
        self.lock().resize(capacity);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.lock().stats()
    }

    /// Zeroes the hit/miss/eviction counters, keeping the entries.
    pub fn reset_stats(&self) {
        let mut inner = self.lock();
        inner.hits = 0;
        inner.misses = 0;
        inner.evictions = 0;
    }
}

/// A parsed statement stored in the AST fragment cache.
///
/// Entries hold their own copy of the tree; lookups clone it back out so
/// callers may transform the result without touching the cache.
#[derive(Debug, Clone)]
pub struct CachedFragment {
    pub statement: sqlparser::ast::Statement,
    /// SQL echo of the cached tree, for diagnostics.
    pub sql: String,
    pub parameter_count: usize,
}

/// Key for the AST fragment cache: whitespace-trimmed, lowercased SQL plus
/// the dialect it was parsed under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AstKey {
    pub normalized_sql: String,
    pub dialect: Dialect,
}

impl AstKey {
    #[must_use]
    pub fn new(sql: &str, dialect: Dialect) -> Self {
        Self { normalized_sql: sql.trim().to_lowercase(), dialect }
    }
}

/// Key for the compiled-statement cache.
///
/// `value_hash` joins `shape_hash` because two transformations are
/// value-dependent: NULL elision changes the SQL per null position, and
/// IN-list expansion changes it per array length.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompiledKey {
    pub sql: String,
    pub shape_hash: u64,
    pub value_hash: u64,
    pub config_id: u64,
    pub is_parsed: bool,
    pub flag_bits: u32,
}

static LEXER_CACHE: LazyLock<LruCache<String, Vec<ParameterInfo>>> =
    LazyLock::new(|| LruCache::new(DEFAULT_LEXER_CACHE_CAPACITY));

static AST_CACHE: LazyLock<LruCache<AstKey, CachedFragment>> =
    LazyLock::new(|| LruCache::new(DEFAULT_AST_CACHE_CAPACITY));

static COMPILED_CACHE: LazyLock<LruCache<CompiledKey, ProcessedState>> =
    LazyLock::new(|| LruCache::new(DEFAULT_COMPILED_CACHE_CAPACITY));

#[must_use]
pub fn lexer_cache() -> &'static LruCache<String, Vec<ParameterInfo>> {
    &LEXER_CACHE
}

#[must_use]
pub fn ast_cache() -> &'static LruCache<AstKey, CachedFragment> {
    &AST_CACHE
}

#[must_use]
pub fn compiled_cache() -> &'static LruCache<CompiledKey, ProcessedState> {
    &COMPILED_CACHE
}

/// Applies capacity overrides, evicting down where a cache shrank.
pub fn configure_caches(config: CacheConfig) {
    tracing::debug!(
        lexer = config.lexer_capacity,
        ast = config.ast_capacity,
        compiled = config.compiled_capacity,
        "resizing normalization caches"
    );
    LEXER_CACHE.resize(config.lexer_capacity);
    AST_CACHE.resize(config.ast_capacity);
    COMPILED_CACHE.resize(config.compiled_capacity);
}

/// Empties all three caches and resets their counters.
pub fn clear_caches() {
    LEXER_CACHE.clear();
    AST_CACHE.clear();
    COMPILED_CACHE.clear();
}

/// Zeroes every cache's counters without touching the entries.
pub fn reset_cache_stats() {
    LEXER_CACHE.reset_stats();
    AST_CACHE.reset_stats();
    COMPILED_CACHE.reset_stats();
}

/// Statistics for all three caches.
#[must_use]
pub fn cache_stats() -> CacheStatsReport {
    CacheStatsReport {
        lexer: LEXER_CACHE.stats(),
        ast: AST_CACHE.stats(),
        compiled: COMPILED_CACHE.stats(),
    }
}
