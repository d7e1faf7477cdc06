//! Per-attribute value caches.
//!
//! Every reified attribute owns one [`CacheStore`] keyed by [`NodeKey`]. An
//! entry remembers the node it was computed for, which keeps the node alive
//! (and its address unique) for as long as the entry exists, and a
//! [`Fingerprint`] of the structure the value was computed from. A lookup
//! whose fingerprint no longer matches the live tree is treated as stale.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use arbor_common::NodeKey;
use arbor_config::MemoMode;

/// The structural facts a cached value was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// Identity keys of the node's children, in child order.
    Children(Vec<NodeKey>),
    /// Identity key of the node's parent (`None` for the root).
    Parent(Option<NodeKey>),
    /// The value depends on the node alone.
    Local,
}

/// A cached attribute value.
#[derive(Debug, Clone)]
pub struct CacheEntry<N, R> {
    /// The node the value was computed for.
    pub node: N,
    /// The cached value.
    pub value: R,
    /// Structure the value was computed from.
    pub fingerprint: Fingerprint,
}

/// Storage for one attribute's cached values.
pub trait CacheStore<N, R> {
    /// The memoization strategy this store implements.
    fn mode(&self) -> MemoMode;

    /// Looks up the entry for `key`, marking it as recently used.
    fn lookup(&mut self, key: NodeKey) -> Option<&CacheEntry<N, R>>;

    /// Looks up the entry for `key` without touching its recency.
    fn peek(&self, key: NodeKey) -> Option<&CacheEntry<N, R>>;

    /// Returns `true` if an entry for `key` exists. Never affects eviction.
    fn contains(&self, key: NodeKey) -> bool {
        self.peek(key).is_some()
    }

    /// Stores an entry, replacing any previous entry for `key`.
    fn insert(&mut self, key: NodeKey, entry: CacheEntry<N, R>);

    /// Removes the entry for `key`. Returns `true` if one existed.
    fn remove(&mut self, key: NodeKey) -> bool;

    /// Removes every entry.
    fn clear(&mut self);

    /// Number of cached entries.
    fn len(&self) -> usize;

    /// Returns `true` if nothing is cached.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of entries dropped to respect a capacity limit.
    fn evictions(&self) -> usize {
        0
    }
}

/// Creates the store for a memoization mode.
pub fn new_store<N: 'static, R: 'static>(
    mode: MemoMode,
    lru_capacity: usize,
) -> Box<dyn CacheStore<N, R>> {
    match mode {
        MemoMode::None => Box::new(NoCache),
        MemoMode::Identity => Box::new(IdentityCache::new()),
        MemoMode::Lru => Box::new(LruCache::new(lru_capacity)),
    }
}

/// A cache store handed out by a [`Plugin`](crate::Plugin), erased over the
/// node and value types it holds.
///
/// The registry installs it only for an attribute whose node and value types
/// match the ones the store was created for.
pub struct CustomStore {
    store: Box<dyn Any>,
}

impl CustomStore {
    /// Wraps a store for attributes over `N` nodes producing `R` values.
    pub fn new<N: 'static, R: 'static>(store: impl CacheStore<N, R> + 'static) -> Self {
        let store: Box<dyn CacheStore<N, R>> = Box::new(store);
        Self {
            store: Box::new(store),
        }
    }

    /// Recovers the typed store, or `None` if it holds other types.
    pub(crate) fn into_store<N: 'static, R: 'static>(self) -> Option<Box<dyn CacheStore<N, R>>> {
        self.store
            .downcast::<Box<dyn CacheStore<N, R>>>()
            .ok()
            .map(|store| *store)
    }
}

impl fmt::Debug for CustomStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomStore").finish_non_exhaustive()
    }
}

/// A store that never retains anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl<N, R> CacheStore<N, R> for NoCache {
    fn mode(&self) -> MemoMode {
        MemoMode::None
    }

    fn lookup(&mut self, _key: NodeKey) -> Option<&CacheEntry<N, R>> {
        None
    }

    fn peek(&self, _key: NodeKey) -> Option<&CacheEntry<N, R>> {
        None
    }

    fn insert(&mut self, _key: NodeKey, _entry: CacheEntry<N, R>) {}

    fn remove(&mut self, _key: NodeKey) -> bool {
        false
    }

    fn clear(&mut self) {}

    fn len(&self) -> usize {
        0
    }
}

/// An unbounded store keyed by node identity.
#[derive(Debug)]
pub struct IdentityCache<N, R> {
    entries: HashMap<NodeKey, CacheEntry<N, R>>,
}

impl<N, R> Default for IdentityCache<N, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N, R> IdentityCache<N, R> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<N, R> CacheStore<N, R> for IdentityCache<N, R> {
    fn mode(&self) -> MemoMode {
        MemoMode::Identity
    }

    fn lookup(&mut self, key: NodeKey) -> Option<&CacheEntry<N, R>> {
        self.entries.get(&key)
    }

    fn peek(&self, key: NodeKey) -> Option<&CacheEntry<N, R>> {
        self.entries.get(&key)
    }

    fn insert(&mut self, key: NodeKey, entry: CacheEntry<N, R>) {
        self.entries.insert(key, entry);
    }

    fn remove(&mut self, key: NodeKey) -> bool {
        self.entries.remove(&key).is_some()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A bounded store that evicts the least recently used entry when full.
///
/// Recency is a monotonically increasing tick; the ordered `recency` map
/// yields the oldest entry first.
#[derive(Debug)]
pub struct LruCache<N, R> {
    capacity: usize,
    entries: HashMap<NodeKey, (CacheEntry<N, R>, u64)>,
    recency: BTreeMap<u64, NodeKey>,
    tick: u64,
    evictions: usize,
}

impl<N, R> LruCache<N, R> {
    /// Creates a store holding at most `capacity` entries (at least one).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            tick: 0,
            evictions: 0,
        }
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

impl<N, R> CacheStore<N, R> for LruCache<N, R> {
    fn mode(&self) -> MemoMode {
        MemoMode::Lru
    }

    fn lookup(&mut self, key: NodeKey) -> Option<&CacheEntry<N, R>> {
        self.tick += 1;
        let (entry, stamp) = self.entries.get_mut(&key)?;
        self.recency.remove(&*stamp);
        *stamp = self.tick;
        self.recency.insert(self.tick, key);
        Some(entry)
    }

    fn peek(&self, key: NodeKey) -> Option<&CacheEntry<N, R>> {
        self.entries.get(&key).map(|(entry, _)| entry)
    }

    fn insert(&mut self, key: NodeKey, entry: CacheEntry<N, R>) {
        let tick = self.next_tick();
        if let Some((old, stamp)) = self.entries.get_mut(&key) {
            *old = entry;
            self.recency.remove(&*stamp);
            *stamp = tick;
            self.recency.insert(tick, key);
            return;
        }
        if self.entries.len() >= self.capacity {
            if let Some((_, victim)) = self.recency.pop_first() {
                self.entries.remove(&victim);
                self.evictions += 1;
                tracing::trace!(node = %victim, "evicted least recently used entry");
            }
        }
        self.entries.insert(key, (entry, tick));
        self.recency.insert(tick, key);
    }

    fn remove(&mut self, key: NodeKey) -> bool {
        match self.entries.remove(&key) {
            Some((_, stamp)) => {
                self.recency.remove(&stamp);
                true
            }
            None => false,
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn evictions(&self) -> usize {
        self.evictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: usize) -> NodeKey {
        NodeKey::from_raw(raw)
    }

    fn entry(value: u32) -> CacheEntry<(), u32> {
        CacheEntry {
            node: (),
            value,
            fingerprint: Fingerprint::Local,
        }
    }

    #[test]
    fn no_cache_retains_nothing() {
        let mut store: Box<dyn CacheStore<(), u32>> = new_store(MemoMode::None, 4);
        store.insert(key(1), entry(1));
        assert!(store.lookup(key(1)).is_none());
        assert!(store.is_empty());
        assert_eq!(store.mode(), MemoMode::None);
    }

    #[test]
    fn identity_cache_replaces() {
        let mut store = IdentityCache::new();
        store.insert(key(1), entry(1));
        store.insert(key(1), entry(2));
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup(key(1)).map(|e| e.value), Some(2));
        assert!(store.remove(key(1)));
        assert!(!store.remove(key(1)));
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let mut store = LruCache::new(2);
        store.insert(key(1), entry(1));
        store.insert(key(2), entry(2));
        // Touch 1 so that 2 becomes the eviction victim.
        assert!(store.lookup(key(1)).is_some());
        store.insert(key(3), entry(3));
        assert_eq!(store.len(), 2);
        assert!(store.lookup(key(2)).is_none());
        assert!(store.lookup(key(1)).is_some());
        assert!(store.lookup(key(3)).is_some());
        assert_eq!(store.evictions(), 1);
    }

    #[test]
    fn peeking_leaves_eviction_order_alone() {
        let mut store = LruCache::new(2);
        store.insert(key(1), entry(1));
        store.insert(key(2), entry(2));
        assert!(store.contains(key(1)));
        assert_eq!(store.peek(key(1)).map(|e| e.value), Some(1));
        store.insert(key(3), entry(3));
        assert!(!store.contains(key(1)));
        assert!(store.contains(key(2)));
        assert!(store.contains(key(3)));
    }

    #[test]
    fn custom_store_only_matches_its_own_types() {
        let store = CustomStore::new::<(), u32>(IdentityCache::new());
        assert!(store.into_store::<(), String>().is_none());
        let store = CustomStore::new::<(), u32>(LruCache::new(3));
        let mut typed = store.into_store::<(), u32>().unwrap();
        typed.insert(key(1), entry(7));
        assert_eq!(typed.mode(), MemoMode::Lru);
        assert_eq!(typed.peek(key(1)).map(|e| e.value), Some(7));
    }

    #[test]
    fn lru_reinsert_does_not_evict() {
        let mut store = LruCache::new(2);
        store.insert(key(1), entry(1));
        store.insert(key(2), entry(2));
        store.insert(key(2), entry(20));
        assert_eq!(store.len(), 2);
        assert_eq!(store.evictions(), 0);
        assert_eq!(store.lookup(key(2)).map(|e| e.value), Some(20));
    }

    #[test]
    fn lru_capacity_is_at_least_one() {
        let mut store: LruCache<(), u32> = LruCache::new(0);
        assert_eq!(store.capacity(), 1);
        store.insert(key(1), entry(1));
        store.insert(key(2), entry(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn lru_remove_and_clear() {
        let mut store = LruCache::new(4);
        store.insert(key(1), entry(1));
        store.insert(key(2), entry(2));
        assert!(store.remove(key(1)));
        assert_eq!(store.len(), 1);
        store.clear();
        assert!(store.is_empty());
        store.insert(key(3), entry(3));
        assert_eq!(store.len(), 1);
    }
}
