//! LRU map wrapper
//!
//! Wraps the `lru` crate and reports which entry, if any, an insert pushed
//! out. Callers that need to count evictions use [`LruCache::insert`]; a
//! plain overwrite of an existing key is never reported as an eviction.

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache as ExternalLruCache;

/// Outcome of [`LruCache::insert`].
#[derive(Debug, PartialEq, Eq)]
pub enum Inserted<K, V> {
    /// The key was new and there was room for it.
    Fresh,
    /// The key already existed; its previous value is returned.
    Replaced(V),
    /// The key was new and the least recently used entry was evicted.
    Evicted(K, V),
}

/// LRU (Least Recently Used) map
///
/// # Examples
///
/// ```
/// # #[cfg(feature = "foundation")]
/// # {
/// use std::num::NonZeroUsize;
///
/// use layercache_common::collections::lru::{Inserted, LruCache};
///
/// let mut cache = LruCache::new(NonZeroUsize::new(2).expect("capacity must be > 0"));
/// cache.insert("a", 1);
/// cache.insert("b", 2);
/// assert_eq!(cache.get(&"a"), Some(&1));
///
/// // "b" is now the least recently used entry.
/// assert_eq!(cache.insert("c", 3), Inserted::Evicted("b", 2));
/// # }
/// ```
#[derive(Debug)]
pub struct LruCache<K, V>
where
    K: Hash + Eq,
{
    inner: ExternalLruCache<K, V>,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// Create a new LRU map with the specified non-zero capacity
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self { inner: ExternalLruCache::new(capacity) }
    }

    /// Try to create a new LRU map with the specified capacity
    ///
    /// Returns None if capacity is zero
    pub fn try_new(capacity: usize) -> Option<Self> {
        let capacity = NonZeroUsize::new(capacity)?;
        Some(Self { inner: ExternalLruCache::new(capacity) })
    }

    /// Create a map with no capacity bound
    pub fn unbounded() -> Self {
        Self { inner: ExternalLruCache::unbounded() }
    }

    /// Insert or update `key`, marking it most recently used.
    ///
    /// When the key is new and the map is full, exactly one entry (the
    /// current least recently used) is evicted before the insert.
    pub fn insert(&mut self, key: K, value: V) -> Inserted<K, V> {
        if self.inner.contains(&key) {
            return match self.inner.put(key, value) {
                Some(previous) => Inserted::Replaced(previous),
                None => Inserted::Fresh,
            };
        }
        match self.inner.push(key, value) {
            Some((evicted_key, evicted_value)) => Inserted::Evicted(evicted_key, evicted_value),
            None => Inserted::Fresh,
        }
    }

    /// Get a reference to a value, marking it most recently used
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key)
    }

    /// Peek at a value without updating recency
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.peek(key)
    }

    /// Peek at the least recently used entry
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.inner.peek_lru()
    }

    /// Check if a key exists without updating recency
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains(key)
    }

    /// Remove a key
    pub fn pop<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.pop(key)
    }

    /// Remove and return the least recently used entry
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        self.inner.pop_lru()
    }

    /// Get the current number of entries
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if the map is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Get the capacity of the map
    pub fn cap(&self) -> usize {
        self.inner.cap().get()
    }

    /// Clear all entries
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Resize the map, evicting least recently used entries if it shrinks
    pub fn resize(&mut self, capacity: NonZeroUsize) {
        self.inner.resize(capacity);
    }

    /// Iterate entries, most recently used first
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.inner.iter()
    }
}
