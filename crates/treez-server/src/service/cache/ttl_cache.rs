//! Bounded in-memory cache with per-entry time-to-live.
//!
//! Shared by the identity cache, the role cache and the rate-limit counters.
//! Critical sections are short and never cross an `.await`, so a plain
//! [`std::sync::Mutex`] guards the map.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    #[inline]
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Bounded TTL cache.
///
/// Cloning is cheap and every clone observes the same entries.
pub struct TtlCache<K, V> {
    entries: Arc<Mutex<HashMap<K, CacheEntry<V>>>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Creates a cache holding at most `capacity` entries, each living `ttl`.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::with_capacity(capacity.min(1024)))),
            capacity: capacity.max(1),
            ttl,
        }
    }

    /// Returns the default time-to-live of new entries.
    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the maximum number of entries.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a clone of the live value stored under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut entries = self.lock();

        let entry = entries.get(key)?;
        if !entry.is_expired(now) {
            return Some(entry.value.clone());
        }

        entries.remove(key);
        None
    }

    /// Inserts `value` with the default time-to-live.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, Some(self.ttl));
    }

    /// Inserts `value` living for `ttl`, or until evicted when `ttl` is `None`.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) {
        let now = Instant::now();
        let mut entries = self.lock();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            Self::evict(&mut entries, now);
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            },
        );
    }

    /// Inserts `value` without ever displacing a live entry.
    ///
    /// Replacing `key` always succeeds. A new key gets a slot only if one is
    /// free or can be taken from an expired entry; otherwise the value is
    /// handed back.
    pub fn try_insert_with_ttl(&self, key: K, value: V, ttl: Option<Duration>) -> Result<(), V> {
        let now = Instant::now();
        let mut entries = self.lock();

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            Self::purge(&mut entries, now);
            if entries.len() >= self.capacity {
                return Err(value);
            }
        }

        entries.insert(
            key,
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: ttl.and_then(|ttl| now.checked_add(ttl)),
            },
        );
        Ok(())
    }

    /// Removes `key`, returning its value when it had not expired yet.
    pub fn remove(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        self.lock()
            .remove(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value)
    }

    /// Runs `f` on the live value under `key` and returns its result.
    ///
    /// A missing or expired entry is first replaced by `default()` with a fresh
    /// time-to-live. Updating an existing entry does not extend its lifetime.
    pub fn with_entry<R>(
        &self,
        key: K,
        default: impl FnOnce() -> V,
        f: impl FnOnce(&mut V) -> R,
    ) -> R {
        let now = Instant::now();
        let mut entries = self.lock();

        let live = entries.get(&key).is_some_and(|entry| !entry.is_expired(now));
        if !live {
            entries.remove(&key);
            if entries.len() >= self.capacity {
                Self::evict(&mut entries, now);
            }
        }

        let entry = entries.entry(key).or_insert_with(|| CacheEntry {
            value: default(),
            inserted_at: now,
            expires_at: now.checked_add(self.ttl),
        });

        f(&mut entry.value)
    }

    /// Returns the number of stored entries, expired ones included.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when no entries are stored.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drops expired entries and returns how many were removed.
    fn purge(entries: &mut HashMap<K, CacheEntry<V>>, now: Instant) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Frees one slot: expired entries go first, then the oldest one.
    fn evict(entries: &mut HashMap<K, CacheEntry<V>>, now: Instant) {
        if Self::purge(entries, now) > 0 {
            return;
        }

        let oldest = entries
            .iter()
            .min_by_key(|(_, entry)| entry.inserted_at)
            .map(|(key, _)| key.clone());

        if let Some(key) = oldest {
            entries.remove(&key);
        }
    }
}

impl<K, V> Clone for TtlCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
            capacity: self.capacity,
            ttl: self.ttl,
        }
    }
}

impl<K, V> fmt::Debug for TtlCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TtlCache")
            .field("capacity", &self.capacity)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}
