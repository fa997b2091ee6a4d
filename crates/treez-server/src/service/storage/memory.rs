//! In-memory storage backend.

use std::time::Duration;

use super::StorageBackend;
use crate::service::TtlCache;
use crate::{Error, Result};

/// Default number of keys kept in memory.
const DEFAULT_CAPACITY: usize = 100_000;

/// Default lifetime of keys written without a time-to-live.
const DEFAULT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Per-process storage backend.
///
/// Entries are only dropped when deleted or expired. Once every slot holds a
/// live entry, writes of new keys fail.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    cache: TtlCache<String, String>,
}

impl MemoryStorage {
    /// Creates a backend holding at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: TtlCache::new(capacity, DEFAULT_TTL),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cache.get(&key.to_owned()))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        self.cache
            .try_insert_with_ttl(key.to_owned(), value, ttl)
            .map_err(|_| {
                let capacity = self.cache.capacity();
                Error::external("memory", format!("storage full ({capacity} live keys)"))
            })
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.cache.remove(&key.to_owned()).is_some())
    }
}
