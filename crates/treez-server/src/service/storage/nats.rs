//! NATS JetStream key-value storage backend.

use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use treez_nats::NatsClient;
use treez_nats::kv::{KvStore, StorageBucket, StorageKey};

use super::StorageBackend;
use crate::{Error, Result};

/// Stored value with its own expiry.
///
/// The bucket has no age limit because entries carry different lifetimes.
/// An entry past `expires_at` reads as absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<Timestamp>,
}

impl StoredValue {
    fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

/// Storage backend shared by every server instance.
#[derive(Clone)]
pub struct NatsStorage {
    store: KvStore<StorageKey, StoredValue, StorageBucket>,
}

impl std::fmt::Debug for NatsStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsStorage")
            .field("bucket", &self.store.bucket())
            .finish()
    }
}

impl NatsStorage {
    /// Opens (or creates) the storage bucket.
    pub async fn new(client: &NatsClient) -> Result<Self> {
        let store = client.kv_store().await?;
        Ok(Self { store })
    }

    fn key(key: &str) -> Result<StorageKey> {
        Ok(StorageKey::new(key)?)
    }
}

#[async_trait::async_trait]
impl StorageBackend for NatsStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let key = Self::key(key)?;
        let stored = self.store.get(&key).await?;
        Ok(stored
            .map(|stored| stored.value)
            .filter(|stored| !stored.is_expired(Timestamp::now()))
            .map(|stored| stored.value))
    }

    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let key = Self::key(key)?;
        let expires_at = match ttl {
            Some(ttl) => {
                let ttl = SignedDuration::try_from(ttl)
                    .map_err(|e| Error::internal("storage", "ttl out of range").with_source(e))?;
                let expires_at = Timestamp::now()
                    .checked_add(ttl)
                    .map_err(|e| Error::internal("storage", "ttl out of range").with_source(e))?;
                Some(expires_at)
            }
            None => None,
        };

        self.store
            .put(&key, &StoredValue { value, expires_at })
            .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = Self::key(key)?;
        let Some(current) = self.store.get(&key).await? else {
            return Ok(false);
        };

        let live = !current.value.is_expired(Timestamp::now());
        let removed = self.store.remove_at(&key, current.revision).await?;

        Ok(removed && live)
    }
}
