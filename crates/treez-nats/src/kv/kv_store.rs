//! Typed JSON store over a JetStream KV bucket.

use std::marker::PhantomData;

use async_nats::jetstream::{self, kv};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{KvBucket, KvKey};
use crate::{Error, Result, TRACING_TARGET_KV};

/// Value read together with the revision it was written at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revisioned<V> {
    pub value: V,
    pub revision: u64,
}

/// JSON values of type `V` under keys `K` in bucket `B`.
pub struct KvStore<K, V, B> {
    store: kv::Store,
    _types: PhantomData<fn() -> (K, V, B)>,
}

impl<K, V, B> Clone for KvStore<K, V, B> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            _types: PhantomData,
        }
    }
}

impl<K, V, B> KvStore<K, V, B>
where
    K: KvKey,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: KvBucket,
{
    /// Binds to bucket `B`, creating it on first use.
    pub(crate) async fn open(jetstream: &jetstream::Context) -> Result<Self> {
        let store = match jetstream.get_key_value(B::NAME).await {
            Ok(store) => store,
            Err(_) => {
                tracing::info!(
                    target: TRACING_TARGET_KV,
                    bucket = B::NAME,
                    max_age_secs = B::MAX_AGE.as_secs(),
                    "creating kv bucket"
                );

                jetstream
                    .create_key_value(kv::Config {
                        bucket: B::NAME.to_owned(),
                        description: B::DESCRIPTION.to_owned(),
                        history: B::HISTORY,
                        max_age: B::MAX_AGE,
                        ..Default::default()
                    })
                    .await
                    .map_err(|e| Error::kv("kv_create", e))?
            }
        };

        Ok(Self {
            store,
            _types: PhantomData,
        })
    }

    #[inline]
    pub fn bucket(&self) -> &'static str {
        B::NAME
    }

    /// Writes `value` and returns the new revision.
    pub async fn put(&self, key: &K, value: &V) -> Result<u64> {
        let bytes = serde_json::to_vec(value)?;
        let size = bytes.len();
        let revision = self
            .store
            .put(key.to_string(), bytes.into())
            .await
            .map_err(|e| Error::kv("kv_put", e))?;

        tracing::trace!(
            target: TRACING_TARGET_KV,
            bucket = B::NAME,
            key = %key,
            revision,
            size,
            "kv put"
        );
        Ok(revision)
    }

    /// Reads the latest value. Deleted and purged keys read as `None`.
    pub async fn get(&self, key: &K) -> Result<Option<Revisioned<V>>> {
        let entry = self
            .store
            .entry(key.to_string())
            .await
            .map_err(|e| Error::kv("kv_get", e))?;

        match entry {
            Some(entry) if entry.operation == kv::Operation::Put => Ok(Some(Revisioned {
                value: serde_json::from_slice(&entry.value)?,
                revision: entry.revision,
            })),
            _ => Ok(None),
        }
    }

    /// Deletes `key` if it is still at `revision`.
    ///
    /// Of two callers removing the same revision exactly one gets `true`,
    /// across processes too.
    pub async fn remove_at(&self, key: &K, revision: u64) -> Result<bool> {
        let rejected = match self
            .store
            .delete_expect_revision(key.to_string(), Some(revision))
            .await
        {
            Ok(()) => return Ok(true),
            Err(rejected) => rejected,
        };

        // The server answers a stale revision with an error too; only a key
        // still at `revision` means the call itself failed.
        let current = self.get(key).await?;
        if current.is_some_and(|current| current.revision == revision) {
            return Err(Error::kv("kv_delete", rejected));
        }

        tracing::debug!(
            target: TRACING_TARGET_KV,
            bucket = B::NAME,
            key = %key,
            revision,
            "kv key moved on before delete"
        );
        Ok(false)
    }
}
