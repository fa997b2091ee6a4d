//! Storage service wrapper with observability.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{MemoryStorage, StorageBackend};
use crate::{Result, TRACING_TARGET_STORAGE};

/// Secondary storage shared by the repositories.
///
/// Wraps any [`StorageBackend`] in an `Arc` for cheap cloning and adds
/// JSON helpers plus structured logging.
#[derive(Clone)]
pub struct SecondaryStorage {
    inner: Arc<dyn StorageBackend>,
    backend: &'static str,
}

impl fmt::Debug for SecondaryStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecondaryStorage")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl SecondaryStorage {
    /// Creates a new storage wrapper around `backend`.
    pub fn new<B>(name: &'static str, backend: B) -> Self
    where
        B: StorageBackend + 'static,
    {
        Self {
            inner: Arc::new(backend),
            backend: name,
        }
    }

    /// Creates an in-memory storage, used by tests and single-instance setups.
    pub fn memory() -> Self {
        Self::new("memory", MemoryStorage::default())
    }

    /// Returns the name of the backend.
    #[inline]
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// Returns the raw value stored under `key`.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self.inner.get(key).await;
        if let Err(error) = &result {
            tracing::error!(
                target: TRACING_TARGET_STORAGE,
                backend = self.backend,
                key,
                error = %error,
                "storage read failed"
            );
        }
        result
    }

    /// Stores a raw value under `key`.
    pub async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        tracing::trace!(
            target: TRACING_TARGET_STORAGE,
            backend = self.backend,
            key,
            ttl_secs = ttl.map(|ttl| ttl.as_secs()),
            "storage write"
        );

        let result = self.inner.set(key, value, ttl).await;
        if let Err(error) = &result {
            tracing::error!(
                target: TRACING_TARGET_STORAGE,
                backend = self.backend,
                key,
                error = %error,
                "storage write failed"
            );
        }
        result
    }

    /// Deletes `key`, returning whether this call removed it.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let result = self.inner.delete(key).await;
        match &result {
            Ok(removed) => tracing::trace!(
                target: TRACING_TARGET_STORAGE,
                backend = self.backend,
                key,
                removed,
                "storage delete"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET_STORAGE,
                backend = self.backend,
                key,
                error = %error,
                "storage delete failed"
            ),
        }
        result
    }

    /// Reads and decodes a JSON value.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Encodes and stores a JSON value.
    pub async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.set(key, raw, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Marker {
        id: u32,
    }

    #[tokio::test]
    async fn json_helpers() -> anyhow::Result<()> {
        let storage = SecondaryStorage::memory();
        storage.set_json("marker.1", &Marker { id: 1 }, None).await?;

        let marker: Option<Marker> = storage.get_json("marker.1").await?;
        assert_eq!(marker, Some(Marker { id: 1 }));
        assert!(storage.delete("marker.1").await?);
        assert!(!storage.delete("marker.1").await?);
        Ok(())
    }
}
