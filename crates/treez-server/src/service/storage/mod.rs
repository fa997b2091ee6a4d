//! Secondary key-value storage.
//!
//! Sessions and password-reset tokens live here. The backend is chosen at
//! startup:
//! - [`MemoryStorage`]: per-process, backed by a [`TtlCache`]
//! - [`NatsStorage`]: shared, backed by a NATS JetStream key-value bucket
//!
//! [`TtlCache`]: crate::service::TtlCache

mod memory;
mod nats;
mod service;

use std::time::Duration;

pub use memory::MemoryStorage;
pub use nats::NatsStorage;
pub use service::SecondaryStorage;

use crate::Result;

/// Core trait for secondary storage backends.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Returns the value stored under `key`, if any and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, expiring after `ttl` when given.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Deletes `key`.
    ///
    /// Returns `true` only for the caller that actually removed a live value,
    /// so concurrent deletes of one key report success exactly once.
    async fn delete(&self, key: &str) -> Result<bool>;
}
