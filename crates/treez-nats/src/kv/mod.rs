//! Typed JetStream key-value storage.
//!
//! ```ignore
//! let store: KvStore<StorageKey, Session, StorageBucket> = client.kv_store().await?;
//!
//! let key = StorageKey::new("session.4f2a")?;
//! store.put(&key, &session).await?;
//!
//! if let Some(current) = store.get(&key).await? {
//!     let won = store.remove_at(&key, current.revision).await?;
//! }
//! ```

mod kv_bucket;
mod kv_key;
mod kv_store;

pub use kv_bucket::{KvBucket, StorageBucket};
pub use kv_key::{KvKey, StorageKey};
pub use kv_store::{KvStore, Revisioned};
