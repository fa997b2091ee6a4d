//! Bucket definitions.

use std::time::Duration;

/// Static description of a KV bucket.
pub trait KvBucket: Send + Sync + 'static {
    const NAME: &'static str;
    const DESCRIPTION: &'static str;

    /// Bucket-wide age limit; [`Duration::ZERO`] keeps entries until deleted.
    const MAX_AGE: Duration = Duration::ZERO;

    /// Revisions kept per key.
    const HISTORY: i64 = 1;
}

/// Bucket of the server's secondary storage.
///
/// Sessions and reset tokens expire at different times, so entries carry
/// their own expiry and the bucket has no age limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorageBucket;

impl KvBucket for StorageBucket {
    const NAME: &'static str = "treez_storage";
    const DESCRIPTION: &'static str = "Sessions and password reset tokens";
}
