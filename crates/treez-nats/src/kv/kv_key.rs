//! Bucket keys.

use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Key type of a [`KvStore`](super::KvStore).
pub trait KvKey: fmt::Debug + fmt::Display + Send + Sync + 'static {}

/// Key checked against the NATS naming rules: non-empty, made of
/// `A-Z a-z 0-9 - _ = / .` and not starting or ending with a dot.
///
/// The server builds keys as `<kind>.<id>`, for example `session.<hash>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Result<Self, Error> {
        let key = key.into();
        let reason = if key.is_empty() {
            Some("empty key")
        } else if key.starts_with('.') || key.ends_with('.') {
            Some("leading or trailing dot")
        } else if !key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_=/.".contains(&b))
        {
            Some("unsupported character")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(Error::InvalidKey { key, reason }),
            None => Ok(Self(key)),
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl KvKey for StorageKey {}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for StorageKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
