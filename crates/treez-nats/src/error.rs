//! Errors returned by the NATS wrappers.

use std::time::Duration;

/// Boxed error source.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server could not be reached.
    #[error("cannot connect to nats at {servers}")]
    Connect {
        servers: String,
        #[source]
        source: async_nats::ConnectError,
    },

    /// A call did not finish in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// A key-value call was rejected by JetStream.
    #[error("{operation} failed")]
    Kv {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// A stored value is not valid JSON for the expected type.
    #[error("cannot encode or decode value")]
    Codec(#[from] serde_json::Error),

    /// A key breaks the NATS key-value naming rules.
    #[error("invalid key {key:?}: {reason}")]
    InvalidKey { key: String, reason: &'static str },

    #[error("invalid nats configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Wraps a JetStream key-value failure.
    pub fn kv(operation: &'static str, source: impl Into<BoxError>) -> Self {
        Self::Kv {
            operation,
            source: source.into(),
        }
    }

    /// Returns `true` when retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Timeout { .. })
    }
}
