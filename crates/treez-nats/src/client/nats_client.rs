//! Shared NATS connection.

use std::time::Duration;

use async_nats::{ConnectOptions, jetstream};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::timeout;

use super::nats_config::NatsConfig;
use crate::kv::{KvBucket, KvKey, KvStore};
use crate::{Error, Result, TRACING_TARGET_CLIENT, TRACING_TARGET_CONNECTION};

/// Cap of the doubling reconnect delay.
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);

/// First reconnect delay.
const BASE_RECONNECT_DELAY: Duration = Duration::from_millis(250);

/// JetStream context over one NATS connection.
///
/// `async-nats` multiplexes everything over that connection, so one client is
/// cloned wherever it is needed.
#[derive(Debug, Clone)]
pub struct NatsClient {
    jetstream: jetstream::Context,
}

/// Delay before reconnect attempt `attempt`, doubling up to a cap.
fn reconnect_delay(attempt: usize) -> Duration {
    let factor = 2_u32.saturating_pow(attempt.min(16) as u32);
    BASE_RECONNECT_DELAY
        .saturating_mul(factor)
        .min(MAX_RECONNECT_DELAY)
}

impl NatsClient {
    /// Connects to the configured servers.
    ///
    /// Fails if the first connection is not up within the connect timeout;
    /// later drops are retried in the background with backoff.
    #[tracing::instrument(skip_all, target = TRACING_TARGET_CONNECTION)]
    pub async fn connect(config: NatsConfig) -> Result<Self> {
        config.validate()?;

        let servers = config.servers().join(",");
        let mut options = ConnectOptions::new()
            .name(NatsConfig::CLIENT_NAME)
            .connection_timeout(config.connect_timeout())
            .reconnect_delay_callback(reconnect_delay);

        if let Some(token) = config.nats_token.clone() {
            options = options.token(token);
        }
        if let Some(max) = config.max_reconnects() {
            options = options.max_reconnects(max);
        }

        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            servers = %servers,
            "connecting to nats"
        );

        let after = config.connect_timeout();
        let client = timeout(after, async_nats::connect_with_options(servers.as_str(), options))
            .await
            .map_err(|_| Error::Timeout {
                operation: "connect",
                after,
            })?
            .map_err(|source| Error::Connect {
                servers: servers.clone(),
                source,
            })?;

        let info = client.server_info();
        tracing::info!(
            target: TRACING_TARGET_CONNECTION,
            server_id = %info.server_id,
            server_version = %info.version,
            "connected to nats"
        );

        Ok(Self {
            jetstream: jetstream::new(client),
        })
    }

    /// Opens the typed store for bucket `B`, creating the bucket if needed.
    pub async fn kv_store<K, V, B>(&self) -> Result<KvStore<K, V, B>>
    where
        K: KvKey,
        V: Serialize + DeserializeOwned + Send + Sync + 'static,
        B: KvBucket,
    {
        tracing::debug!(
            target: TRACING_TARGET_CLIENT,
            bucket = B::NAME,
            "opening kv store"
        );

        KvStore::open(&self.jetstream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconnect_delay_doubles_up_to_cap() {
        assert_eq!(reconnect_delay(0), Duration::from_millis(250));
        assert_eq!(reconnect_delay(2), Duration::from_secs(1));
        assert_eq!(reconnect_delay(20), MAX_RECONNECT_DELAY);
    }
}
