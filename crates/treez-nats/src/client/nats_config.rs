//! Connection settings.

use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Where and how to reach NATS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct NatsConfig {
    /// Server URLs, comma separated for a cluster.
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-url", env = "NATS_URL", default_value = "nats://127.0.0.1:4222")
    )]
    pub nats_url: String,

    /// Authentication token.
    #[cfg_attr(feature = "config", arg(long = "nats-token", env = "NATS_TOKEN"))]
    pub nats_token: Option<String>,

    /// Seconds to wait for the initial connection.
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-connect-timeout", env = "NATS_CONNECT_TIMEOUT", default_value = "10")
    )]
    pub nats_connect_timeout: u64,

    /// Reconnect attempts before giving up, 0 for no limit.
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-max-reconnects", env = "NATS_MAX_RECONNECTS", default_value = "10")
    )]
    pub nats_max_reconnects: usize,
}

impl Default for NatsConfig {
    fn default() -> Self {
        Self::new("nats://127.0.0.1:4222")
    }
}

impl NatsConfig {
    /// Name the connection reports to the server.
    pub const CLIENT_NAME: &'static str = "treez-server";

    pub fn new(url: impl Into<String>) -> Self {
        Self {
            nats_url: url.into(),
            nats_token: None,
            nats_connect_timeout: 10,
            nats_max_reconnects: 10,
        }
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.nats_token = Some(token.into());
        self
    }

    /// Server URLs with blanks dropped.
    pub fn servers(&self) -> Vec<&str> {
        self.nats_url
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .collect()
    }

    #[inline]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.nats_connect_timeout)
    }

    /// `None` means reconnect forever.
    #[inline]
    pub const fn max_reconnects(&self) -> Option<usize> {
        match self.nats_max_reconnects {
            0 => None,
            max => Some(max),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let servers = self.servers();
        if servers.is_empty() {
            return Err(Error::InvalidConfig("no server url given".into()));
        }

        if let Some(url) = servers
            .iter()
            .find(|url| !url.starts_with("nats://") && !url.starts_with("tls://"))
        {
            return Err(Error::InvalidConfig(format!(
                "{url} is not a nats:// or tls:// url"
            )));
        }

        if self.nats_token.as_deref() == Some("") {
            return Err(Error::InvalidConfig("token is empty".into()));
        }

        if self.nats_connect_timeout == 0 {
            return Err(Error::InvalidConfig("connect timeout must be positive".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = NatsConfig::default();
        assert_eq!(config.servers(), vec!["nats://127.0.0.1:4222"]);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.max_reconnects(), Some(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn cluster_urls() {
        let config = NatsConfig::new("nats://a:4222, tls://b:4222,");
        assert_eq!(config.servers(), vec!["nats://a:4222", "tls://b:4222"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_bad_settings() {
        assert!(NatsConfig::new(" , ").validate().is_err());
        assert!(NatsConfig::new("http://a:4222").validate().is_err());
        assert!(NatsConfig::default().with_token("").validate().is_err());

        let unlimited = NatsConfig {
            nats_max_reconnects: 0,
            ..NatsConfig::default()
        };
        assert_eq!(unlimited.max_reconnects(), None);
    }
}
