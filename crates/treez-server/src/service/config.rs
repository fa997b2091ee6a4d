use std::path::PathBuf;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::{Args, ValueEnum};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use treez_nats::{NatsClient, NatsConfig};

use crate::service::{NatsStorage, SecondaryStorage, TokenKeys};
use crate::{Error, Result};

/// Default values for configuration options.
mod defaults {
    /// Access token lifetime: 15 minutes.
    pub const ACCESS_TOKEN_TTL_SECS: u64 = 15 * 60;

    /// Refresh token lifetime: 7 days.
    pub const REFRESH_TOKEN_TTL_SECS: u64 = 7 * 24 * 60 * 60;

    /// Requests allowed per client within one window.
    pub const RATE_LIMIT_REQUESTS: u32 = 100;

    /// Rate limit window length.
    pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

    /// Number of client keys tracked by the rate limiter.
    pub const RATE_LIMIT_CAPACITY: usize = 10_000;

    /// Number of cached identities and role decisions.
    pub const CACHE_CAPACITY: usize = 10_000;

    /// Lifetime of cached identities and role decisions.
    pub const CACHE_TTL_SECS: u64 = 5 * 60;
}

/// Where sessions and reset tokens are stored.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::Display, strum::EnumString)]
#[cfg_attr(feature = "config", derive(ValueEnum))]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StorageKind {
    /// Per-process memory.
    #[default]
    Memory,
    /// NATS JetStream key-value bucket.
    Nats,
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
#[builder(
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct ServiceConfig {
    /// Secret used to sign access tokens.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "JWT_SECRET_KEY", hide_env_values = true)
    )]
    #[builder(default)]
    pub access_token_secret: Option<String>,

    /// Secret used to sign refresh tokens.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "JWT_REFRESH_SECRET_KEY", hide_env_values = true)
    )]
    #[builder(default)]
    pub refresh_token_secret: Option<String>,

    /// File holding the access token secret, read instead of the inline secret.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "JWT_SECRET_KEY_FILE")
    )]
    #[builder(default)]
    pub access_token_secret_file: Option<PathBuf>,

    /// File holding the refresh token secret, read instead of the inline secret.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "JWT_REFRESH_SECRET_KEY_FILE")
    )]
    #[builder(default)]
    pub refresh_token_secret_file: Option<PathBuf>,

    /// Access token lifetime in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "ACCESS_TOKEN_TTL_SECS", default_value_t = defaults::ACCESS_TOKEN_TTL_SECS)
    )]
    #[builder(default = "defaults::ACCESS_TOKEN_TTL_SECS")]
    pub access_token_ttl_secs: u64,

    /// Refresh token lifetime in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "REFRESH_TOKEN_TTL_SECS", default_value_t = defaults::REFRESH_TOKEN_TTL_SECS)
    )]
    #[builder(default = "defaults::REFRESH_TOKEN_TTL_SECS")]
    pub refresh_token_ttl_secs: u64,

    /// Production mode: marks cookies `Secure`.
    #[cfg_attr(feature = "config", arg(long, env = "PRODUCTION"))]
    #[builder(default)]
    pub production: bool,

    /// Requests allowed per client within one window.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "RATE_LIMIT_REQUESTS", default_value_t = defaults::RATE_LIMIT_REQUESTS)
    )]
    #[builder(default = "defaults::RATE_LIMIT_REQUESTS")]
    pub rate_limit_requests: u32,

    /// Rate limit window length in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "RATE_LIMIT_WINDOW_SECS", default_value_t = defaults::RATE_LIMIT_WINDOW_SECS)
    )]
    #[builder(default = "defaults::RATE_LIMIT_WINDOW_SECS")]
    pub rate_limit_window_secs: u64,

    /// Number of client keys tracked by the rate limiter.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "RATE_LIMIT_CAPACITY", default_value_t = defaults::RATE_LIMIT_CAPACITY)
    )]
    #[builder(default = "defaults::RATE_LIMIT_CAPACITY")]
    pub rate_limit_capacity: usize,

    /// Number of cached identities and role decisions.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "AUTH_CACHE_CAPACITY", default_value_t = defaults::CACHE_CAPACITY)
    )]
    #[builder(default = "defaults::CACHE_CAPACITY")]
    pub cache_capacity: usize,

    /// Lifetime of cached identities and role decisions in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "AUTH_CACHE_TTL_SECS", default_value_t = defaults::CACHE_TTL_SECS)
    )]
    #[builder(default = "defaults::CACHE_TTL_SECS")]
    pub cache_ttl_secs: u64,

    /// Secondary storage backend.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "STORAGE_BACKEND", value_enum, default_value_t = StorageKind::Memory)
    )]
    #[builder(default)]
    pub storage: StorageKind,

    /// NATS connection, used by the `nats` storage backend.
    #[cfg_attr(feature = "config", command(flatten))]
    #[builder(default)]
    pub nats: NatsConfig,

    /// Email of an admin user created at startup when missing.
    #[cfg_attr(feature = "config", arg(long, env = "ADMIN_EMAIL"))]
    #[builder(default)]
    pub admin_email: Option<String>,

    /// Password of the startup admin user.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)
    )]
    #[builder(default)]
    pub admin_password: Option<String>,
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Returns the access token lifetime.
    #[inline]
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_ttl_secs)
    }

    /// Returns the refresh token lifetime.
    #[inline]
    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_ttl_secs)
    }

    /// Returns the rate limit window.
    #[inline]
    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Returns the lifetime of cached identities and role decisions.
    #[inline]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Loads the token signing keys, preferring secret files over inline secrets.
    pub async fn load_token_keys(&self) -> Result<TokenKeys> {
        match (
            &self.access_token_secret_file,
            &self.refresh_token_secret_file,
        ) {
            (Some(access), Some(refresh)) => TokenKeys::from_files(access, refresh).await,
            (None, None) => match (&self.access_token_secret, &self.refresh_token_secret) {
                (Some(access), Some(refresh)) => TokenKeys::new(access, refresh),
                _ => Err(Error::config(
                    "both access and refresh token secrets must be configured",
                )),
            },
            _ => Err(Error::config(
                "both access and refresh token secret files must be configured",
            )),
        }
    }

    /// Connects to the configured secondary storage backend.
    pub async fn connect_storage(&self) -> Result<SecondaryStorage> {
        match self.storage {
            StorageKind::Memory => Ok(SecondaryStorage::memory()),
            StorageKind::Nats => {
                let client = self.connect_nats().await?;
                let backend = NatsStorage::new(&client).await?;
                Ok(SecondaryStorage::new("nats", backend))
            }
        }
    }

    /// Connects to NATS server.
    pub async fn connect_nats(&self) -> Result<NatsClient> {
        NatsClient::connect(self.nats.clone())
            .await
            .map_err(|e| Error::external("nats", "failed to connect to nats").with_source(e))
    }
}

impl ServiceConfigBuilder {
    /// Wrapper for builder validation that returns String errors.
    fn validate(builder: &ServiceConfigBuilder) -> Result<(), String> {
        if let Some(ttl) = builder.access_token_ttl_secs
            && ttl == 0
        {
            return Err("Access token lifetime must be greater than 0".to_string());
        }

        if let Some(ttl) = builder.refresh_token_ttl_secs
            && ttl == 0
        {
            return Err("Refresh token lifetime must be greater than 0".to_string());
        }

        if let (Some(access), Some(refresh)) =
            (builder.access_token_ttl_secs, builder.refresh_token_ttl_secs)
            && refresh <= access
        {
            return Err("Refresh token must outlive the access token".to_string());
        }

        if let Some(window) = builder.rate_limit_window_secs
            && window == 0
        {
            return Err("Rate limit window must be at least 1 second".to_string());
        }

        if let Some(capacity) = builder.rate_limit_capacity
            && capacity == 0
        {
            return Err("Rate limit capacity must be greater than 0".to_string());
        }

        if let Some(Some(email)) = &builder.admin_email
            && !email.contains('@')
        {
            return Err("Admin email must be an email address".to_string());
        }

        Ok(())
    }
}
