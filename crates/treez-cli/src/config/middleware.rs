//! CORS and recovery settings.
//!
//! ```bash
//! treez --cors-origins "https://app.example.com" --request-timeout 60
//! ```

use anyhow::ensure;
use clap::Args;
use serde::{Deserialize, Serialize};
use treez_server::middleware::{CorsConfig, RecoveryConfig};

use crate::TRACING_TARGET_CONFIG;

/// Longest accepted request timeout, in seconds.
const MAX_REQUEST_TIMEOUT: u64 = 300;

#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    #[clap(flatten)]
    pub cors: CorsConfig,

    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl MiddlewareConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (1..=MAX_REQUEST_TIMEOUT).contains(&self.recovery.request_timeout),
            "request timeout must be 1-{MAX_REQUEST_TIMEOUT} seconds, got {}",
            self.recovery.request_timeout
        );

        // Browsers refuse credentialed responses for a wildcard origin.
        ensure!(
            !(self.cors.allow_credentials
                && self.cors.allowed_origins.iter().any(|origin| origin.trim() == "*")),
            "CORS origin \"*\" cannot be combined with credentials"
        );
        Ok(())
    }

    pub fn log(&self) {
        let origins = if self.cors.allowed_origins.is_empty() {
            "localhost (development)".to_owned()
        } else {
            self.cors.allowed_origins.join(",")
        };

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            cors_origins = %origins,
            cors_credentials = self.cors.allow_credentials,
            request_timeout_secs = self.recovery.request_timeout,
            "Middleware configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MiddlewareConfig {
        MiddlewareConfig {
            cors: CorsConfig::default(),
            recovery: RecoveryConfig::default(),
        }
    }

    #[test]
    fn defaults_are_valid() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_wildcard_with_credentials() {
        let mut config = config();
        config.cors.allowed_origins = vec!["*".into()];
        assert!(config.validate().is_err());

        config.cors.allow_credentials = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = config();
        config.recovery = RecoveryConfig::with_timeout_secs(0);
        assert!(config.validate().is_err());
    }
}
