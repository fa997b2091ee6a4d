//! HMAC signing keys for access and refresh tokens.
//!
//! Access and refresh tokens are signed with two distinct secrets, so a
//! refresh token can never pass as an access token and the other way round.
//! Every check here runs once at startup; a failure is fatal.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::{Error, Result, TRACING_TARGET_AUTHENTICATION};

/// Minimum secret length in bytes for HS256.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Which of the two key pairs a token uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(strum::Display, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// A single encoding/decoding pair.
struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// Signing keys for both token types.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct TokenKeys {
    inner: Arc<TokenKeysInner>,
}

struct TokenKeysInner {
    access: KeyPair,
    refresh: KeyPair,
}

impl TokenKeys {
    /// Creates keys from two secrets and checks they are usable.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when a secret is shorter than
    /// [`MIN_SECRET_LENGTH`], when both secrets are identical or when a
    /// sign/verify round trip fails.
    pub fn new(access_secret: impl AsRef<[u8]>, refresh_secret: impl AsRef<[u8]>) -> Result<Self> {
        let access_secret = access_secret.as_ref();
        let refresh_secret = refresh_secret.as_ref();

        Self::validate_secret("access", access_secret)?;
        Self::validate_secret("refresh", refresh_secret)?;

        if access_secret == refresh_secret {
            return Err(Error::config(
                "access and refresh token secrets must differ",
            ));
        }

        let keys = Self {
            inner: Arc::new(TokenKeysInner {
                access: KeyPair::from_secret(access_secret),
                refresh: KeyPair::from_secret(refresh_secret),
            }),
        };

        keys.validate_keys()?;

        tracing::info!(
            target: TRACING_TARGET_AUTHENTICATION,
            "token signing keys loaded"
        );

        Ok(keys)
    }

    /// Reads both secrets from files, trimming surrounding whitespace.
    pub async fn from_files(
        access_secret_path: impl AsRef<Path>,
        refresh_secret_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let access_secret = Self::read_secret(access_secret_path.as_ref()).await?;
        let refresh_secret = Self::read_secret(refresh_secret_path.as_ref()).await?;
        Self::new(access_secret, refresh_secret)
    }

    /// Returns the key used to sign tokens of `token_type`.
    #[inline]
    pub fn encoding_key(&self, token_type: TokenType) -> &EncodingKey {
        &self.pair(token_type).encoding
    }

    /// Returns the key used to verify tokens of `token_type`.
    #[inline]
    pub fn decoding_key(&self, token_type: TokenType) -> &DecodingKey {
        &self.pair(token_type).decoding
    }

    fn pair(&self, token_type: TokenType) -> &KeyPair {
        match token_type {
            TokenType::Access => &self.inner.access,
            TokenType::Refresh => &self.inner.refresh,
        }
    }

    fn validate_secret(name: &str, secret: &[u8]) -> Result<()> {
        if secret.is_empty() {
            return Err(Error::config(format!("{name} token secret is empty")));
        }

        if secret.len() < MIN_SECRET_LENGTH {
            return Err(Error::config(format!(
                "{name} token secret must be at least {MIN_SECRET_LENGTH} bytes"
            )));
        }

        Ok(())
    }

    /// Signs a sample claim set with each key and checks that only its own key verifies it.
    fn validate_keys(&self) -> Result<()> {
        #[derive(Serialize, Deserialize)]
        struct SelfCheck {
            sub: String,
            exp: i64,
        }

        let sample = SelfCheck {
            sub: "self-check".to_owned(),
            exp: jiff::Timestamp::now().as_second() + 300,
        };

        let header = Header::new(Algorithm::HS256);
        let validation = Validation::new(Algorithm::HS256);

        for (token_type, other) in [
            (TokenType::Access, TokenType::Refresh),
            (TokenType::Refresh, TokenType::Access),
        ] {
            let token = encode(&header, &sample, self.encoding_key(token_type)).map_err(|e| {
                Error::config(format!("{token_type} key failed to sign")).with_source(e)
            })?;

            decode::<SelfCheck>(&token, self.decoding_key(token_type), &validation).map_err(|e| {
                Error::config(format!("{token_type} key failed to verify")).with_source(e)
            })?;

            if decode::<SelfCheck>(&token, self.decoding_key(other), &validation).is_ok() {
                return Err(Error::config(format!(
                    "{other} key accepted a {token_type} token"
                )));
            }
        }

        Ok(())
    }

    async fn read_secret(path: &Path) -> Result<String> {
        tracing::debug!(
            target: TRACING_TARGET_AUTHENTICATION,
            path = %path.display(),
            "loading token secret from file",
        );

        let secret = tokio::fs::read_to_string(path).await.map_err(|e| {
            tracing::error!(
                target: TRACING_TARGET_AUTHENTICATION,
                path = %path.display(),
                error = %e,
                "failed to read token secret file",
            );
            Error::config(format!("cannot read token secret file {}", path.display()))
                .with_source(e)
        })?;

        Ok(secret.trim().to_owned())
    }
}

impl fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenKeys").finish_non_exhaustive()
    }
}
