//! Single-use password reset tokens.

use std::time::Duration;

use rand::RngCore;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::Result;
use crate::service::SecondaryStorage;

const RESET_PASSWORD_PREFIX: &str = "reset-password.";

/// Lifetime of a password reset token.
pub const RESET_TOKEN_TTL: Duration = Duration::from_secs(60 * 60);

/// Password reset tokens over [`SecondaryStorage`].
#[derive(Debug, Clone)]
pub struct VerificationRepository {
    storage: SecondaryStorage,
}

impl VerificationRepository {
    pub fn new(storage: SecondaryStorage) -> Self {
        Self { storage }
    }

    fn key(token: &str) -> String {
        format!(
            "{RESET_PASSWORD_PREFIX}{}",
            hex::encode(Sha256::digest(token.as_bytes()))
        )
    }

    /// Creates a reset token for `user_id`, valid for [`RESET_TOKEN_TTL`].
    pub async fn create_reset_token(&self, user_id: Uuid) -> Result<String> {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.storage
            .set(&Self::key(&token), user_id.to_string(), Some(RESET_TOKEN_TTL))
            .await?;
        Ok(token)
    }

    /// Consumes a reset token and returns its user.
    ///
    /// A token is accepted once; concurrent or later uses get `None`.
    pub async fn consume_reset_token(&self, token: &str) -> Result<Option<Uuid>> {
        let key = Self::key(token);
        let Some(user_id) = self.storage.get(&key).await? else {
            return Ok(None);
        };

        if !self.storage.delete(&key).await? {
            return Ok(None);
        }

        Ok(user_id.parse().ok())
    }
}
