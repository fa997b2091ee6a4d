//! Argon2id password hashes.

use std::sync::{Arc, OnceLock};

use argon2::password_hash::{Error as ArgonError, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier};
use rand::Rng;
use rand::rngs::OsRng;

use crate::TRACING_TARGET_AUTHENTICATION;
use crate::handler::{Error, ErrorKind, Result};

/// Hashes and checks account passwords.
///
/// Checks for unknown accounts run against a throwaway hash, so a login
/// with a wrong email costs as much as one with a wrong password.
#[derive(Debug, Clone, Default)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: Arc<OnceLock<String>>,
}

fn internal(context: &'static str) -> impl FnOnce(ArgonError) -> Error<'static> {
    move |error| {
        tracing::error!(
            target: TRACING_TARGET_AUTHENTICATION,
            error = %error,
            context,
            "argon2 failure"
        );

        ErrorKind::InternalServerError
            .with_context(context)
            .with_resource("authentication")
    }
}

impl PasswordHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the PHC string of `password` under a fresh salt.
    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::try_from_rng(&mut OsRng).map_err(|error| {
            tracing::error!(
                target: TRACING_TARGET_AUTHENTICATION,
                error = %error,
                "salt generation failed"
            );

            ErrorKind::InternalServerError
                .with_context("Salt generation error")
                .with_resource("authentication")
        })?;

        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(internal("Hash generation error"))?;

        Ok(hash.to_string())
    }

    /// Checks `password` against a stored hash.
    ///
    /// `None` stands for an unknown account: the check still runs and the
    /// answer is always `false`. A stored hash that cannot be parsed is an
    /// internal error, not a mismatch.
    pub fn matches(&self, password: &str, stored_hash: Option<&str>) -> Result<bool> {
        let (stored_hash, known) = match stored_hash {
            Some(hash) => (hash, true),
            None => (self.dummy_hash()?, false),
        };

        let parsed = PasswordHash::new(stored_hash).map_err(internal("Hash format error"))?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(known),
            Err(ArgonError::Password) => Ok(false),
            Err(error) => Err(internal("Verification error")(error)),
        }
    }

    fn dummy_hash(&self) -> Result<&str> {
        if let Some(hash) = self.dummy_hash.get() {
            return Ok(hash);
        }

        let len = rand::random_range(16..32);
        let mut rng = rand::rng();
        let password: String = (0..len)
            .map(|_| rng.sample(rand::distr::Alphanumeric) as char)
            .collect();

        let hash = self.hash(&password)?;
        Ok(self.dummy_hash.get_or_init(|| hash))
    }
}
