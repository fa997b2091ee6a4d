//! Access token verification and refresh token rotation.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TokenClaims, TokenIssuer, TokenPair, TokenType};
use crate::TRACING_TARGET_AUTHENTICATION;
use crate::handler::{ErrorKind, Result};
use crate::service::{TtlCache, User, UserRepository};

/// Message of a rejected access token.
pub const INVALID_TOKEN: &str = "Invalid token";

/// Message of a refresh token that is invalid, expired or already used.
pub const INVALID_REFRESH_TOKEN: &str = "Invalid refresh token";

/// Message of a refresh token whose user no longer qualifies.
pub const INVALID_USER_REFRESH_TOKEN: &str = "Invalid user refresh token";

/// The resolved user behind a verified credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl Identity {
    /// Returns `true` when the identity holds `role`, ignoring case.
    #[inline]
    pub fn has_role(&self, role: &str) -> bool {
        self.role.eq_ignore_ascii_case(role)
    }
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
        }
    }
}

/// Outcome of a successful refresh token rotation.
#[derive(Debug, Clone)]
pub struct RotatedTokens {
    pub tokens: TokenPair,
    pub identity: Identity,
}

/// Verifies access tokens and rotates refresh tokens.
///
/// Verified access tokens are cached by their raw value. An entry never
/// outlives the token it was built from.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    issuer: TokenIssuer,
    users: UserRepository,
    cache: TtlCache<String, Identity>,
}

impl TokenVerifier {
    pub fn new(issuer: TokenIssuer, users: UserRepository, cache: TtlCache<String, Identity>) -> Self {
        Self {
            issuer,
            users,
            cache,
        }
    }

    /// Returns the issuer used for rotations.
    #[inline]
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Verifies an access token and resolves its identity.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::ExpiredAuthToken`] for an expired token
    /// - [`ErrorKind::MalformedAuthToken`] for a forged or malformed token
    /// - [`ErrorKind::Unauthorized`] when the user is gone, banned or no
    ///   longer holds the role embedded in the token
    pub async fn verify(&self, access_token: &str) -> Result<Identity> {
        if let Some(identity) = self.cache.get(&access_token.to_owned()) {
            return Ok(identity);
        }

        let claims = self.issuer.decode(access_token, TokenType::Access)?;
        let user = self.users.find_user_by_id(claims.sub).await?;
        let identity = Self::check_user(&claims, user.as_ref())?;

        let ttl = claims.remaining().min(self.cache.ttl());
        if ttl > Duration::ZERO {
            self.cache
                .insert_with_ttl(access_token.to_owned(), identity.clone(), Some(ttl));
        }

        Ok(identity)
    }

    fn check_user(claims: &TokenClaims, user: Option<&User>) -> Result<Identity> {
        let Some(user) = user else {
            return Err(ErrorKind::Unauthorized
                .with_message(INVALID_TOKEN)
                .with_context(format!("user {} not found", claims.sub)));
        };

        if user.banned {
            return Err(ErrorKind::Unauthorized
                .with_message(INVALID_TOKEN)
                .with_context(format!("user {} is banned", user.id)));
        }

        if !user.role.eq_ignore_ascii_case(&claims.role) {
            tracing::warn!(
                target: TRACING_TARGET_AUTHENTICATION,
                user_id = %user.id,
                token_role = %claims.role,
                user_role = %user.role,
                "token role does not match user role"
            );

            return Err(ErrorKind::Unauthorized
                .with_message(INVALID_TOKEN)
                .with_context("token role does not match user role"));
        }

        Ok(Identity::from(user))
    }

    /// Drops a cached access token, used on logout.
    pub fn evict(&self, access_token: &str) {
        self.cache.remove(&access_token.to_owned());
    }

    /// Exchanges a refresh token for a new pair.
    ///
    /// The old session is deleted before anything is issued. Of several
    /// callers racing with one token only the caller whose delete removed the
    /// session proceeds; the others fail with [`INVALID_REFRESH_TOKEN`]. The
    /// new session keeps the device metadata of the one it replaces.
    #[tracing::instrument(skip_all, target = TRACING_TARGET_AUTHENTICATION)]
    pub async fn rotate(&self, refresh_token: &str) -> Result<RotatedTokens> {
        let claims = self
            .issuer
            .decode(refresh_token, TokenType::Refresh)
            .map_err(|e| {
                ErrorKind::Unauthorized
                    .with_message(INVALID_REFRESH_TOKEN)
                    .with_context(format!("refresh token rejected: {}", e.kind()))
            })?;

        let Some(session) = self.issuer.sessions().delete_session(refresh_token).await? else {
            return Err(ErrorKind::Unauthorized
                .with_message(INVALID_REFRESH_TOKEN)
                .with_context("refresh session not found or already rotated"));
        };

        let user = self
            .users
            .find_user_by_id(claims.sub)
            .await?
            .filter(|user| user.id == session.user_id && !user.banned)
            .ok_or_else(|| {
                ErrorKind::Unauthorized
                    .with_message(INVALID_USER_REFRESH_TOKEN)
                    .with_context(format!("user {} cannot refresh", claims.sub))
            })?;

        let tokens = self
            .issuer
            .issue(&user, session.device, session.user_agent)
            .await?;

        tracing::info!(
            target: TRACING_TARGET_AUTHENTICATION,
            user_id = %user.id,
            "refresh token rotated"
        );

        Ok(RotatedTokens {
            tokens,
            identity: Identity::from(&user),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::service::security::token_issuer::tests::issuer;
    use crate::service::{MemoryUserStore, NewUser, ROLE_ADMIN, UserAgentParser, UserStore};

    /// Counts lookups by id on top of an in-memory store.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryUserStore,
        lookups: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl UserStore for CountingStore {
        async fn find_user_by_id(&self, id: Uuid) -> crate::Result<Option<User>> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            self.inner.find_user_by_id(id).await
        }

        async fn find_user_by_email(&self, email: &str) -> crate::Result<Option<User>> {
            self.inner.find_user_by_email(email).await
        }

        async fn create_user(&self, user: NewUser) -> crate::Result<User> {
            self.inner.create_user(user).await
        }

        async fn update_password(&self, id: Uuid, password_hash: String) -> crate::Result<bool> {
            self.inner.update_password(id, password_hash).await
        }

        async fn update_role(&self, id: Uuid, role: String) -> crate::Result<bool> {
            self.inner.update_role(id, role).await
        }

        async fn set_banned(&self, id: Uuid, banned: bool) -> crate::Result<bool> {
            self.inner.set_banned(id, banned).await
        }
    }

    async fn setup() -> anyhow::Result<(TokenVerifier, UserRepository, User, Arc<AtomicUsize>)> {
        let store = CountingStore::default();
        let lookups = Arc::clone(&store.lookups);
        let users = UserRepository::new(store);
        let user = users
            .create_user(NewUser::new("Jane", "jane@example.com", "hash"))
            .await?;

        let verifier = TokenVerifier::new(
            issuer(),
            users.clone(),
            TtlCache::new(100, Duration::from_secs(60)),
        );
        Ok((verifier, users, user, lookups))
    }

    fn device() -> crate::service::DeviceInfo {
        UserAgentParser::new().device_info("curl/8.0", Some("127.0.0.1".into()))
    }

    #[tokio::test]
    async fn verify_returns_issued_identity() -> anyhow::Result<()> {
        let (verifier, _, user, _) = setup().await?;
        let pair = verifier.issuer().issue(&user, device(), None).await?;

        let identity = verifier.verify(&pair.access_token).await?;
        assert_eq!(identity.id, user.id);
        assert_eq!(identity.role, user.role);
        Ok(())
    }

    #[tokio::test]
    async fn cached_verification_skips_lookup() -> anyhow::Result<()> {
        let (verifier, _, user, lookups) = setup().await?;
        let (pair, _) = verifier.issuer().sign_pair(&user)?;

        verifier.verify(&pair.access_token).await?;
        verifier.verify(&pair.access_token).await?;
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn role_change_rejects_token() -> anyhow::Result<()> {
        let (verifier, users, user, _) = setup().await?;
        let (pair, _) = verifier.issuer().sign_pair(&user)?;
        users.update_role(user.id, ROLE_ADMIN).await?;

        let error = verifier.verify(&pair.access_token).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
        Ok(())
    }

    #[tokio::test]
    async fn banned_user_is_rejected() -> anyhow::Result<()> {
        let (verifier, users, user, _) = setup().await?;
        let (pair, _) = verifier.issuer().sign_pair(&user)?;
        users.set_banned(user.id, true).await?;

        assert!(verifier.verify(&pair.access_token).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn rotation_replaces_session() -> anyhow::Result<()> {
        let (verifier, _, user, _) = setup().await?;
        let original = device();
        let pair = verifier.issuer().issue(&user, original.clone(), None).await?;

        let rotated = verifier.rotate(&pair.refresh_token).await?;
        assert_ne!(rotated.tokens.refresh_token, pair.refresh_token);
        assert_eq!(rotated.identity.id, user.id);

        let sessions = verifier.issuer().sessions();
        assert!(sessions.find_session_by_token(&pair.refresh_token).await?.is_none());
        let session = sessions
            .find_session_by_token(&rotated.tokens.refresh_token)
            .await?
            .unwrap();
        assert_eq!(session.device, original);
        Ok(())
    }

    #[tokio::test]
    async fn racing_rotations_succeed_once() -> anyhow::Result<()> {
        let (verifier, _, user, _) = setup().await?;
        let pair = verifier.issuer().issue(&user, device(), None).await?;

        let attempts = futures::future::join_all(
            (0..8).map(|_| verifier.rotate(&pair.refresh_token)),
        )
        .await;

        let (succeeded, failed): (Vec<_>, Vec<_>) = attempts.into_iter().partition(|attempt| attempt.is_ok());
        assert_eq!(succeeded.len(), 1);
        for attempt in failed {
            let error = attempt.unwrap_err();
            assert_eq!(error.kind(), ErrorKind::Unauthorized);
            assert_eq!(error.message(), Some(INVALID_REFRESH_TOKEN));
        }
        Ok(())
    }

    #[tokio::test]
    async fn rotation_of_banned_user_fails() -> anyhow::Result<()> {
        let (verifier, users, user, _) = setup().await?;
        let pair = verifier.issuer().issue(&user, device(), None).await?;
        users.set_banned(user.id, true).await?;

        let error = verifier.rotate(&pair.refresh_token).await.unwrap_err();
        assert_eq!(error.message(), Some(INVALID_USER_REFRESH_TOKEN));
        Ok(())
    }

    #[tokio::test]
    async fn access_token_cannot_rotate() -> anyhow::Result<()> {
        let (verifier, _, user, _) = setup().await?;
        let pair = verifier.issuer().issue(&user, device(), None).await?;

        let error = verifier.rotate(&pair.access_token).await.unwrap_err();
        assert_eq!(error.message(), Some(INVALID_REFRESH_TOKEN));
        Ok(())
    }
}
