//! Application state and dependency injection.

mod cache;
mod config;
mod email;
mod repository;
pub(crate) mod security;
mod storage;

pub use crate::service::cache::TtlCache;
pub use crate::service::config::{ServiceConfig, ServiceConfigBuilder, StorageKind};
pub use crate::service::email::{
    EmailMessage, EmailProvider, EmailService, LogEmailProvider, MemoryEmailProvider,
};
pub use crate::service::repository::{
    MemoryUserStore, NewSession, NewUser, RESET_TOKEN_TTL, ROLE_ADMIN, ROLE_USER, Session,
    SessionRepository, User, UserRepository, UserStore, VerificationRepository,
};
pub use crate::service::security::{
    ACCESS_TOKEN_COOKIE, AuthCookies, DeviceInfo, INVALID_REFRESH_TOKEN, INVALID_TOKEN,
    INVALID_USER_REFRESH_TOKEN, Identity, MIN_SECRET_LENGTH, PasswordHasher, REFRESH_TOKEN_COOKIE,
    RateLimitKey, RateLimiter, RoleGate, RotatedTokens, TokenClaims, TokenIssuer, TokenKeys,
    TokenPair, TokenType, TokenVerifier, UserAgentParser,
};
pub use crate::service::storage::{MemoryStorage, NatsStorage, SecondaryStorage, StorageBackend};
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};

/// Tracing target for application state setup.
const TRACING_TARGET: &str = "treez_server::service";

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ServiceState {
    // External services:
    pub storage: SecondaryStorage,
    pub email: EmailService,

    // Repositories:
    pub users: UserRepository,
    pub sessions: SessionRepository,
    pub verifications: VerificationRepository,

    // Internal services:
    pub password_hasher: PasswordHasher,
    pub user_agent_parser: UserAgentParser,
    pub token_issuer: TokenIssuer,
    pub token_verifier: TokenVerifier,
    pub role_gate: RoleGate,
    pub rate_limiter: RateLimiter,
    pub auth_cookies: AuthCookies,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Loads the signing keys, connects the secondary storage and creates the
    /// bootstrap admin when one is configured. Users are kept in memory and
    /// email is logged instead of delivered.
    pub async fn from_config(config: &ServiceConfig) -> Result<Self> {
        let keys = config.load_token_keys().await?;
        let storage = config.connect_storage().await?;

        let state = Self::from_parts(
            config,
            keys,
            storage,
            UserRepository::default(),
            EmailService::default(),
        );

        state.bootstrap_admin(config).await?;
        Ok(state)
    }

    /// Assembles application state from already initialized parts.
    pub fn from_parts(
        config: &ServiceConfig,
        keys: TokenKeys,
        storage: SecondaryStorage,
        users: UserRepository,
        email: EmailService,
    ) -> Self {
        let sessions = SessionRepository::new(storage.clone());
        let verifications = VerificationRepository::new(storage.clone());

        let token_issuer = TokenIssuer::new(
            keys,
            config.access_token_ttl(),
            config.refresh_token_ttl(),
            sessions.clone(),
        );

        let token_verifier = TokenVerifier::new(
            token_issuer.clone(),
            users.clone(),
            TtlCache::new(config.cache_capacity, config.cache_ttl()),
        );

        let role_gate = RoleGate::new(TtlCache::new(config.cache_capacity, config.cache_ttl()));

        let rate_limiter = RateLimiter::new(
            config.rate_limit_requests,
            TtlCache::new(config.rate_limit_capacity, config.rate_limit_window()),
        );

        tracing::info!(
            target: TRACING_TARGET,
            storage = storage.backend(),
            production = config.production,
            "service state initialized"
        );

        Self {
            storage,
            email,

            users,
            sessions,
            verifications,

            password_hasher: PasswordHasher::new(),
            user_agent_parser: UserAgentParser::new(),
            token_issuer,
            token_verifier,
            role_gate,
            rate_limiter,
            auth_cookies: AuthCookies::new(config.production),
        }
    }

    /// Creates the configured admin user unless the email is already taken.
    ///
    /// Returns `true` when a user was created.
    pub async fn bootstrap_admin(&self, config: &ServiceConfig) -> Result<bool> {
        let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) else {
            return Ok(false);
        };

        if self.users.find_user_by_email(email).await?.is_some() {
            tracing::debug!(
                target: TRACING_TARGET,
                email = %email,
                "bootstrap admin already exists"
            );
            return Ok(false);
        }

        let password_hash = self
            .password_hasher
            .hash(password)
            .map_err(|e| Error::internal("argon2", format!("failed to hash admin password: {e}")))?;

        let name = email.split('@').next().unwrap_or("admin").to_owned();
        let user = self
            .users
            .create_user(NewUser::new(name, email.clone(), password_hash).with_role(ROLE_ADMIN))
            .await?;

        tracing::info!(
            target: TRACING_TARGET,
            user_id = %user.id,
            email = %user.email,
            "bootstrap admin created"
        );

        Ok(true)
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

// External services:
impl_di!(storage: SecondaryStorage);
impl_di!(email: EmailService);

// Repositories:
impl_di!(users: UserRepository);
impl_di!(sessions: SessionRepository);
impl_di!(verifications: VerificationRepository);

// Internal services:
impl_di!(password_hasher: PasswordHasher);
impl_di!(user_agent_parser: UserAgentParser);
impl_di!(token_issuer: TokenIssuer);
impl_di!(token_verifier: TokenVerifier);
impl_di!(role_gate: RoleGate);
impl_di!(rate_limiter: RateLimiter);
impl_di!(auth_cookies: AuthCookies);

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::service::security::token_keys::tests::{ACCESS_SECRET, REFRESH_SECRET};

    /// Returns a configuration with test secrets and in-memory storage.
    pub(crate) fn config() -> ServiceConfig {
        ServiceConfig::builder()
            .with_access_token_secret(ACCESS_SECRET)
            .with_refresh_token_secret(REFRESH_SECRET)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn state_from_config() -> anyhow::Result<()> {
        let state = ServiceState::from_config(&config()).await?;
        assert_eq!(state.storage.backend(), "memory");
        assert_eq!(state.rate_limiter.limit(), 100);
        assert!(!state.auth_cookies.is_secure());
        Ok(())
    }

    #[tokio::test]
    async fn bootstrap_admin_runs_once() -> anyhow::Result<()> {
        let mut config = config();
        config.admin_email = Some("root@example.com".into());
        config.admin_password = Some("Admin123".into());

        let state = ServiceState::from_config(&config).await?;
        let admin = state.users.find_user_by_email("root@example.com").await?.unwrap();
        assert_eq!(admin.role, ROLE_ADMIN);
        assert!(!state.bootstrap_admin(&config).await?);
        Ok(())
    }
}
