//! Access and refresh token issuing.

use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use jsonwebtoken::{Algorithm, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{TokenKeys, TokenType};
use crate::handler::{Error as HttpError, ErrorKind};
use crate::service::{DeviceInfo, NewSession, SessionRepository, User};
use crate::{Error, Result, TRACING_TARGET_AUTHENTICATION};

/// Claims carried by both token types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id.
    pub sub: Uuid,
    pub email: String,
    pub role: String,
    /// Issued at, in seconds since the epoch.
    pub iat: i64,
    /// Expires at, in seconds since the epoch.
    pub exp: i64,
    /// Unique token id, so two tokens issued in the same second differ.
    pub jti: Uuid,
    pub typ: TokenType,
}

impl TokenClaims {
    /// Creates claims for `user` living `ttl` from now.
    pub fn new(user: &User, typ: TokenType, ttl: Duration) -> Self {
        let iat = Timestamp::now().as_second();
        let ttl = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
        Self {
            sub: user.id,
            email: user.email.clone(),
            role: user.role.clone(),
            iat,
            exp: iat.saturating_add(ttl),
            jti: Uuid::new_v4(),
            typ,
        }
    }

    /// Returns the expiry as a timestamp.
    pub fn expires_at(&self) -> Timestamp {
        Timestamp::from_second(self.exp).unwrap_or(Timestamp::MAX)
    }

    /// Returns the time left before expiry, zero once expired.
    pub fn remaining(&self) -> Duration {
        let remaining = self.expires_at().duration_since(Timestamp::now());
        Duration::try_from(remaining.max(SignedDuration::ZERO)).unwrap_or_default()
    }
}

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(skip)]
    pub access_ttl: Duration,
    #[serde(skip)]
    pub refresh_ttl: Duration,
}

/// Signs tokens and records refresh tokens as sessions.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: TokenKeys,
    access_ttl: Duration,
    refresh_ttl: Duration,
    sessions: SessionRepository,
}

impl TokenIssuer {
    pub fn new(
        keys: TokenKeys,
        access_ttl: Duration,
        refresh_ttl: Duration,
        sessions: SessionRepository,
    ) -> Self {
        Self {
            keys,
            access_ttl,
            refresh_ttl,
            sessions,
        }
    }

    /// Returns the lifetime of access tokens.
    #[inline]
    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Returns the lifetime of refresh tokens.
    #[inline]
    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Returns the session repository the issuer writes to.
    #[inline]
    pub fn sessions(&self) -> &SessionRepository {
        &self.sessions
    }

    /// Signs `claims` with the key of their token type.
    pub fn encode(&self, claims: &TokenClaims) -> Result<String> {
        encode(
            &Header::new(Algorithm::HS256),
            claims,
            self.keys.encoding_key(claims.typ),
        )
        .map_err(|e| Error::internal("jwt", "failed to sign token").with_source(e))
    }

    /// Verifies a token of `typ` and returns its claims.
    ///
    /// An expired token yields [`ErrorKind::ExpiredAuthToken`]; any other
    /// failure, a token of the wrong type included, yields
    /// [`ErrorKind::MalformedAuthToken`].
    pub fn decode(&self, token: &str, typ: TokenType) -> Result<TokenClaims, HttpError<'static>> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        let claims = decode::<TokenClaims>(token, self.keys.decoding_key(typ), &validation)
            .map(|data| data.claims)
            .map_err(HttpError::from)?;

        if claims.typ != typ {
            return Err(ErrorKind::MalformedAuthToken
                .with_context(format!("expected {typ} token, got {}", claims.typ)));
        }

        Ok(claims)
    }

    /// Signs a new pair for `user` without recording a session.
    pub fn sign_pair(&self, user: &User) -> Result<(TokenPair, TokenClaims)> {
        let access = TokenClaims::new(user, TokenType::Access, self.access_ttl);
        let refresh = TokenClaims::new(user, TokenType::Refresh, self.refresh_ttl);

        let pair = TokenPair {
            access_token: self.encode(&access)?,
            refresh_token: self.encode(&refresh)?,
            access_ttl: self.access_ttl,
            refresh_ttl: self.refresh_ttl,
        };

        Ok((pair, refresh))
    }

    /// Issues a pair for `user` and records the refresh token as a session.
    #[tracing::instrument(skip_all, target = TRACING_TARGET_AUTHENTICATION, fields(user_id = %user.id))]
    pub async fn issue(
        &self,
        user: &User,
        device: DeviceInfo,
        user_agent: Option<String>,
    ) -> Result<TokenPair> {
        let (pair, refresh) = self.sign_pair(user)?;

        self.sessions
            .create_session(NewSession {
                token: pair.refresh_token.clone(),
                user_id: user.id,
                device,
                user_agent,
                expires_at: refresh.expires_at(),
            })
            .await?;

        tracing::debug!(
            target: TRACING_TARGET_AUTHENTICATION,
            user_id = %user.id,
            "token pair issued"
        );

        Ok(pair)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::service::security::token_keys::tests::{ACCESS_SECRET, REFRESH_SECRET};
    use crate::service::{ROLE_USER, SecondaryStorage};

    pub(crate) fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            TokenKeys::new(ACCESS_SECRET, REFRESH_SECRET).unwrap(),
            Duration::from_secs(15 * 60),
            Duration::from_secs(7 * 24 * 60 * 60),
            SessionRepository::new(SecondaryStorage::memory()),
        )
    }

    pub(crate) fn user() -> User {
        let now = Timestamp::now();
        User {
            id: Uuid::now_v7(),
            name: "Jane".into(),
            email: "jane@example.com".into(),
            email_verified: true,
            password_hash: String::new(),
            role: ROLE_USER.into(),
            banned: false,
            two_factor_enabled: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn access_round_trip() -> anyhow::Result<()> {
        let issuer = issuer();
        let user = user();
        let (pair, _) = issuer.sign_pair(&user)?;

        let claims = issuer.decode(&pair.access_token, TokenType::Access)?;
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, ROLE_USER);
        assert_eq!(claims.typ, TokenType::Access);
        Ok(())
    }

    #[test]
    fn refresh_token_is_not_an_access_token() -> anyhow::Result<()> {
        let issuer = issuer();
        let (pair, _) = issuer.sign_pair(&user())?;

        let error = issuer
            .decode(&pair.refresh_token, TokenType::Access)
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedAuthToken);
        Ok(())
    }

    #[test]
    fn expired_token_is_reported_as_expired() -> anyhow::Result<()> {
        let issuer = issuer();
        let mut claims = TokenClaims::new(&user(), TokenType::Access, Duration::ZERO);
        claims.iat -= 120;
        claims.exp -= 60;
        let token = issuer.encode(&claims)?;

        let error = issuer.decode(&token, TokenType::Access).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ExpiredAuthToken);
        Ok(())
    }

    #[test]
    fn tampered_token_is_malformed() -> anyhow::Result<()> {
        let issuer = issuer();
        let (pair, _) = issuer.sign_pair(&user())?;
        let tampered = format!("{}x", pair.access_token);

        let error = issuer.decode(&tampered, TokenType::Access).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::MalformedAuthToken);
        assert_eq!(
            issuer.decode("garbage", TokenType::Access).unwrap_err().kind(),
            ErrorKind::MalformedAuthToken
        );
        Ok(())
    }

    #[tokio::test]
    async fn issue_records_session() -> anyhow::Result<()> {
        let issuer = issuer();
        let user = user();
        let device = crate::service::UserAgentParser::new().device_info("curl/8.0", None);

        let pair = issuer.issue(&user, device, Some("curl/8.0".into())).await?;
        let session = issuer
            .sessions()
            .find_session_by_token(&pair.refresh_token)
            .await?;
        assert_eq!(session.map(|s| s.user_id), Some(user.id));
        Ok(())
    }
}
