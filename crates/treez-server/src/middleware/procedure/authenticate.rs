//! The `authenticate` stage.
//!
//! Per-request states:
//!
//! - access token valid: authenticated
//! - access token expired or absent, refresh token valid: session rotated,
//!   new cookies set, authenticated
//! - access token expired or absent, refresh token absent or invalid:
//!   rejected, both cookies cleared
//! - access token forged or malformed: rejected, no refresh attempted

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::TRACING_TARGET_AUTHENTICATION;
use crate::extract::AuthCredentials;
use crate::handler::{Error, ErrorKind};
use crate::service::{AuthCookies, Identity, ServiceState, TokenPair};

/// A successful `authenticate` stage.
#[derive(Debug, Clone)]
pub struct Authenticated {
    pub identity: Identity,
    /// Tokens issued when the session was rotated on the way.
    pub rotated: Option<TokenPair>,
}

/// A failed `authenticate` stage.
#[derive(Debug, Clone)]
pub struct AuthRejection {
    pub error: Error<'static>,
    /// Whether both authentication cookies are expired with the answer.
    pub clear_cookies: bool,
}

impl AuthRejection {
    fn keep(error: Error<'static>) -> Self {
        Self {
            error,
            clear_cookies: false,
        }
    }

    fn clear(error: Error<'static>) -> Self {
        Self {
            error,
            clear_cookies: true,
        }
    }

    /// Renders the rejection, expiring the cookies when needed.
    pub fn render(self, cookies: &AuthCookies) -> Response {
        if self.clear_cookies {
            (cookies.clear(), self.error).into_response()
        } else {
            self.error.into_response()
        }
    }
}

/// Authenticates the credentials found in `headers`.
pub async fn authenticate(
    state: &ServiceState,
    headers: &HeaderMap,
) -> Result<Authenticated, AuthRejection> {
    let credentials = AuthCredentials::from_headers(headers);

    let access_expired = match credentials.access_token.as_deref() {
        Some(access_token) => match state.token_verifier.verify(access_token).await {
            Ok(identity) => {
                return Ok(Authenticated {
                    identity,
                    rotated: None,
                });
            }
            Err(error) if error.kind() == ErrorKind::ExpiredAuthToken => true,
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET_AUTHENTICATION,
                    error = %error,
                    "access token rejected"
                );
                return Err(AuthRejection::keep(error));
            }
        },
        None => false,
    };

    let Some(refresh_token) = credentials.refresh_token else {
        let kind = if access_expired {
            ErrorKind::ExpiredAuthToken
        } else {
            ErrorKind::MissingAuthToken
        };

        return Err(AuthRejection::clear(kind.with_context("no refresh token presented")));
    };

    match state.token_verifier.rotate(&refresh_token).await {
        Ok(rotated) => {
            tracing::debug!(
                target: TRACING_TARGET_AUTHENTICATION,
                user_id = %rotated.identity.id,
                access_expired,
                "session rotated during authentication"
            );

            Ok(Authenticated {
                identity: rotated.identity,
                rotated: Some(rotated.tokens),
            })
        }
        Err(error) => {
            tracing::warn!(
                target: TRACING_TARGET_AUTHENTICATION,
                error = %error,
                "session rotation failed"
            );
            Err(AuthRejection::clear(error))
        }
    }
}
