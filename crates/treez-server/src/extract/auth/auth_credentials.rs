use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use crate::service::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE};

/// Tokens presented by the client.
///
/// The access token is read from the `access_token` cookie, falling back to
/// an `Authorization: Bearer` header. The refresh token only comes from the
/// `refresh_token` cookie. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthCredentials {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl AuthCredentials {
    /// Reads the credentials from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let jar = CookieJar::from_headers(headers);
        let cookie = |name: &str| {
            jar.get(name)
                .map(|c| c.value().trim().to_owned())
                .filter(|v| !v.is_empty())
        };

        Self {
            access_token: cookie(ACCESS_TOKEN_COOKIE).or_else(|| bearer_token(headers)),
            refresh_token: cookie(REFRESH_TOKEN_COOKIE),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_owned())
}

impl<S> FromRequestParts<S> for AuthCredentials
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}
