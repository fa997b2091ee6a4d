//! `access_token` / `refresh_token` cookie rendering.

use std::time::Duration;

use axum::http::header::SET_COOKIE;
use axum::http::{HeaderName, HeaderValue};
use axum::response::AppendHeaders;
use axum_extra::extract::cookie::{Cookie, SameSite};

use super::TokenPair;

/// Name of the cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Name of the cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token";

type SetCookies = AppendHeaders<Vec<(HeaderName, HeaderValue)>>;

/// Renders the `Set-Cookie` headers of the authentication cookies.
///
/// Cookies are `HttpOnly`, `SameSite=Strict` and scoped to `/`. They are
/// marked `Secure` in production. Values are percent-encoded, matching the
/// decoding done when credentials are read back.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AuthCookies {
    secure: bool,
}

impl AuthCookies {
    pub fn new(secure: bool) -> Self {
        Self { secure }
    }

    /// Returns `true` when cookies are marked `Secure`.
    #[inline]
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Headers setting both cookies, each living as long as its token.
    pub fn set(&self, tokens: &TokenPair) -> SetCookies {
        Self::headers([
            self.cookie(ACCESS_TOKEN_COOKIE, &tokens.access_token, tokens.access_ttl),
            self.cookie(REFRESH_TOKEN_COOKIE, &tokens.refresh_token, tokens.refresh_ttl),
        ])
    }

    /// Headers expiring both cookies.
    pub fn clear(&self) -> SetCookies {
        Self::headers([
            self.cookie(ACCESS_TOKEN_COOKIE, "", Duration::ZERO),
            self.cookie(REFRESH_TOKEN_COOKIE, "", Duration::ZERO),
        ])
    }

    fn cookie(&self, name: &'static str, value: &str, max_age: Duration) -> Cookie<'static> {
        let max_age = time::Duration::try_from(max_age).unwrap_or(time::Duration::MAX);

        Cookie::build((name, value.to_owned()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(self.secure)
            .max_age(max_age)
            .build()
    }

    fn headers(cookies: [Cookie<'static>; 2]) -> SetCookies {
        let headers = cookies
            .iter()
            // Encoded cookies only hold visible ASCII, so this never drops one.
            .filter_map(|cookie| HeaderValue::from_str(&cookie.encoded().to_string()).ok())
            .map(|value| (SET_COOKIE, value))
            .collect();

        AppendHeaders(headers)
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum_extra::extract::CookieJar;

    use super::*;

    fn tokens() -> TokenPair {
        TokenPair {
            access_token: "a.b.c".into(),
            refresh_token: "d.e.f".into(),
            access_ttl: Duration::from_secs(900),
            refresh_ttl: Duration::from_secs(604_800),
        }
    }

    fn set_cookies(response: &axum::response::Response) -> Vec<String> {
        response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn sets_both_cookies() {
        let response = AuthCookies::new(false).set(&tokens()).into_response();
        let cookies = set_cookies(&response);

        assert_eq!(cookies.len(), 2);
        assert!(cookies[0].starts_with("access_token=a.b.c;"));
        assert!(cookies[1].starts_with("refresh_token=d.e.f;"));
        for attribute in ["HttpOnly", "SameSite=Strict", "Path=/"] {
            assert!(cookies.iter().all(|c| c.contains(attribute)), "{attribute}");
        }
        assert!(cookies[0].contains("Max-Age=900"));
        assert!(cookies[1].contains("Max-Age=604800"));
        assert!(cookies.iter().all(|c| !c.contains("Secure")));
    }

    #[test]
    fn secure_in_production() {
        let response = AuthCookies::new(true).set(&tokens()).into_response();
        assert!(set_cookies(&response).iter().all(|c| c.contains("; Secure")));
    }

    #[test]
    fn clear_expires_both() {
        let response = AuthCookies::default().clear().into_response();
        let cookies = set_cookies(&response);

        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
        assert!(cookies[0].starts_with("access_token=;"));
    }

    #[test]
    fn values_are_escaped_and_read_back() -> anyhow::Result<()> {
        let tokens = TokenPair {
            access_token: "a; Domain=evil.example".into(),
            ..tokens()
        };
        let response = AuthCookies::new(false).set(&tokens).into_response();
        let access = &set_cookies(&response)[0];
        assert!(!access.contains("; Domain"), "{access}");

        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_str(access.split(';').next().unwrap_or_default())?);
        let jar = CookieJar::from_headers(&headers);
        assert_eq!(
            jar.get(ACCESS_TOKEN_COOKIE).map(|c| c.value().to_owned()).as_deref(),
            Some("a; Domain=evil.example")
        );
        Ok(())
    }
}
