//! Client address and user agent of a request.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::{Extensions, HeaderMap};

/// Proxy header listing the client first.
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Proxy header carrying the client address.
const X_REAL_IP: &str = "x-real-ip";

/// Client address and user agent, as recorded on a session.
///
/// The address is the first entry of `x-forwarded-for`, then `x-real-ip`,
/// then the peer address of the connection when the server was started with
/// connect info. The headers are client controlled: use [`peer_ip`] for
/// anything that must not be spoofed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    /// Resolves the client from request headers and extensions.
    pub fn resolve(headers: &HeaderMap, extensions: &Extensions) -> Self {
        Self {
            ip: client_ip(headers, extensions),
            user_agent: headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned),
        }
    }
}

/// Resolves the reported client address of a request.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header(X_FORWARDED_FOR)
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| header(X_REAL_IP).and_then(|v| v.trim().parse().ok()))
        .or_else(|| peer_ip(extensions))
}

/// Address of the connected peer, ignoring proxy headers.
///
/// `None` unless the server was started with connect info.
pub fn peer_ip(extensions: &Extensions) -> Option<IpAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::resolve(&parts.headers, &parts.extensions))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn forwarded_for_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.2"));

        let ip = client_ip(&headers, &Extensions::new());
        assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn real_ip_then_connection() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static("198.51.100.2"));
        assert_eq!(
            client_ip(&headers, &Extensions::new()),
            Some("198.51.100.2".parse().unwrap())
        );

        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        assert_eq!(
            client_ip(&HeaderMap::new(), &extensions),
            Some("127.0.0.1".parse().unwrap())
        );
    }

    #[test]
    fn peer_ip_ignores_headers() {
        let mut extensions = Extensions::new();
        assert_eq!(peer_ip(&extensions), None);

        extensions.insert(ConnectInfo(SocketAddr::from(([192, 0, 2, 9], 4000))));
        assert_eq!(peer_ip(&extensions), Some("192.0.2.9".parse().unwrap()));
    }

    #[test]
    fn unknown_without_sources() {
        assert_eq!(client_ip(&HeaderMap::new(), &Extensions::new()), None);
    }
}
