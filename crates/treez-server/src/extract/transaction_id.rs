//! Per-request transaction identifiers.

use std::convert::Infallible;
use std::fmt;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use rand::Rng;
use tower_http::request_id::{MakeRequestId, RequestId};

/// Header carrying the transaction id on requests and responses.
pub const TRANSACTION_ID_HEADER: HeaderName = HeaderName::from_static("x-transaction-id");

/// Prefix of generated transaction ids.
const TRANSACTION_ID_PREFIX: &str = "TREEZ";

/// Number of random characters after the prefix.
const TRANSACTION_ID_RANDOM_LENGTH: usize = 10;

const TRANSACTION_ID_CHARSET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Transaction id of the current request.
///
/// Taken from the `x-transaction-id` header, which is either supplied by the
/// client or set by [`MakeTransactionId`] before the request reaches any
/// route.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TransactionId(pub String);

impl TransactionId {
    /// Generates `TREEZ` followed by 10 characters of `[0-9A-Z]` and the
    /// current epoch milliseconds.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let random: String = (0..TRANSACTION_ID_RANDOM_LENGTH)
            .map(|_| {
                let index = rng.random_range(0..TRANSACTION_ID_CHARSET.len());
                char::from(TRANSACTION_ID_CHARSET[index])
            })
            .collect();

        let millis = jiff::Timestamp::now().as_millisecond();
        Self(format!("{TRANSACTION_ID_PREFIX}{random}{millis}"))
    }

    /// Reads the transaction id from request headers.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(TRANSACTION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|v| Self(v.to_owned()))
            .unwrap_or_default()
    }

    /// Drops a client supplied id that is empty or not valid UTF-8, so a
    /// fresh one is generated in its place. Returns `true` when one was
    /// dropped.
    pub fn discard_unreadable(headers: &mut HeaderMap) -> bool {
        let unreadable = headers
            .get(TRANSACTION_ID_HEADER)
            .is_some_and(|v| !v.to_str().is_ok_and(|v| !v.trim().is_empty()));

        if unreadable {
            headers.remove(TRANSACTION_ID_HEADER);
        }
        unreadable
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<S> FromRequestParts<S> for TransactionId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// [`MakeRequestId`] generating [`TransactionId`]s.
///
/// `SetRequestIdLayer` keeps a transaction id supplied by the client and only
/// asks for a new one when the header is missing.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeTransactionId;

impl MakeRequestId for MakeTransactionId {
    fn make_request_id<B>(&mut self, _: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(TransactionId::generate().as_str())
            .ok()
            .map(RequestId::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_format() {
        let id = TransactionId::generate();
        let (random, millis) = id.as_str()[TRANSACTION_ID_PREFIX.len()..]
            .split_at(TRANSACTION_ID_RANDOM_LENGTH);

        assert!(id.as_str().starts_with("TREEZ"));
        assert!(random.bytes().all(|b| TRANSACTION_ID_CHARSET.contains(&b)));
        assert!(millis.parse::<i64>().is_ok());
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(TransactionId::generate(), TransactionId::generate());
    }

    #[test]
    fn unreadable_header_is_dropped() -> anyhow::Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(TRANSACTION_ID_HEADER, HeaderValue::from_bytes(b"\xff\xfe")?);
        assert!(TransactionId::discard_unreadable(&mut headers));
        assert!(headers.get(TRANSACTION_ID_HEADER).is_none());

        headers.insert(TRANSACTION_ID_HEADER, HeaderValue::from_static("TREEZCLIENT00001"));
        assert!(!TransactionId::discard_unreadable(&mut headers));
        assert_eq!(TransactionId::from_headers(&headers).as_str(), "TREEZCLIENT00001");
        Ok(())
    }

    #[test]
    fn missing_header_is_empty() {
        assert_eq!(TransactionId::from_headers(&HeaderMap::new()).as_str(), "");
    }
}
