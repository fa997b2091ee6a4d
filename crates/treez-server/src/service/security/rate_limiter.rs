//! Fixed-window rate limiter keyed by client address.

use std::fmt;
use std::net::IpAddr;
use std::time::Duration;

use crate::TRACING_TARGET_RATE_LIMIT;
use crate::handler::{ErrorKind, Result};
use crate::service::TtlCache;

/// Key a request is counted under.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum RateLimitKey {
    /// Rate limit by client address
    IpAddress(IpAddr),
    /// Custom key
    Custom(String),
}

impl RateLimitKey {
    pub fn from_ip(ip: IpAddr) -> Self {
        Self::IpAddress(ip)
    }

    pub fn custom(key: impl Into<String>) -> Self {
        Self::Custom(key.into())
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IpAddress(ip) => write!(f, "ip:{ip}"),
            Self::Custom(key) => write!(f, "custom:{key}"),
        }
    }
}

/// Fixed-window request counter.
///
/// The first request of a key opens a window of the counter cache's TTL.
/// Every request in the window counts; the one that takes the count above
/// `limit` and all after it are rejected until the window expires.
#[derive(Clone)]
pub struct RateLimiter {
    counters: TtlCache<RateLimitKey, u32>,
    limit: u32,
}

impl RateLimiter {
    /// Creates a limiter allowing `limit` requests per window.
    ///
    /// The window length and the number of tracked keys come from `counters`.
    pub fn new(limit: u32, counters: TtlCache<RateLimitKey, u32>) -> Self {
        tracing::debug!(
            target: TRACING_TARGET_RATE_LIMIT,
            limit,
            window_secs = counters.ttl().as_secs(),
            capacity = counters.capacity(),
            "rate limiter initialized"
        );

        Self { counters, limit }
    }

    /// Returns the number of requests allowed per window.
    #[inline]
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Returns the window length.
    #[inline]
    pub fn window(&self) -> Duration {
        self.counters.ttl()
    }

    /// Counts a request for `key` and rejects it once over the limit.
    pub fn check(&self, key: RateLimitKey) -> Result<()> {
        let count = self.counters.with_entry(
            key.clone(),
            || 0,
            |count| {
                *count = count.saturating_add(1);
                *count
            },
        );

        if count <= self.limit {
            return Ok(());
        }

        tracing::warn!(
            target: TRACING_TARGET_RATE_LIMIT,
            key = %key,
            count,
            limit = self.limit,
            "rate limit exceeded"
        );

        Err(ErrorKind::TooManyRequests.with_context(format!(
            "{} requests from {} within {}s",
            count,
            key,
            self.window().as_secs()
        )))
    }
}

impl fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("window", &self.window())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: u32, window: Duration) -> RateLimiter {
        RateLimiter::new(limit, TtlCache::new(10_000, window))
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_request_over_limit() -> anyhow::Result<()> {
        let limiter = limiter(100, Duration::from_secs(60));
        let key = RateLimitKey::from_ip("127.0.0.1".parse()?);

        for _ in 0..100 {
            assert!(limiter.check(key.clone()).is_ok());
        }

        let error = limiter.check(key.clone()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::TooManyRequests);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_resets_count() -> anyhow::Result<()> {
        let limiter = limiter(2, Duration::from_secs(60));
        let key = RateLimitKey::from_ip("127.0.0.1".parse()?);

        assert!(limiter.check(key.clone()).is_ok());
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(limiter.check(key.clone()).is_ok());
        assert!(limiter.check(key.clone()).is_err());

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(limiter.check(key.clone()).is_ok());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() -> anyhow::Result<()> {
        let limiter = limiter(1, Duration::from_secs(60));
        let first = RateLimitKey::from_ip("10.0.0.1".parse()?);
        let second = RateLimitKey::from_ip("10.0.0.2".parse()?);

        assert!(limiter.check(first.clone()).is_ok());
        assert!(limiter.check(first).is_err());
        assert!(limiter.check(second).is_ok());
        Ok(())
    }
}
