//! Request timeouts and panic capture.
//!
//! Both end as the generic internal error envelope. What actually happened
//! only reaches the logs.

use std::any::Any;
use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::response::{IntoResponse, Response};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower::{BoxError, ServiceBuilder};
use tower_http::catch_panic::CatchPanicLayer;

use crate::handler::{Error, ErrorKind};

const TRACING_TARGET: &str = "treez_server::recovery";

/// Recovery middleware settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct RecoveryConfig {
    /// Seconds a request may run before it is answered with an internal error.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "REQUEST_TIMEOUT", default_value = "30")
    )]
    pub request_timeout: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self::with_timeout_secs(30)
    }
}

impl RecoveryConfig {
    pub const fn with_timeout_secs(secs: u64) -> Self {
        Self {
            request_timeout: secs,
        }
    }

    #[inline]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Extension trait for `axum::`[`Router`] to apply recovery middleware.
pub trait RouterRecoveryExt<S> {
    /// Layers the request timeout and panic capture.
    fn with_recovery(self, config: &RecoveryConfig) -> Self;
}

impl<S> RouterRecoveryExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_recovery(self, config: &RecoveryConfig) -> Self {
        self.layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(middleware_failure))
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(TimeoutLayer::new(config.request_timeout())),
        )
    }
}

async fn middleware_failure(error: BoxError) -> Response {
    let context = if error.is::<Elapsed>() {
        "request timed out".to_owned()
    } else {
        format!("middleware failure: {error}")
    };

    tracing::error!(target: TRACING_TARGET, error = %error, "{context}");
    ErrorKind::InternalServerError
        .with_context(context)
        .into_response()
}

/// Best effort text of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("non-string panic payload")
}

fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    // A panic carrying an `Error` is answered with that error.
    if let Some(error) = payload.downcast_ref::<Error<'static>>() {
        tracing::error!(target: TRACING_TARGET, error = %error, "handler panicked");
        return error.clone().into_response();
    }

    let message = panic_message(payload.as_ref());
    tracing::error!(target: TRACING_TARGET, panic = message, "handler panicked");

    ErrorKind::InternalServerError
        .with_context(format!("handler panicked: {message}"))
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum_test::TestServer;
    use serde_json::Value;

    use super::*;
    use crate::handler::response::Success;

    async fn slow() -> Success {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Success::new("done")
    }

    async fn panics() -> Success {
        panic!("boom")
    }

    async fn rejects() -> Success {
        std::panic::panic_any(ErrorKind::Forbidden.into_error())
    }

    fn server() -> anyhow::Result<TestServer> {
        let app = Router::new()
            .route("/slow", get(slow))
            .route("/panic", get(panics))
            .route("/reject", get(rejects))
            .with_recovery(&RecoveryConfig::with_timeout_secs(1));

        Ok(TestServer::new(app)?)
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_internal_error() -> anyhow::Result<()> {
        let response = server()?.get("/slow").await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(
            body["message"],
            "An unexpected error occurred. Please try again later."
        );
        Ok(())
    }

    #[tokio::test]
    async fn panic_detail_is_not_sent() -> anyhow::Result<()> {
        let response = server()?.get("/panic").await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(body["status"], "error");
        assert!(!body.to_string().contains("boom"));
        Ok(())
    }

    #[tokio::test]
    async fn panic_with_error_keeps_its_status() -> anyhow::Result<()> {
        server()?.get("/reject").await.assert_status_forbidden();
        Ok(())
    }

    #[test]
    fn payload_text() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(owned.as_ref()), "owned");
        assert_eq!(panic_message(borrowed.as_ref()), "borrowed");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
