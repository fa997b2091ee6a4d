//! Observability middleware: transaction ids, envelopes and request logs.

use std::time::Instant;

use axum::Router;
use axum::extract::Request;
use axum::http::header;
use axum::middleware::{Next, from_fn};
use axum::response::Response;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveRequestHeadersLayer;
use tower_http::trace::TraceLayer;

use crate::TRACING_TARGET_REQUEST;
use crate::extract::{MakeTransactionId, TRANSACTION_ID_HEADER, TransactionId};
use crate::handler::response::Envelope;

/// Extension trait for `axum::`[`Router`] to apply observability middleware.
pub trait RouterObservabilityExt<S> {
    /// Layers observability middleware for request tracing and logging.
    ///
    /// Every request gets an `x-transaction-id` (kept when the client sends
    /// one) that is echoed on the response and written into its envelope.
    /// `Authorization` and `Cookie` are redacted from traces.
    fn with_observability(self) -> Self;
}

impl<S> RouterObservabilityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_observability(self) -> Self {
        self.layer(from_fn(log_transaction))
            .layer(PropagateRequestIdLayer::new(TRANSACTION_ID_HEADER))
            .layer(SetSensitiveRequestHeadersLayer::new([
                header::AUTHORIZATION,
                header::COOKIE,
            ]))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(
                TRANSACTION_ID_HEADER,
                MakeTransactionId,
            ))
            .layer(from_fn(sanitize_transaction_id))
    }
}

/// Runs before the request id layer so unreadable ids get replaced.
async fn sanitize_transaction_id(mut request: Request, next: Next) -> Response {
    if TransactionId::discard_unreadable(request.headers_mut()) {
        tracing::debug!(
            target: TRACING_TARGET_REQUEST,
            "replacing unreadable client transaction id"
        );
    }
    next.run(request).await
}

/// Logs the request and stamps its transaction id into the response envelope.
///
/// Success envelopes log at `info`, client errors at `warn` and server
/// errors at `error`. Responses without an envelope pass through untouched.
pub async fn log_transaction(request: Request, next: Next) -> Response {
    let transaction_id = TransactionId::from_headers(request.headers());
    let method = request.method().clone();
    let uri = request.uri().clone();

    tracing::info!(
        target: TRACING_TARGET_REQUEST,
        transaction_id = %transaction_id,
        method = %method,
        uri = %uri,
        "request received"
    );

    let started = Instant::now();
    let mut response = next.run(request).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    let Some(envelope) = response.extensions_mut().remove::<Envelope>() else {
        return response;
    };

    if let Err(err) = envelope.rewrite(&mut response, transaction_id.as_str()) {
        tracing::error!(
            target: TRACING_TARGET_REQUEST,
            transaction_id = %transaction_id,
            error = %err,
            "failed to render response envelope"
        );
    }

    let status = envelope.status();
    let context = envelope.context().unwrap_or_default();
    if status.is_server_error() {
        tracing::error!(
            target: TRACING_TARGET_REQUEST,
            transaction_id = %transaction_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms,
            message = envelope.message(),
            context,
            "request failed"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            target: TRACING_TARGET_REQUEST,
            transaction_id = %transaction_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms,
            message = envelope.message(),
            context,
            "request rejected"
        );
    } else {
        tracing::info!(
            target: TRACING_TARGET_REQUEST,
            transaction_id = %transaction_id,
            method = %method,
            uri = %uri,
            status = status.as_u16(),
            duration_ms,
            message = envelope.message(),
            "request completed"
        );
    }

    response
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;
    use axum::routing::get;
    use axum_test::TestServer;
    use serde_json::Value;

    use super::*;
    use crate::handler::ErrorKind;
    use crate::handler::response::Success;

    fn server() -> anyhow::Result<TestServer> {
        let app = Router::new()
            .route("/ok", get(|| async { Success::new("Profile retrieved") }))
            .route("/err", get(|| async { ErrorKind::Forbidden.into_error() }))
            .route("/plain", get(|| async { "plain" }))
            .with_observability();

        Ok(TestServer::new(app)?)
    }

    #[tokio::test]
    async fn envelope_carries_generated_id() -> anyhow::Result<()> {
        let response = server()?.get("/ok").await;
        response.assert_status_ok();

        let header = response.header(TRANSACTION_ID_HEADER);
        let header = header.to_str()?;
        assert!(header.starts_with("TREEZ"));

        let body: Value = response.json();
        assert_eq!(body["transactionId"], header);
        assert_eq!(body["message"], "Profile retrieved");
        Ok(())
    }

    #[tokio::test]
    async fn client_id_is_kept() -> anyhow::Result<()> {
        let response = server()?
            .get("/err")
            .add_header(TRANSACTION_ID_HEADER, "TREEZCLIENT00001")
            .await;

        response.assert_status_forbidden();
        let body: Value = response.json();
        assert_eq!(body["transactionId"], "TREEZCLIENT00001");
        assert_eq!(body["status"], "error");
        assert_eq!(response.header(TRANSACTION_ID_HEADER), "TREEZCLIENT00001");
        Ok(())
    }

    #[tokio::test]
    async fn unreadable_client_id_is_replaced() -> anyhow::Result<()> {
        let response = server()?
            .get("/ok")
            .add_header(TRANSACTION_ID_HEADER, HeaderValue::from_bytes(b"\xff\xfe")?)
            .await;

        response.assert_status_ok();
        let body: Value = response.json();
        let id = body["transactionId"].as_str().unwrap_or_default();
        assert!(id.starts_with("TREEZ"), "{id}");
        assert_eq!(response.header(TRANSACTION_ID_HEADER), id);
        Ok(())
    }

    #[tokio::test]
    async fn responses_without_envelope_pass_through() -> anyhow::Result<()> {
        let response = server()?.get("/plain").await;
        response.assert_text("plain");
        Ok(())
    }
}
