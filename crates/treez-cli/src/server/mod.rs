//! HTTP server startup and lifecycle management.

mod error;
mod http_server;
mod shutdown;

use axum::Router;
pub use error::{Result, ServerError};
use http_server::serve_http;
use shutdown::shutdown_signal;

use crate::config::ServerConfig;
use crate::{
    TRACING_TARGET_SERVER_SHUTDOWN as TRACING_TARGET_SHUTDOWN,
    TRACING_TARGET_SERVER_STARTUP as TRACING_TARGET_STARTUP,
};

/// Starts the HTTP server and waits until it shuts down.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails
/// while running.
pub async fn serve(app: Router, config: ServerConfig) -> Result<()> {
    serve_http(app, config).await
}
