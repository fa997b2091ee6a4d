//! HTTP server startup.

use std::future::IntoFuture;
use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;

use super::{Result, ServerError, TRACING_TARGET_SHUTDOWN, TRACING_TARGET_STARTUP, shutdown_signal};
use crate::config::ServerConfig;

/// Binds the configured address and serves `app` until a shutdown signal.
///
/// Connections carry their peer address so the rate limiter can key
/// clients that sit behind no proxy. After a signal, open connections get
/// the configured shutdown timeout to finish before they are dropped.
pub async fn serve_http(app: Router, server_config: ServerConfig) -> Result<()> {
    let server_addr = server_config.server_addr();

    let listener = TcpListener::bind(server_addr).await.map_err(|source| {
        let error = ServerError::Bind {
            addr: server_addr,
            source,
        };

        tracing::error!(
            target: TRACING_TARGET_STARTUP,
            addr = %server_addr,
            error = ?error,
            hint = error.hint(),
            "failed to bind to address"
        );
        error
    })?;

    tracing::info!(
        target: TRACING_TARGET_STARTUP,
        addr = %server_addr,
        "server is listening"
    );

    if server_config.binds_to_all_interfaces() {
        tracing::warn!(
            target: TRACING_TARGET_STARTUP,
            "server is bound to all interfaces, check the firewall rules"
        );
    }

    let (trigger, deadline) = shutdown_signal(server_config.shutdown_timeout());
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(trigger)
    .into_future();

    tokio::select! {
        result = server => result.map_err(|err| {
            tracing::error!(
                target: TRACING_TARGET_SHUTDOWN,
                error = %err,
                "server encountered an error"
            );
            ServerError::Serve(err)
        })?,
        () = deadline => {
            tracing::warn!(
                target: TRACING_TARGET_SHUTDOWN,
                "shutdown timeout elapsed, dropping open connections"
            );
            return Ok(());
        }
    }

    tracing::info!(target: TRACING_TARGET_SHUTDOWN, "server shut down gracefully");
    Ok(())
}
