#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use treez_server::handler::routes;
use treez_server::middleware::{RouterObservabilityExt, RouterRecoveryExt, RouterSecurityExt};
use treez_server::service::ServiceState;

use crate::config::{Cli, MiddlewareConfig};

/// Tracing target for binding and serving.
pub const TRACING_TARGET_SERVER_STARTUP: &str = "treez_cli::server::startup";
/// Tracing target for signals, draining and exit.
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "treez_cli::server::shutdown";
/// Tracing target for the configuration summary.
pub const TRACING_TARGET_CONFIG: &str = "treez_cli::config";

#[tokio::main]
async fn main() -> process::ExitCode {
    match run().await {
        Ok(()) => {
            tracing::info!(target: TRACING_TARGET_SERVER_SHUTDOWN, "treez stopped");
            process::ExitCode::SUCCESS
        }
        // Configuration errors can happen before the subscriber exists.
        Err(error) if !tracing::enabled!(tracing::Level::ERROR) => {
            eprintln!("treez: {error:#}");
            process::ExitCode::FAILURE
        }
        Err(error) => {
            tracing::error!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                error = format!("{error:#}"),
                "treez stopped with an error"
            );
            process::ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    Cli::init_tracing();

    cli.log();
    cli.validate().context("invalid configuration")?;

    let state = ServiceState::from_config(&cli.service)
        .await
        .context("failed to create service state")?;

    let app = app(state, &cli.middleware);
    server::serve(app, cli.server).await?;
    Ok(())
}

/// Routes wrapped in the middleware stack, outermost last:
/// recovery, then observability, then security.
///
/// Recovery sits inside observability so timeout and panic envelopes still
/// get a transaction id and a request log line.
fn app(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    routes(state.clone())
        .with_state(state)
        .with_recovery(&middleware.recovery)
        .with_observability()
        .with_security(&middleware.cors)
}
