//! Shutdown signals and the connection drain deadline.

use std::future;
use std::time::Duration;

use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::oneshot;

use super::TRACING_TARGET_SHUTDOWN;

/// Resolves on Ctrl+C or, on unix, SIGTERM.
///
/// A handler that fails to install is logged and never resolves, so the
/// other one still works.
async fn termination() {
    let interrupt = async {
        match ctrl_c().await {
            Ok(()) => tracing::info!(target: TRACING_TARGET_SHUTDOWN, signal = "SIGINT", "signal received"),
            Err(error) => {
                tracing::error!(target: TRACING_TARGET_SHUTDOWN, error = %error, "cannot listen for Ctrl+C");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!(target: TRACING_TARGET_SHUTDOWN, signal = "SIGTERM", "signal received");
            }
            Err(error) => {
                tracing::error!(target: TRACING_TARGET_SHUTDOWN, error = %error, "cannot listen for SIGTERM");
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        () = interrupt => {},
        () = terminate => {},
    }
}

/// Returns the graceful shutdown trigger and the drain deadline.
///
/// The first future resolves when a signal arrives. The second resolves
/// `drain_timeout` after that, at which point open connections are dropped.
pub fn shutdown_signal(
    drain_timeout: Duration,
) -> (impl Future<Output = ()> + Send + 'static, impl Future<Output = ()> + Send + 'static) {
    let (notify, notified) = oneshot::channel::<()>();

    let trigger = async move {
        termination().await;
        tracing::info!(
            target: TRACING_TARGET_SHUTDOWN,
            timeout_secs = drain_timeout.as_secs(),
            "graceful shutdown initiated"
        );
        let _ = notify.send(());
    };

    let deadline = async move {
        // The sender is dropped without sending only if the server stopped first.
        if notified.await.is_ok() {
            tokio::time::sleep(drain_timeout).await;
        } else {
            future::pending::<()>().await;
        }
    };

    (trigger, deadline)
}

#[cfg(test)]
mod tests {
    use tokio::time::timeout;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_waits_for_signal() {
        let (_trigger, deadline) = shutdown_signal(Duration::from_secs(1));
        assert!(timeout(Duration::from_secs(3600), deadline).await.is_err());
    }
}
