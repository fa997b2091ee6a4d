//! Errors from binding and serving.

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be opened.
    #[error("cannot listen on {addr}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// The accept loop stopped with an I/O error.
    #[error("server stopped unexpectedly")]
    Serve(#[source] io::Error),
}

impl ServerError {
    /// Operator hint for the common bind failures.
    pub fn hint(&self) -> Option<&'static str> {
        let Self::Bind { source, .. } = self else {
            return None;
        };

        match source.kind() {
            io::ErrorKind::AddrInUse => Some("another process holds the port, pick another with --port"),
            io::ErrorKind::PermissionDenied => Some("ports below 1024 need extra privileges"),
            io::ErrorKind::AddrNotAvailable => Some("no local interface has this --host address"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_in_use_has_hint() {
        let error = ServerError::Bind {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            source: io::Error::from(io::ErrorKind::AddrInUse),
        };

        assert_eq!(error.to_string(), "cannot listen on 127.0.0.1:3000");
        assert!(error.hint().is_some_and(|hint| hint.contains("--port")));
    }

    #[test]
    fn serve_errors_have_no_hint() {
        let error = ServerError::Serve(io::Error::other("accept failed"));
        assert!(error.hint().is_none());
    }
}
