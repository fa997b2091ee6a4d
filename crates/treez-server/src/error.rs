//! Errors raised below the HTTP layer.
//!
//! A service [`Error`] names the failing component (`"nats"`, `"argon2"`,
//! `"session"`, ...) and a message for the logs. Handlers turn it into an
//! HTTP error, so none of this text is sent to clients.

use std::borrow::Cow;
use std::error::Error as StdError;

/// Boxed error source.
pub type BoxedError = Box<dyn StdError + Send + Sync>;

/// Result of a service operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What went wrong, as far as the HTTP layer cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or unusable settings, found at startup.
    Config,
    /// NATS or another backing service failed.
    External,
    /// The credentials or the session do not check out.
    Auth,
    /// A unique key (the user email) is already taken.
    Conflict,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// Returns `true` when the failure is on the server side.
    #[must_use]
    pub const fn is_server_fault(self) -> bool {
        matches!(self, Self::Config | Self::External | Self::Internal)
    }
}

/// Service error.
#[derive(Debug, thiserror::Error)]
#[error("{kind} error in {component}: {message}")]
pub struct Error {
    kind: ErrorKind,
    component: Cow<'static, str>,
    message: Cow<'static, str>,
    #[source]
    source: Option<BoxedError>,
}

impl Error {
    fn new(
        kind: ErrorKind,
        component: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            kind,
            component: component.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Invalid configuration.
    pub fn config(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Config, "config", message)
    }

    /// Failure of a backing service such as `nats`.
    pub fn external(
        component: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(ErrorKind::External, component, message)
    }

    /// Rejected credentials or session.
    pub fn auth(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Auth, "auth", message)
    }

    /// Duplicate record.
    pub fn conflict(message: impl Into<Cow<'static, str>>) -> Self {
        Self::new(ErrorKind::Conflict, "repository", message)
    }

    /// Internal failure inside `component`.
    pub fn internal(
        component: impl Into<Cow<'static, str>>,
        message: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self::new(ErrorKind::Internal, component, message)
    }

    /// Chains the underlying cause.
    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Component that raised the error.
    #[inline]
    pub fn component(&self) -> &str {
        &self.component
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<treez_nats::Error> for Error {
    fn from(err: treez_nats::Error) -> Self {
        Self::external("nats", err.to_string()).with_source(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::internal("serde_json", "record (de)serialization failed").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_kind_and_component() {
        let error = Error::external("nats", "connection refused");
        assert_eq!(
            error.to_string(),
            "external error in nats: connection refused"
        );
        assert_eq!(error.component(), "nats");
    }

    #[test]
    fn config_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let error = Error::config("cannot read secret file").with_source(io);

        assert_eq!(error.kind(), ErrorKind::Config);
        assert_eq!(error.message(), "cannot read secret file");
        assert!(StdError::source(&error).is_some());
    }

    #[test]
    fn nats_errors_are_external() {
        let error: Error = treez_nats::Error::kv("kv_put", "bucket gone").into();
        assert_eq!(error.kind(), ErrorKind::External);
        assert!(StdError::source(&error).is_some());
    }

    #[test]
    fn client_faults() {
        assert!(!ErrorKind::Auth.is_server_fault());
        assert!(!ErrorKind::Conflict.is_server_fault());
        assert!(ErrorKind::External.is_server_fault());
        assert_eq!(<&str>::from(ErrorKind::Conflict), "conflict");
    }
}
