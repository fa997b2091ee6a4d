//! Client-facing errors.
//!
//! Pipeline stages, extractors and handlers all fail with [`Error`], which
//! renders as the error envelope. Only the message and the field errors reach
//! the client. Resource and context end up in the request log.

use std::borrow::Cow;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::handler::response::{Envelope, FieldErrors};

/// A specialized [`Result`] type for HTTP operations.
///
/// [`Result`]: std::result::Result
pub type Result<T, E = Error<'static>> = std::result::Result<T, E>;

/// Every failure the API answers with.
///
/// The snake_case name of a kind prefixes the logged context.
#[must_use = "error kinds do nothing unless used to create errors"]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    /// Invalid input.
    BadRequest,
    /// No credential presented.
    MissingAuthToken,
    /// Forged or unreadable credential.
    MalformedAuthToken,
    /// Credential past its expiry.
    ExpiredAuthToken,
    /// Credential or password rejected.
    Unauthorized,
    /// Authenticated, but the role does not fit.
    Forbidden,
    NotFound,
    TooManyRequests,
    #[default]
    InternalServerError,
}

impl ErrorKind {
    pub const fn status_code(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::MissingAuthToken
            | Self::MalformedAuthToken
            | Self::ExpiredAuthToken
            | Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent when the error does not set its own.
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::BadRequest => "The request could not be processed due to invalid data",
            Self::MissingAuthToken | Self::Unauthorized => {
                "You must be logged in to access this resource"
            }
            Self::MalformedAuthToken => "Invalid token",
            Self::ExpiredAuthToken => "Your session has expired",
            Self::Forbidden => "You do not have permission to access this resource",
            Self::NotFound => "The requested resource was not found",
            Self::TooManyRequests => "Rate limit exceeded",
            Self::InternalServerError => "An unexpected error occurred. Please try again later.",
        }
    }

    #[inline]
    pub fn name(self) -> &'static str {
        self.into()
    }

    #[inline]
    pub fn into_error(self) -> Error<'static> {
        Error::new(self)
    }

    #[inline]
    pub fn with_context<'a>(self, context: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_context(context)
    }

    #[inline]
    pub fn with_message<'a>(self, message: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_message(message)
    }

    #[inline]
    pub fn with_resource<'a>(self, resource: impl Into<Cow<'a, str>>) -> Error<'a> {
        Error::new(self).with_resource(resource)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl IntoResponse for ErrorKind {
    #[inline]
    fn into_response(self) -> Response {
        self.into_error().into_response()
    }
}

/// Error answered to the client, built from an [`ErrorKind`].
#[must_use = "errors do nothing unless serialized"]
#[derive(Debug, Clone)]
pub struct Error<'a> {
    kind: ErrorKind,
    message: Option<Cow<'a, str>>,
    resource: Option<Cow<'a, str>>,
    context: Option<Cow<'a, str>>,
    errors: FieldErrors,
}

impl<'a> Error<'a> {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            resource: None,
            context: None,
            errors: FieldErrors::new(),
        }
    }

    /// Replaces the default message of the kind.
    pub fn with_message(mut self, message: impl Into<Cow<'a, str>>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Names the resource involved, for the logs.
    pub fn with_resource(mut self, resource: impl Into<Cow<'a, str>>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Adds detail for the logs. Repeated calls are joined with `; `.
    pub fn with_context(mut self, context: impl Into<Cow<'a, str>>) -> Self {
        let context = context.into();
        self.context = Some(match self.context.take() {
            Some(existing) => Cow::Owned(format!("{existing}; {context}")),
            None => context,
        });
        self
    }

    /// Adds one message under `field` in the `errors` map.
    pub fn with_field_error(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.errors
            .entry(field.into())
            .or_default()
            .push(message.into());
        self
    }

    /// Merges a whole map of field messages.
    pub fn with_field_errors(mut self, errors: FieldErrors) -> Self {
        for (field, messages) in errors {
            self.errors.entry(field).or_default().extend(messages);
        }
        self
    }

    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Message set on this error, if any.
    #[inline]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    #[inline]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Field messages, `None` when there are none.
    pub fn errors(&self) -> Option<&FieldErrors> {
        (!self.errors.is_empty()).then_some(&self.errors)
    }

    /// Message sent to the client.
    pub fn client_message(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or(self.kind.default_message())
    }

    /// `kind[ resource]: context` line for the request log.
    fn log_context(&self) -> String {
        let mut line = self.kind.name().to_owned();
        if let Some(resource) = &self.resource {
            line.push(' ');
            line.push_str(resource);
        }
        if let Some(context) = &self.context {
            line.push_str(": ");
            line.push_str(context);
        }
        line
    }
}

impl fmt::Display for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}",
            self.log_context(),
            self.kind.status_code().as_u16(),
            self.client_message()
        )
    }
}

impl std::error::Error for Error<'_> {}

impl From<ErrorKind> for Error<'static> {
    #[inline]
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl IntoResponse for Error<'_> {
    fn into_response(self) -> Response {
        let mut envelope = Envelope::new(self.kind.status_code(), self.client_message().to_owned())
            .with_context(self.log_context());

        if !self.errors.is_empty() {
            envelope = envelope.with_errors(self.errors);
        }

        envelope.into_response()
    }
}
