//! JWT error to HTTP error conversion.
//!
//! Expiry is kept apart from every other token failure: only an expired
//! access token may fall through to the refresh path.

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};

use super::http_error::{Error as HttpError, ErrorKind};

impl From<JwtError> for HttpError<'static> {
    fn from(error: JwtError) -> Self {
        match error.kind() {
            JwtErrorKind::ExpiredSignature => ErrorKind::ExpiredAuthToken
                .with_context("Token signature has expired"),
            JwtErrorKind::InvalidSignature => ErrorKind::MalformedAuthToken
                .with_context("Token signature could not be verified"),
            JwtErrorKind::InvalidToken => ErrorKind::MalformedAuthToken
                .with_context("The provided token format is unrecognized"),
            JwtErrorKind::InvalidAlgorithm => ErrorKind::MalformedAuthToken
                .with_context("Token was signed with an incompatible algorithm"),
            JwtErrorKind::ImmatureSignature => ErrorKind::MalformedAuthToken
                .with_context("Token is not valid yet"),
            JwtErrorKind::MissingRequiredClaim(claim) => ErrorKind::MalformedAuthToken
                .with_context(format!("Token is missing required field: {}", claim)),
            JwtErrorKind::Base64(_) => ErrorKind::MalformedAuthToken
                .with_context("Token contains invalid base64 encoding"),
            JwtErrorKind::Json(_) | JwtErrorKind::Utf8(_) => ErrorKind::MalformedAuthToken
                .with_context("Token payload contains malformed data"),
            _ => ErrorKind::InternalServerError
                .with_context(format!("Unexpected token processing failure: {}", error)),
        }
    }
}
