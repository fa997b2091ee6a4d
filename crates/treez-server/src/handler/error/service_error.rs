//! Service error to HTTP error conversion.
//!
//! Infrastructure failures collapse into the generic internal error so no
//! internal detail reaches the client; the detail is kept as log context.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::ErrorKind as ServiceErrorKind;

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "treez_server::handler::service";

/// Message used when a unique record is inserted twice.
const RECORD_ALREADY_EXISTS: &str = "Record already exists";

impl From<crate::Error> for HttpError<'static> {
    fn from(error: crate::Error) -> Self {
        match error.kind() {
            ServiceErrorKind::Conflict => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "duplicate record"
                );

                ErrorKind::BadRequest
                    .with_message(RECORD_ALREADY_EXISTS)
                    .with_context(error.message().to_owned())
            }
            ServiceErrorKind::Auth => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "service rejected credentials"
                );

                ErrorKind::Unauthorized.with_context(error.message().to_owned())
            }
            ServiceErrorKind::Config | ServiceErrorKind::External | ServiceErrorKind::Internal => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    component = error.component(),
                    "service operation failed"
                );

                ErrorKind::InternalServerError.with_context(error.message().to_owned())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_maps_to_bad_request() {
        let error: HttpError = crate::Error::conflict("email taken").into();
        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.message(), Some(RECORD_ALREADY_EXISTS));
    }

    #[test]
    fn infrastructure_errors_hide_details() {
        let error: HttpError = crate::Error::external("nats", "connection refused").into();
        assert_eq!(error.kind(), ErrorKind::InternalServerError);
        assert_eq!(error.message(), None);
        assert!(error.context().unwrap().contains("connection refused"));
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        let error: HttpError = crate::Error::auth("session revoked").into();
        assert_eq!(error.kind(), ErrorKind::Unauthorized);
    }
}
