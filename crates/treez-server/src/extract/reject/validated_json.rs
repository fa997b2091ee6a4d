//! Validated JSON extractor.
//!
//! [`ValidateJson`] deserializes like [`Json`] and then runs the `validator`
//! rules of the payload. Failures render as a 400 envelope with
//! `"Validation failed"` and one entry per camelCase field.

use axum::extract::{FromRequest, Request};
use derive_more::{Deref, DerefMut, From};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use super::Json;
use crate::TRACING_TARGET_REQUEST;
use crate::handler::response::FieldErrors;
use crate::handler::{Error, ErrorKind};

/// Message of every validation failure envelope.
const VALIDATION_FAILED: &str = "Validation failed";

/// JSON extractor running the payload's `validator` rules.
#[must_use]
#[derive(Debug, Clone, Copy, Default, Deref, DerefMut, From)]
pub struct ValidateJson<T>(pub T);

impl<T> ValidateJson<T> {
    /// Returns the inner validated value.
    #[inline]
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T, S> FromRequest<S> for ValidateJson<T>
where
    T: DeserializeOwned + Validate + 'static,
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(data) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
        data.validate()?;
        Ok(Self(data))
    }
}

/// Converts a Rust field name into its camelCase wire name.
fn camel_case(field: &str) -> String {
    let mut result = String::with_capacity(field.len());
    let mut upper = false;

    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            result.push(c.to_ascii_uppercase());
            upper = false;
        } else {
            result.push(c);
        }
    }

    result
}

fn describe(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => match error.code.as_ref() {
            "required" => "Field is required".to_owned(),
            "email" => "Invalid email format".to_owned(),
            "length" => "Field has invalid length".to_owned(),
            "range" => "Field is out of range".to_owned(),
            "must_match" => "Fields do not match".to_owned(),
            code => format!("Failed validation: {code}"),
        },
    }
}

impl From<ValidationErrors> for Error<'static> {
    fn from(errors: ValidationErrors) -> Self {
        let fields: FieldErrors = errors
            .field_errors()
            .into_iter()
            .map(|(field, field_errors)| {
                let messages = field_errors.iter().map(describe).collect();
                (camel_case(&field), messages)
            })
            .collect();

        tracing::warn!(
            target: TRACING_TARGET_REQUEST,
            fields = ?fields.keys().collect::<Vec<_>>(),
            "request validation failed"
        );

        ErrorKind::BadRequest
            .with_message(VALIDATION_FAILED)
            .with_resource("request")
            .with_field_errors(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::request::RegisterRequest;

    #[test]
    fn field_names_are_camel_case() {
        assert_eq!(camel_case("confirm_password"), "confirmPassword");
        assert_eq!(camel_case("email"), "email");
    }

    #[test]
    fn errors_map_to_fields() {
        let request = RegisterRequest {
            name: "J".into(),
            email: "not-an-email".into(),
            password: "Secret123".into(),
            confirm_password: "Secret124".into(),
        };

        let error: Error = request.validate().unwrap_err().into();
        let fields = error.errors().unwrap();

        assert_eq!(error.kind(), ErrorKind::BadRequest);
        assert_eq!(error.message(), Some(VALIDATION_FAILED));
        assert_eq!(fields["name"], vec!["Name must be at least 2 characters"]);
        assert_eq!(fields["email"], vec!["Invalid email format"]);
        assert_eq!(fields["confirmPassword"], vec!["Passwords do not match"]);
    }
}
