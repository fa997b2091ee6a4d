//! Success and error envelopes.
//!
//! Handlers and stages build an [`Envelope`] without knowing the request's
//! transaction id. The rendered response carries the envelope in its
//! extensions so the transaction middleware can re-render it with the id of
//! the request it answers.

use std::borrow::Cow;
use std::collections::BTreeMap;

use axum::Json;
use axum::body::Body;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::handler::ErrorKind;

/// Field name to messages, rendered as the `errors` member of an error envelope.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Envelope outcome, serialized as `"success"` or `"error"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvelopeStatus {
    Success,
    Error,
}

/// A response envelope waiting for its transaction id.
#[derive(Debug, Clone)]
pub struct Envelope {
    status: StatusCode,
    message: Cow<'static, str>,
    data: Option<serde_json::Value>,
    errors: Option<FieldErrors>,
    context: Option<Cow<'static, str>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvelopeBody<'a> {
    status: EnvelopeStatus,
    status_code: u16,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<&'a serde_json::Value>,
    transaction_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<&'a FieldErrors>,
}

impl Envelope {
    /// Creates an envelope for the given status and client-facing message.
    pub fn new(status: StatusCode, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status,
            message: message.into(),
            data: None,
            errors: None,
            context: None,
        }
    }

    /// Attaches the `data` member.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attaches the `errors` member.
    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    /// Attaches log-only context.
    pub fn with_context(mut self, context: impl Into<Cow<'static, str>>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Returns the HTTP status code.
    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the outcome derived from the status code.
    #[inline]
    pub fn outcome(&self) -> EnvelopeStatus {
        if self.status.is_success() {
            EnvelopeStatus::Success
        } else {
            EnvelopeStatus::Error
        }
    }

    /// Returns the client-facing message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the log-only context.
    #[inline]
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Returns the field-level errors.
    #[inline]
    pub fn errors(&self) -> Option<&FieldErrors> {
        self.errors.as_ref()
    }

    fn body<'a>(&'a self, transaction_id: &'a str) -> EnvelopeBody<'a> {
        EnvelopeBody {
            status: self.outcome(),
            status_code: self.status.as_u16(),
            message: &self.message,
            data: self.data.as_ref(),
            transaction_id,
            errors: self.errors.as_ref(),
        }
    }

    /// Serializes the envelope for the given transaction id.
    pub fn to_json(&self, transaction_id: &str) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(&self.body(transaction_id))
    }

    /// Replaces the body of `response` with this envelope rendered for
    /// `transaction_id`, keeping its status and headers.
    pub fn rewrite(&self, response: &mut Response, transaction_id: &str) -> serde_json::Result<()> {
        let bytes = self.to_json(transaction_id)?;
        let headers = response.headers_mut();
        headers.remove(header::CONTENT_LENGTH);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        *response.body_mut() = Body::from(bytes);
        Ok(())
    }
}

impl IntoResponse for Envelope {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body(""))).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

/// Success envelope returned by handlers.
///
/// ```rust,ignore
/// async fn logout() -> Success {
///     Success::new("Logout successful")
/// }
/// ```
#[must_use]
#[derive(Debug, Clone)]
pub struct Success<T = ()> {
    status: StatusCode,
    message: Cow<'static, str>,
    data: Option<T>,
}

impl Success<()> {
    /// Creates a `200 OK` envelope without data.
    pub fn new(message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: None,
        }
    }
}

impl<T> Success<T> {
    /// Creates a `200 OK` envelope with data.
    pub fn with_data(message: impl Into<Cow<'static, str>>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Answers with `201 Created` instead of `200 OK`.
    pub fn created(self) -> Self {
        Self {
            status: StatusCode::CREATED,
            ..self
        }
    }
}

impl<T: Serialize> IntoResponse for Success<T> {
    fn into_response(self) -> Response {
        let mut envelope = Envelope::new(self.status, self.message);

        if let Some(data) = self.data {
            match serde_json::to_value(data) {
                Ok(value) => envelope = envelope.with_data(value),
                Err(err) => {
                    return ErrorKind::InternalServerError
                        .with_context(format!("failed to serialize response data: {}", err))
                        .into_response();
                }
            }
        }

        envelope.into_response()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn success_envelope_shape() -> anyhow::Result<()> {
        let envelope = Envelope::new(StatusCode::OK, "Login successful")
            .with_data(json!({ "token": { "accessToken": "a" } }));

        let body: Value = serde_json::from_slice(&envelope.to_json("TREEZ0000000000001")?)?;
        assert_eq!(body["status"], "success");
        assert_eq!(body["statusCode"], 200);
        assert_eq!(body["message"], "Login successful");
        assert_eq!(body["data"]["token"]["accessToken"], "a");
        assert_eq!(body["transactionId"], "TREEZ0000000000001");
        assert!(body.get("errors").is_none());
        Ok(())
    }

    #[test]
    fn error_envelope_shape() -> anyhow::Result<()> {
        let mut errors = FieldErrors::new();
        errors.insert("email".into(), vec!["Email already registered".into()]);
        let envelope = Envelope::new(StatusCode::BAD_REQUEST, "Registration failed")
            .with_errors(errors)
            .with_context("never serialized");

        let body: Value = serde_json::from_slice(&envelope.to_json("T")?)?;
        assert_eq!(body["status"], "error");
        assert_eq!(body["statusCode"], 400);
        assert_eq!(body["errors"]["email"][0], "Email already registered");
        assert!(body.get("data").is_none());
        assert!(!body.to_string().contains("never serialized"));
        Ok(())
    }

    #[test]
    fn rendered_response_keeps_envelope() {
        let response = Success::new("Logout successful").into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let envelope = response.extensions().get::<Envelope>().unwrap();
        assert_eq!(envelope.message(), "Logout successful");
        assert_eq!(envelope.outcome(), EnvelopeStatus::Success);
    }

    #[test]
    fn created_status() {
        let response = Success::with_data("Registration successful", json!({})).created().into_response();
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
