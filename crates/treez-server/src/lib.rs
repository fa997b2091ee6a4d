#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod error;

pub mod extract;
pub mod handler;
pub mod middleware;
pub mod service;

pub use crate::error::{BoxedError, Error, ErrorKind, Result};

/// Tracing target for credential verification and token rotation.
pub const TRACING_TARGET_AUTHENTICATION: &str = "treez_server::authentication";

/// Tracing target for role checks.
pub const TRACING_TARGET_AUTHORIZATION: &str = "treez_server::authorization";

/// Tracing target for the per-client request limiter.
pub const TRACING_TARGET_RATE_LIMIT: &str = "treez_server::rate_limit";

/// Tracing target for request and envelope logging.
///
/// Every line carries the request's `transaction_id`.
pub const TRACING_TARGET_REQUEST: &str = "treez_server::request";

/// Tracing target for secondary storage and repositories.
pub const TRACING_TARGET_STORAGE: &str = "treez_server::storage";

/// Tracing target for outgoing email.
pub const TRACING_TARGET_EMAIL: &str = "treez_server::email";
