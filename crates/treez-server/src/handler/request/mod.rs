//! Request payloads for HTTP handlers.

mod accounts;
mod authentications;
mod validations;

pub use accounts::*;
pub use authentications::*;
pub use validations::{Normalized, validation_error};
