//! Response types for HTTP handlers.

mod accounts;
mod authentications;
mod envelope;

pub use accounts::*;
pub use authentications::*;
pub use envelope::{Envelope, EnvelopeStatus, FieldErrors, Success};
