//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - [`procedure`]: rate limiting, authentication and authorization chains
//!   in front of route groups
//! - [`RouterObservabilityExt`]: transaction ids, envelopes and request logs
//! - [`RouterRecoveryExt`]: timeouts and panics rendered as error envelopes
//! - [`RouterSecurityExt`]: CORS, security headers and body limits
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use treez_server::middleware::{
//!     CorsConfig, RecoveryConfig, RouterObservabilityExt, RouterRecoveryExt,
//!     RouterSecurityExt,
//! };
//!
//! let app = treez_server::handler::routes(state.clone())
//!     .with_state(state)
//!     .with_recovery(&RecoveryConfig::default())
//!     .with_observability()
//!     .with_security(&CorsConfig::default());
//! ```

mod observability;
pub mod procedure;
mod recovery;
mod security;

pub use observability::{RouterObservabilityExt, log_transaction};
pub use procedure::{Procedure, RouterProcedureExt, Stage};
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{CorsConfig, RouterSecurityExt};
