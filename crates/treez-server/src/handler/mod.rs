//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! Routes are RPC style: `POST` for mutations, `GET` for queries, all under
//! [`RPC_PREFIX`].
//!
//! | route                    | procedure   |
//! |--------------------------|-------------|
//! | `auth.register`          | `public`    |
//! | `auth.login`             | `public`    |
//! | `auth.logout`            | `public`    |
//! | `auth.refreshToken`      | `public`    |
//! | `auth.forgotPassword`    | `public`    |
//! | `auth.resetPassword`     | `public`    |
//! | `auth.me`                | `protected` |
//! | `auth.changePassword`    | `protected` |
//! | `auth.activeSessions`    | `protected` |
//! | `auth.logoutAll`         | `protected` |
//! | `auth.cleanupTokens`     | `protected` |
//! | `admin.userSessions`     | `admin`     |
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use treez_server::handler::routes;
//! use treez_server::service::{ServiceConfig, ServiceState};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ServiceConfig::builder()
//!     .with_access_token_secret("a".repeat(32))
//!     .with_refresh_token_secret("b".repeat(32))
//!     .build()?;
//! let state = ServiceState::from_config(&config).await?;
//! let app: axum::Router = routes(state.clone()).with_state(state);
//! # Ok(())
//! # }
//! ```
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod accounts;
mod admin;
mod authentication;
mod error;
pub mod request;
pub mod response;

use axum::Router;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
use crate::service::ServiceState;

/// Path prefix of every RPC route.
pub const RPC_PREFIX: &str = "/api/treez";

#[inline]
async fn fallback() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns a [`Router`] with all routes behind their procedures.
pub fn routes(state: ServiceState) -> Router<ServiceState> {
    Router::new()
        .merge(authentication::routes(state.clone()))
        .merge(accounts::routes(state.clone()))
        .merge(admin::routes(state))
        .fallback(fallback)
}
