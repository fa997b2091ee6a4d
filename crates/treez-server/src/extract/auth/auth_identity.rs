use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use derive_more::{Deref, From};

use crate::handler::{Error, ErrorKind};
use crate::service::Identity;

/// Identity resolved by the `authenticate` stage of a procedure.
///
/// Only routes behind an authenticating procedure can extract it; elsewhere
/// extraction fails with [`ErrorKind::MissingAuthToken`].
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq, Deref, From)]
pub struct AuthIdentity(pub Identity);

impl AuthIdentity {
    /// Returns the inner identity.
    #[inline]
    pub fn into_inner(self) -> Identity {
        self.0
    }
}

impl<S> FromRequestParts<S> for AuthIdentity
where
    S: Send + Sync,
{
    type Rejection = Error<'static>;

    async fn from_request_parts(parts: &mut Parts, _: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthIdentity>()
            .cloned()
            .ok_or_else(|| {
                ErrorKind::MissingAuthToken
                    .with_context("route is not behind an authenticating procedure")
            })
    }
}
