//! Role-based authorization with a decision cache.

use uuid::Uuid;

use super::Identity;
use crate::TRACING_TARGET_AUTHORIZATION;
use crate::handler::{ErrorKind, Result};
use crate::service::TtlCache;

/// Decides whether an identity holds a required role.
///
/// Decisions are cached per `(identity, role)` pair, so a role change is
/// only seen once the cached decision expires.
#[derive(Debug, Clone)]
pub struct RoleGate {
    decisions: TtlCache<(Uuid, String), bool>,
}

impl RoleGate {
    pub fn new(decisions: TtlCache<(Uuid, String), bool>) -> Self {
        Self { decisions }
    }

    /// Checks `identity` against `required_role`.
    ///
    /// Without a required role any authenticated identity passes.
    pub fn authorize(&self, identity: &Identity, required_role: Option<&str>) -> Result<()> {
        let Some(required_role) = required_role else {
            return Ok(());
        };

        let key = (identity.id, required_role.to_ascii_lowercase());
        let allowed = match self.decisions.get(&key) {
            Some(allowed) => allowed,
            None => {
                let allowed = identity.has_role(required_role);
                self.decisions.insert(key, allowed);
                allowed
            }
        };

        if allowed {
            return Ok(());
        }

        tracing::warn!(
            target: TRACING_TARGET_AUTHORIZATION,
            user_id = %identity.id,
            role = %identity.role,
            required_role,
            "role check failed"
        );

        Err(ErrorKind::Forbidden.with_context(format!(
            "role '{}' required, identity has '{}'",
            required_role, identity.role
        )))
    }
}
