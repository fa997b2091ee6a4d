use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

/// Default age, in days, after which an unused session is cleaned up.
const DEFAULT_UNUSED_DAYS: u32 = 30;
const MAX_UNUSED_DAYS: u32 = 36_500;

/// Request payload for a password change.
#[must_use]
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub old_password: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
    #[validate(must_match(other = "new_password", message = "Passwords do not match"))]
    pub confirm_new_password: String,
}

/// Request payload for removing unused sessions.
#[must_use]
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CleanupTokensRequest {
    #[serde(default = "default_unused_days")]
    #[validate(range(min = 1, max = MAX_UNUSED_DAYS, message = "Must be between 1 and 36500 days"))]
    pub unused_days: u32,
}

fn default_unused_days() -> u32 {
    DEFAULT_UNUSED_DAYS
}

impl Default for CleanupTokensRequest {
    fn default() -> Self {
        Self {
            unused_days: DEFAULT_UNUSED_DAYS,
        }
    }
}

/// Query of the admin session listing.
#[must_use]
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSessionsQuery {
    pub user_id: Uuid,
}
