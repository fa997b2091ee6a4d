use jiff::Timestamp;
use serde::Serialize;
use uuid::Uuid;

use crate::service::{DeviceInfo, Session};

/// Devices of the caller's active sessions.
#[must_use]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSessions {
    pub sessions: Vec<DeviceInfo>,
}

impl ActiveSessions {
    pub fn from_sessions(sessions: Vec<Session>) -> Self {
        Self {
            sessions: sessions.into_iter().map(|s| s.device).collect(),
        }
    }
}

/// A session as shown to administrators.
///
/// The token hash is never exposed.
#[must_use]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub id: Uuid,
    pub device: DeviceInfo,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: Timestamp,
    pub last_used_at: Timestamp,
    pub expires_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impersonated_by: Option<Uuid>,
}

impl From<Session> for SessionSummary {
    fn from(session: Session) -> Self {
        Self {
            id: session.id,
            device: session.device,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            created_at: session.created_at,
            last_used_at: session.last_used_at,
            expires_at: session.expires_at,
            impersonated_by: session.impersonated_by,
        }
    }
}

/// Active sessions of one user.
#[must_use]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSessions {
    pub user_id: Uuid,
    pub sessions: Vec<SessionSummary>,
}

/// Number of sessions removed by a cleanup.
#[must_use]
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanedSessions {
    pub removed: usize,
}
