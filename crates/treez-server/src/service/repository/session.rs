//! Refresh-token sessions stored in secondary storage.
//!
//! Keys:
//! - `session.<sha256(refresh token)>`: the [`Session`] record
//! - `user-sessions.<user id>`: token hashes of that user's sessions
//!
//! The raw refresh token is never stored.

use std::sync::Arc;
use std::time::Duration;

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::service::{DeviceInfo, SecondaryStorage};
use crate::{Error, Result, TRACING_TARGET_STORAGE};

const SESSION_PREFIX: &str = "session.";
const USER_SESSIONS_PREFIX: &str = "user-sessions.";

/// A persisted refresh-token session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: Uuid,
    /// SHA-256 of the refresh token, hex encoded.
    pub token_hash: String,
    pub device: DeviceInfo,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub user_id: Uuid,
    pub expires_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub last_used_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonated_by: Option<Uuid>,
}

impl Session {
    /// Returns `true` once the session has expired.
    #[inline]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

/// Data needed to create a session.
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token: String,
    pub user_id: Uuid,
    pub device: DeviceInfo,
    pub user_agent: Option<String>,
    pub expires_at: Timestamp,
}

/// Session repository over [`SecondaryStorage`].
#[derive(Debug, Clone)]
pub struct SessionRepository {
    storage: SecondaryStorage,
    // Serializes read-modify-write cycles of the per-user index.
    index_lock: Arc<Mutex<()>>,
}

impl SessionRepository {
    /// Creates a repository over `storage`.
    pub fn new(storage: SecondaryStorage) -> Self {
        Self {
            storage,
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Returns the hex-encoded SHA-256 of a refresh token.
    pub fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    fn session_key(token_hash: &str) -> String {
        format!("{SESSION_PREFIX}{token_hash}")
    }

    fn index_key(user_id: Uuid) -> String {
        format!("{USER_SESSIONS_PREFIX}{user_id}")
    }

    fn ttl_until(expires_at: Timestamp) -> Option<Duration> {
        let remaining = expires_at.duration_since(Timestamp::now());
        Duration::try_from(remaining.max(SignedDuration::ZERO)).ok()
    }

    /// Persists a new session for `session.token`.
    #[tracing::instrument(skip_all, target = TRACING_TARGET_STORAGE, fields(user_id = %session.user_id))]
    pub async fn create_session(&self, session: NewSession) -> Result<Session> {
        let now = Timestamp::now();
        if session.expires_at <= now {
            return Err(Error::internal("session", "session expiry is in the past"));
        }

        let record = Session {
            id: Uuid::now_v7(),
            token_hash: Self::hash_token(&session.token),
            ip_address: session.device.ip.clone(),
            device: session.device,
            user_agent: session.user_agent,
            user_id: session.user_id,
            expires_at: session.expires_at,
            created_at: now,
            updated_at: now,
            last_used_at: now,
            impersonated_by: None,
        };

        let ttl = Self::ttl_until(record.expires_at);
        self.storage
            .set_json(&Self::session_key(&record.token_hash), &record, ttl)
            .await?;

        let _guard = self.index_lock.lock().await;
        let mut index = self.load_index(record.user_id).await?;
        index.push(record.token_hash.clone());
        self.save_index(record.user_id, &index).await?;

        Ok(record)
    }

    /// Returns the unexpired session of a refresh token.
    pub async fn find_session_by_token(&self, token: &str) -> Result<Option<Session>> {
        self.find_session_by_hash(&Self::hash_token(token)).await
    }

    async fn find_session_by_hash(&self, token_hash: &str) -> Result<Option<Session>> {
        let session: Option<Session> = self
            .storage
            .get_json(&Self::session_key(token_hash))
            .await?;
        let now = Timestamp::now();
        Ok(session.filter(|session| !session.is_expired(now)))
    }

    /// Deletes the session of a refresh token.
    ///
    /// Returns the removed record only to the one caller that removed it, so
    /// the delete doubles as a claim on the token.
    #[tracing::instrument(skip_all, target = TRACING_TARGET_STORAGE)]
    pub async fn delete_session(&self, token: &str) -> Result<Option<Session>> {
        let token_hash = Self::hash_token(token);
        let key = Self::session_key(&token_hash);

        let Some(session) = self.storage.get_json::<Session>(&key).await? else {
            return Ok(None);
        };

        if !self.storage.delete(&key).await? {
            return Ok(None);
        }

        self.unindex(session.user_id, &[token_hash]).await?;
        Ok(Some(session))
    }

    /// Returns the unexpired sessions of a user, newest first.
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>> {
        let index = self.load_index(user_id).await?;
        let mut sessions = Vec::with_capacity(index.len());
        let mut stale = Vec::new();

        for token_hash in index {
            match self.find_session_by_hash(&token_hash).await? {
                Some(session) => sessions.push(session),
                None => stale.push(token_hash),
            }
        }

        if !stale.is_empty() {
            self.unindex(user_id, &stale).await?;
        }

        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(sessions)
    }

    /// Deletes every session of a user and returns how many were removed.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_STORAGE)]
    pub async fn delete_user_sessions(&self, user_id: Uuid) -> Result<usize> {
        let _guard = self.index_lock.lock().await;
        let index = self.load_index(user_id).await?;

        let mut removed = 0;
        for token_hash in &index {
            if self.storage.delete(&Self::session_key(token_hash)).await? {
                removed += 1;
            }
        }

        self.storage.delete(&Self::index_key(user_id)).await?;
        Ok(removed)
    }

    /// Deletes a user's sessions not used within `unused_days` days.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_STORAGE)]
    pub async fn cleanup_sessions(&self, user_id: Uuid, unused_days: u32) -> Result<usize> {
        // A window reaching past the earliest timestamp matches no session.
        let cutoff = Timestamp::now()
            .checked_sub(SignedDuration::from_hours(24 * i64::from(unused_days)))
            .unwrap_or(Timestamp::MIN);

        let mut removed = Vec::new();
        for session in self.list_sessions(user_id).await? {
            if session.last_used_at < cutoff
                && self
                    .storage
                    .delete(&Self::session_key(&session.token_hash))
                    .await?
            {
                removed.push(session.token_hash);
            }
        }

        if !removed.is_empty() {
            self.unindex(user_id, &removed).await?;
        }

        Ok(removed.len())
    }

    async fn load_index(&self, user_id: Uuid) -> Result<Vec<String>> {
        Ok(self
            .storage
            .get_json(&Self::index_key(user_id))
            .await?
            .unwrap_or_default())
    }

    async fn save_index(&self, user_id: Uuid, index: &[String]) -> Result<()> {
        let key = Self::index_key(user_id);
        if index.is_empty() {
            self.storage.delete(&key).await?;
            return Ok(());
        }
        self.storage.set_json(&key, &index, None).await
    }

    async fn unindex(&self, user_id: Uuid, token_hashes: &[String]) -> Result<()> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.load_index(user_id).await?;
        index.retain(|hash| !token_hashes.contains(hash));
        self.save_index(user_id, &index).await
    }
}
