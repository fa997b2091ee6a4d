//! User records and their persistence.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{Error, Result};

/// Role given to every registered user.
pub const ROLE_USER: &str = "user";

/// Role required by admin procedures.
pub const ROLE_ADMIN: &str = "admin";

/// A persisted user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub email_verified: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub banned: bool,
    pub two_factor_enabled: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Data needed to create a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

impl NewUser {
    /// Creates a regular user.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: ROLE_USER.to_owned(),
        }
    }

    /// Overrides the role.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }
}

/// Core trait for user persistence.
///
/// Emails are stored and looked up lower-cased.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Creates a user, failing with a conflict when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Replaces the password hash, returning `false` for an unknown user.
    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<bool>;

    /// Replaces the role, returning `false` for an unknown user.
    async fn update_role(&self, id: Uuid, role: String) -> Result<bool>;

    /// Bans or unbans a user, returning `false` for an unknown user.
    async fn set_banned(&self, id: Uuid, banned: bool) -> Result<bool>;
}

/// Per-process user store.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    async fn update(&self, id: Uuid, f: impl FnOnce(&mut User)) -> bool {
        let mut users = self.users.write().await;
        match users.get_mut(&id) {
            Some(user) => {
                f(user);
                user.updated_at = Timestamp::now();
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let email = user.email.to_lowercase();
        let mut users = self.users.write().await;

        if users.values().any(|existing| existing.email == email) {
            return Err(Error::conflict(format!("user email {email} already exists")));
        }

        let now = Timestamp::now();
        let user = User {
            id: Uuid::now_v7(),
            name: user.name,
            email,
            email_verified: false,
            password_hash: user.password_hash,
            role: user.role,
            banned: false,
            two_factor_enabled: false,
            created_at: now,
            updated_at: now,
        };

        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn update_password(&self, id: Uuid, password_hash: String) -> Result<bool> {
        Ok(self
            .update(id, |user| user.password_hash = password_hash)
            .await)
    }

    async fn update_role(&self, id: Uuid, role: String) -> Result<bool> {
        Ok(self.update(id, |user| user.role = role).await)
    }

    async fn set_banned(&self, id: Uuid, banned: bool) -> Result<bool> {
        Ok(self.update(id, |user| user.banned = banned).await)
    }
}

/// User repository shared through the application state.
#[derive(Clone)]
pub struct UserRepository {
    inner: Arc<dyn UserStore>,
}

impl fmt::Debug for UserRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRepository").finish_non_exhaustive()
    }
}

impl Default for UserRepository {
    fn default() -> Self {
        Self::new(MemoryUserStore::default())
    }
}

impl UserRepository {
    /// Wraps a [`UserStore`] implementation.
    pub fn new<S>(store: S) -> Self
    where
        S: UserStore + 'static,
    {
        Self {
            inner: Arc::new(store),
        }
    }

    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        self.inner.find_user_by_id(id).await
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.inner.find_user_by_email(email).await
    }

    pub async fn create_user(&self, user: NewUser) -> Result<User> {
        self.inner.create_user(user).await
    }

    pub async fn update_password(&self, id: Uuid, password_hash: String) -> Result<bool> {
        self.inner.update_password(id, password_hash).await
    }

    pub async fn update_role(&self, id: Uuid, role: impl Into<String>) -> Result<bool> {
        self.inner.update_role(id, role.into()).await
    }

    pub async fn set_banned(&self, id: Uuid, banned: bool) -> Result<bool> {
        self.inner.set_banned(id, banned).await
    }
}
