//! Read/write access to portal members needed by the account flows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::models::{UserAccount, UserStatus};
use crate::services::ServiceError;
use crate::utils::PasswordHashString;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Case-insensitive lookup.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, ServiceError>;

    /// Stamp the address as verified and activate the account.
    async fn mark_email_verified(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &PasswordHashString,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError>;

    async fn health_check(&self) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: Mutex<HashMap<Uuid, UserAccount>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user: UserAccount) {
        if let Ok(mut users) = self.users.lock() {
            users.insert(user.id, user);
        }
    }

    pub fn get(&self, user_id: Uuid) -> Option<UserAccount> {
        self.users
            .lock()
            .ok()
            .and_then(|users| users.get(&user_id).cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Uuid, UserAccount>>, ServiceError> {
        self.users
            .lock()
            .map_err(|e| ServiceError::Internal(anyhow::anyhow!("User directory mutex poisoned: {}", e)))
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, ServiceError> {
        let users = self.lock()?;
        Ok(users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn mark_email_verified(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let mut users = self.lock()?;
        if let Some(user) = users.get_mut(&user_id) {
            user.email_verified = Some(at);
            user.status = UserStatus::Active.as_str().to_string();
            user.updated_at = at;
        }
        Ok(())
    }

    async fn update_password_hash(
        &self,
        user_id: Uuid,
        password_hash: &PasswordHashString,
        at: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        let mut users = self.lock()?;
        if let Some(user) = users.get_mut(&user_id) {
            user.password_hash = Some(password_hash.as_str().to_string());
            user.updated_at = at;
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ServiceError> {
        self.lock().map(|_| ())
    }
}
