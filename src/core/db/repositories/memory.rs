//! In-process user store
//!
//! Test double for the PostgreSQL repository, used by the service and router
//! tests. The uniqueness check and the insert happen under a single write lock, so
//! concurrent registrations of the same identity cannot both succeed.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::user::{UserRepositoryError, UserStore};
use crate::core::db::models::User;

/// User store backed by a vector in memory
#[derive(Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<Vec<User>>>,
}

impl MemoryUserStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for MemoryUserStore {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, UserRepositoryError> {
        let mut users = self.users.write().await;

        if users
            .iter()
            .any(|u| u.username == username || u.email == email)
        {
            return Err(UserRepositoryError::DuplicateIdentity);
        }

        let user = User {
            id: Uuid::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        users.push(user.clone());

        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<User, UserRepositoryError> {
        self.users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(UserRepositoryError::NotFound)
    }

    async fn count(&self) -> Result<i64, UserRepositoryError> {
        Ok(self.users.read().await.len() as i64)
    }
}
