//! User repository for database operations
//!
//! Uniqueness of username and email is enforced by the `users_username_key`
//! and `users_email_key` indexes; inserts never check for existing rows first.

use std::future::Future;

use sqlx::PgPool;

use crate::core::db::models::User;

/// User repository error types
#[derive(Debug, thiserror::Error)]
pub enum UserRepositoryError {
    #[error("User not found")]
    NotFound,

    #[error("Username or email already exists")]
    DuplicateIdentity,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

/// Persistence operations the auth service needs
pub trait UserStore: Clone + Send + Sync + 'static {
    /// Insert a user, failing with `DuplicateIdentity` if the username or
    /// email is taken
    fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> impl Future<Output = Result<User, UserRepositoryError>> + Send;

    /// Exact-match lookup by username
    fn find_by_username(
        &self,
        username: &str,
    ) -> impl Future<Output = Result<User, UserRepositoryError>> + Send;

    /// Count total users
    fn count(&self) -> impl Future<Output = Result<i64, UserRepositoryError>> + Send;
}

/// PostgreSQL-backed user store
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl UserStore for UserRepository {
    async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User, UserRepositoryError> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                Err(UserRepositoryError::DuplicateIdentity)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_username(&self, username: &str) -> Result<User, UserRepositoryError> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(UserRepositoryError::NotFound)
    }

    async fn count(&self) -> Result<i64, UserRepositoryError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }
}
