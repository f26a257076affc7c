//! Database models
//!
//! Entity structs that map to PostgreSQL tables, and the public views of them
//! that are safe to send to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::core::auth::jwt::SessionIdentity;

// ============================================================================
// User Model
// ============================================================================

/// User entity representing a registered user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Newly registered user as echoed back by registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<User> for CreatedUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
        }
    }
}

/// Public identity returned on login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
    pub username: String,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

impl From<&User> for SessionIdentity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password_hash: "$2b$10$abcdefghijklmnopqrstuv".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_user_serialization_skips_password_hash() {
        let json = serde_json::to_string(&sample_user()).unwrap();

        assert!(json.contains("alice"));
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("$2b$"));
    }

    #[test]
    fn test_created_user_from_user() {
        let user = sample_user();
        let id = user.id;
        let created: CreatedUser = user.into();

        assert_eq!(created.id, id);
        assert_eq!(created.username, "alice");
        assert_eq!(created.email, "a@x.com");
    }

    #[test]
    fn test_public_user_has_no_id_or_hash() {
        let json = serde_json::to_value(PublicUser::from(&sample_user())).unwrap();

        assert_eq!(json["username"], "alice");
        assert_eq!(json["email"], "a@x.com");
        assert!(json.get("id").is_none());
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_session_identity_uses_record_id() {
        let user = sample_user();
        let identity = SessionIdentity::from(&user);

        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.username, user.username);
    }
}
