//! Authentication service
//!
//! Provides business logic for user registration, login, and session lookup.
//! Coordinates between the user store, the password hasher, and the JWT service.
//! Logout is handled entirely at the HTTP layer since sessions are stateless.

use serde::Deserialize;

use crate::core::auth::jwt::{Claims, IssuedToken, JwtError, JwtService, SessionIdentity};
use crate::core::auth::password::{PasswordError, PasswordHasher};
use crate::core::db::models::User;
use crate::core::db::repositories::{UserRepositoryError, UserStore};

/// Authentication service error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid request")]
    BadInput,

    #[error("Username or Email already exists")]
    DuplicateIdentity,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Unauthorized")]
    MissingToken,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token claims")]
    InvalidClaims,

    #[error("Error occurred while hashing password")]
    Hashing(String),

    #[error("Failed to generate token")]
    TokenSigning(String),

    #[error("Database operation failed")]
    Database(String),
}

impl AuthError {
    /// Detail for server-side logs; never sent to clients
    pub fn detail(&self) -> Option<&str> {
        match self {
            AuthError::Hashing(d) | AuthError::TokenSigning(d) | AuthError::Database(d) => {
                Some(d)
            }
            _ => None,
        }
    }
}

impl From<UserRepositoryError> for AuthError {
    fn from(err: UserRepositoryError) -> Self {
        match err {
            UserRepositoryError::NotFound => AuthError::InvalidCredentials,
            UserRepositoryError::DuplicateIdentity => AuthError::DuplicateIdentity,
            UserRepositoryError::DatabaseError(e) => AuthError::Database(e.to_string()),
        }
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::TooLong => AuthError::BadInput,
            PasswordError::Hashing(e) => AuthError::Hashing(e),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired | JwtError::InvalidToken => AuthError::InvalidToken,
            JwtError::InvalidClaims => AuthError::InvalidClaims,
            JwtError::EncodingError(e) => AuthError::TokenSigning(e),
        }
    }
}

/// Registration request data
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login request data
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    #[serde(default, rename = "rememberme")]
    pub remember_me: bool,
}

/// Successful login: the user record and the session token for it
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: IssuedToken,
}

/// Password behind the hash checked for unknown usernames
const UNKNOWN_USER_PASSWORD: &str = "unknown-user-placeholder";

/// Authentication service
#[derive(Clone)]
pub struct AuthService<S> {
    store: S,
    hasher: PasswordHasher,
    jwt_service: JwtService,
    /// Hash at the configured cost, verified when the username is unknown
    unknown_user_hash: String,
}

impl<S: UserStore> AuthService<S> {
    /// Create a new authentication service
    pub fn new(store: S, hasher: PasswordHasher, jwt_service: JwtService) -> Self {
        let unknown_user_hash = hasher.hash(UNKNOWN_USER_PASSWORD).unwrap_or_else(|e| {
            tracing::warn!("Failed to prepare unknown-user hash: {}", e);
            String::new()
        });

        Self {
            store,
            hasher,
            jwt_service,
            unknown_user_hash,
        }
    }

    /// Reject blank fields
    fn require(value: &str) -> Result<(), AuthError> {
        if value.trim().is_empty() {
            return Err(AuthError::BadInput);
        }
        Ok(())
    }

    /// Register a new user
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AuthError> {
        Self::require(&request.username)?;
        Self::require(&request.email)?;
        Self::require(&request.password)?;

        let password_hash = self.hasher.hash_async(request.password).await?;

        // Uniqueness is decided by the store in the same write
        let user = self
            .store
            .create_user(&request.username, &request.email, &password_hash)
            .await?;

        Ok(user)
    }

    /// Login an existing user and issue a session token
    pub async fn login(&self, request: LoginRequest) -> Result<LoginOutcome, AuthError> {
        // Unknown username and wrong password must be indistinguishable,
        // in the response and in the bcrypt work done before it
        let user = match self.store.find_by_username(&request.username).await {
            Ok(user) => user,
            Err(UserRepositoryError::NotFound) => {
                self.hasher
                    .verify_async(request.password, self.unknown_user_hash.clone())
                    .await;
                return Err(AuthError::InvalidCredentials);
            }
            Err(e) => return Err(e.into()),
        };

        let is_valid = self
            .hasher
            .verify_async(request.password, user.password_hash.clone())
            .await;

        if !is_valid {
            return Err(AuthError::InvalidCredentials);
        }

        let ttl = self.jwt_service.ttl_for(request.remember_me);
        let token = self.jwt_service.issue(&SessionIdentity::from(&user), ttl)?;

        Ok(LoginOutcome { user, token })
    }

    /// Resolve the identity embedded in a session token.
    ///
    /// Returns what the token says at issue time; the store is not consulted.
    pub fn current_user(&self, token: Option<&str>) -> Result<Claims, AuthError> {
        let token = token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        Ok(self.jwt_service.verify(token)?)
    }
}
