//! JWT utilities for session token generation and validation
//!
//! Tokens are signed with HS256. Sessions last 24 hours by default and
//! 7 days when the client asks to be remembered. Tokens are stateless: there is
//! no revocation list, so a token stays valid until `exp` even after logout.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default session lifetime (24 hours)
const SESSION_TTL_HOURS: i64 = 24;

/// Session lifetime when "remember me" is set (7 days)
const REMEMBER_ME_TTL_DAYS: i64 = 7;

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for signing tokens
    pub secret: String,
    /// Default session lifetime in hours
    pub session_ttl_hours: i64,
    /// Remember-me session lifetime in days
    pub remember_me_ttl_days: i64,
}

impl JwtConfig {
    /// Create a new JWT configuration
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            session_ttl_hours: SESSION_TTL_HOURS,
            remember_me_ttl_days: REMEMBER_ME_TTL_DAYS,
        }
    }

    /// Token lifetime for a login request
    pub fn ttl_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            Duration::days(self.remember_me_ttl_days)
        } else {
            Duration::hours(self.session_ttl_hours)
        }
    }
}

/// JWT errors
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token encoding failed: {0}")]
    EncodingError(String),

    #[error("Token expired")]
    Expired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Invalid token claims")]
    InvalidClaims,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::Json(_) | ErrorKind::MissingRequiredClaim(_) => JwtError::InvalidClaims,
            _ => JwtError::InvalidToken,
        }
    }
}

/// Identity carried by a session token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: Uuid,
    pub username: String,
    pub email: String,
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User record ID
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Username
    pub username: String,
    /// User email
    pub email: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

/// A signed token together with its expiry
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// JWT service for token operations
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Create a new JWT service
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.secret.as_bytes());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Token lifetime for a login request
    pub fn ttl_for(&self, remember_me: bool) -> Duration {
        self.config.ttl_for(remember_me)
    }

    /// Sign a token for `identity` that expires `ttl` from now
    pub fn issue(&self, identity: &SessionIdentity, ttl: Duration) -> Result<IssuedToken, JwtError> {
        let now = Utc::now();
        let exp = now + ttl;

        let claims = Claims {
            user_id: identity.user_id.to_string(),
            username: identity.username.clone(),
            email: identity.email.clone(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingError(e.to_string()))?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
        })
    }

    /// Validate and decode a token.
    ///
    /// Only HMAC-signed tokens are accepted; a header naming any other
    /// algorithm is rejected before the signature is checked.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        // Header problems are token problems, not claims problems
        jsonwebtoken::decode_header(token).map_err(|_| JwtError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = vec![Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];
        // Set leeway to 0 for strict expiration checking
        validation.leeway = 0;

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation)?;

        Ok(token_data.claims)
    }
}
