//! Password hashing with bcrypt
//!
//! Hashes are self-describing (`$2b$<cost>$<salt><digest>`), so verification
//! needs nothing but the stored string. bcrypt only reads the first 72 bytes
//! of its input (terminator included), so longer passwords are refused
//! instead of being silently truncated.

/// Default bcrypt work factor
pub const DEFAULT_COST: u32 = 10;

/// Lowest work factor bcrypt accepts
pub const MIN_COST: u32 = 4;

/// Highest work factor bcrypt accepts
pub const MAX_COST: u32 = 31;

/// Password hashing errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Password is longer than bcrypt can hash")]
    TooLong,
}

/// bcrypt hasher with a fixed work factor
#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    cost: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self { cost: DEFAULT_COST }
    }
}

impl PasswordHasher {
    /// Create a hasher with the given work factor
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    /// Hash a password using bcrypt with automatic salt generation
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        bcrypt::non_truncating_hash(password, self.cost).map_err(|e| match e {
            bcrypt::BcryptError::Truncation(_) => PasswordError::TooLong,
            e => PasswordError::Hashing(e.to_string()),
        })
    }

    /// Verify a password against a bcrypt hash.
    ///
    /// A malformed hash or an over-long password is treated as a mismatch.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        match bcrypt::non_truncating_verify(password, hash) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::debug!("Password verification rejected: {}", e);
                false
            }
        }
    }

    /// Hash on the blocking thread pool
    pub async fn hash_async(&self, password: String) -> Result<String, PasswordError> {
        let hasher = *self;
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| PasswordError::Hashing(e.to_string()))?
    }

    /// Verify on the blocking thread pool
    pub async fn verify_async(&self, password: String, hash: String) -> bool {
        let hasher = *self;
        match tokio::task::spawn_blocking(move || hasher.verify(&password, &hash)).await {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!("Password verification task failed: {}", e);
                false
            }
        }
    }
}
