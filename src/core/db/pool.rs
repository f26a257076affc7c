//! Database connection pool management
//!
//! This module provides connection pool setup, the startup ping, and the
//! schema bootstrap for PostgreSQL using SQLx.

use std::fmt;
use std::time::Duration;

use sqlx::{
    PgPool,
    postgres::{PgConnectOptions, PgPoolOptions},
};

use crate::core::config::Config;

/// Statements run at startup, in order. The unique indexes must exist before
/// the server accepts any write.
const SCHEMA_STATEMENTS: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
        username TEXT NOT NULL,
        email TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS users_username_key ON users (username)",
    "CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (email)",
];

/// Database configuration
#[derive(Clone)]
pub struct DbConfig {
    /// Database host
    pub host: String,
    /// Database port (driver default when unset)
    pub port: Option<u16>,
    /// Login user
    pub username: String,
    /// Login password
    pub password: String,
    /// Database name
    pub database: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to keep open
    pub min_connections: u32,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Idle timeout for connections in seconds
    pub idle_timeout_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: None,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            idle_timeout_secs: 600,
        }
    }
}

impl DbConfig {
    /// Build database settings from the application config
    pub fn from_config(config: &Config) -> Self {
        Self {
            host: config.db_host().to_string(),
            port: config.db_port(),
            username: config.db_user.clone(),
            password: config.db_pass.clone(),
            database: config.db_database.clone(),
            max_connections: config.db_max_connections,
            ..Default::default()
        }
    }

    /// Driver connection options
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database);

        match self.port {
            Some(port) => options.port(port),
            None => options,
        }
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("idle_timeout_secs", &self.idle_timeout_secs)
            .finish()
    }
}

/// Database errors
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to database: {0}")]
    ConnectionError(#[source] sqlx::Error),

    #[error("Could not ping database: {0}")]
    PingError(#[source] sqlx::Error),

    #[error("Could not create user schema: {0}")]
    SchemaError(#[source] sqlx::Error),
}

/// Create a new database connection pool
pub async fn create_pool(config: &DbConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect_with(config.connect_options())
        .await
        .map_err(DbError::ConnectionError)?;

    Ok(pool)
}

/// Create pool, verify it answers, and bootstrap the schema
pub async fn create_pool_with_schema(config: &DbConfig) -> Result<PgPool, DbError> {
    let pool = create_pool(config).await?;
    health_check(&pool).await?;
    tracing::info!("Connected to database {}", config.database);

    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Create the users table and its unique indexes if they are missing
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DbError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(DbError::SchemaError)?;
    }

    tracing::info!("User table and unique indexes ready");
    Ok(())
}

/// Check database health
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(DbError::PingError)?;
    Ok(())
}
