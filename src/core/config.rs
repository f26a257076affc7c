//! Application configuration from environment variables.
//!
//! Load configuration using `Config::from_env()` after calling `dotenvy::dotenv()`.
//! Every required value is checked here so that a bad deployment fails at
//! startup rather than on the first request.

use std::fmt;
use std::net::SocketAddr;

use crate::core::auth::password::{DEFAULT_COST, MAX_COST, MIN_COST};

/// Default listen address for the HTTP server
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Default size of the database connection pool
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// Database user name (`DB_USER`)
    pub db_user: String,

    /// Database password (`DB_PASS`)
    pub db_pass: String,

    /// Database host, optionally with a port (`DB_CLUSTER`)
    /// Example: db.internal:5432
    pub db_cluster: String,

    /// Database name (`DB_DATABASE`)
    pub db_database: String,

    /// Maximum number of pooled database connections (`DB_MAX_CONNECTIONS`)
    pub db_max_connections: u32,

    /// Secret used to sign session tokens (`JWT_SECRET_KEY`)
    pub jwt_secret_key: String,

    /// bcrypt work factor (`BCRYPT_COST`)
    pub bcrypt_cost: u32,

    /// Address the HTTP server listens on (`BIND_ADDR`)
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Call `dotenvy::dotenv()` before this to load from `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let db_user = required("DB_USER")?;
        let db_pass = required("DB_PASS")?;
        let db_cluster = required("DB_CLUSTER")?;
        let db_database = required("DB_DATABASE")?;
        let jwt_secret_key = required("JWT_SECRET_KEY")?;

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("BIND_ADDR"))?;

        let bcrypt_cost = match lookup("BCRYPT_COST") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|cost| (MIN_COST..=MAX_COST).contains(cost))
                .ok_or(ConfigError::Invalid("BCRYPT_COST"))?,
            None => DEFAULT_COST,
        };

        let db_max_connections = match lookup("DB_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::Invalid("DB_MAX_CONNECTIONS"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        // Reject a cluster value we could never connect to
        split_host_port(&db_cluster).ok_or(ConfigError::Invalid("DB_CLUSTER"))?;

        Ok(Self {
            db_user,
            db_pass,
            db_cluster,
            db_database,
            db_max_connections,
            jwt_secret_key,
            bcrypt_cost,
            bind_addr,
        })
    }

    /// Database host from `DB_CLUSTER`
    pub fn db_host(&self) -> &str {
        split_host_port(&self.db_cluster)
            .map(|(host, _)| host)
            .unwrap_or(&self.db_cluster)
    }

    /// Database port from `DB_CLUSTER`, if one was given
    pub fn db_port(&self) -> Option<u16> {
        split_host_port(&self.db_cluster).and_then(|(_, port)| port)
    }
}

/// Split `host[:port]`, returning `None` when the port is not a number
fn split_host_port(cluster: &str) -> Option<(&str, Option<u16>)> {
    match cluster.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => port.parse().ok().map(|p| (host, Some(p))),
        Some(_) => None,
        None => Some((cluster, None)),
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db_user", &self.db_user)
            .field("db_pass", &"<redacted>")
            .field("db_cluster", &self.db_cluster)
            .field("db_database", &self.db_database)
            .field("db_max_connections", &self.db_max_connections)
            .field("jwt_secret_key", &"<redacted>")
            .field("bcrypt_cost", &self.bcrypt_cost)
            .field("bind_addr", &self.bind_addr)
            .finish()
    }
}
