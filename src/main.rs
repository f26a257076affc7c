use axum::{Router, routing::get};
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use userauth::core::auth::{
    AuthApiState, AuthService, JwtConfig, JwtService, PasswordHasher, auth_api_router,
};
use userauth::core::config::{Config, ConfigError};
use userauth::core::db::{DbConfig, DbError, UserRepository, create_pool_with_schema};

#[derive(Debug, Error)]
enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] DbError),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().inspect_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
    })?;

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: db_host={}, database={}, bcrypt_cost={}, secret_key={}",
        config.db_host(),
        config.db_database,
        config.bcrypt_cost,
        !config.jwt_secret_key.is_empty()
    );

    let pool = create_pool_with_schema(&DbConfig::from_config(&config))
        .await
        .inspect_err(|e| {
            tracing::error!("Failed to initialize database: {}", e);
        })?;

    let auth_service = AuthService::new(
        UserRepository::new(pool.clone()),
        PasswordHasher::new(config.bcrypt_cost),
        JwtService::new(JwtConfig::new(config.jwt_secret_key.clone())),
    );

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(auth_api_router(AuthApiState { auth_service }))
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!("listening on http://{}", config.bind_addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
