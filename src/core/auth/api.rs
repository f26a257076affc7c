//! Auth API endpoints
//!
//! Provides REST API endpoints for authentication:
//! - POST /api/users - Register a new user
//! - POST /api/users/login - Login and receive the `token` cookie
//! - GET /api/users/me - Identity from the `token` cookie
//! - POST /api/users/logout - Expire the `token` cookie

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use time::OffsetDateTime;

use crate::core::auth::jwt::{Claims, IssuedToken};
use crate::core::auth::{AuthError, AuthService, LoginRequest, RegisterRequest};
use crate::core::db::models::{CreatedUser, PublicUser};
use crate::core::db::repositories::UserStore;

/// Name of the session cookie
pub const TOKEN_COOKIE: &str = "token";

/// Auth API state containing the auth service
#[derive(Clone)]
pub struct AuthApiState<S> {
    pub auth_service: AuthService<S>,
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub success: bool,
    pub error: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Convert AuthError to API response
impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::BadInput | AuthError::DuplicateIdentity => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::InvalidClaims => StatusCode::UNAUTHORIZED,
            AuthError::Hashing(_) | AuthError::TokenSigning(_) | AuthError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        if let Some(detail) = self.detail() {
            tracing::error!("{}: {}", self, detail);
        }

        (status, Json(ApiError::new(self.to_string()))).into_response()
    }
}

/// Response for registration
#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub user: CreatedUser,
}

/// Response for login
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub user: PublicUser,
}

/// Identity as carried in the session token
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionUser {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub username: String,
    pub email: String,
}

impl From<Claims> for SessionUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.user_id,
            username: claims.username,
            email: claims.email,
        }
    }
}

/// Response for the current session
#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub success: bool,
    pub user: SessionUser,
}

/// Generic success response
#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
    pub message: String,
}

/// Create the auth API router
pub fn auth_api_router<S: UserStore>(state: AuthApiState<S>) -> Router {
    let state = Arc::new(state);

    Router::new()
        .route("/api/users", post(register_handler::<S>))
        .route("/api/users/login", post(login_handler::<S>))
        .route("/api/users/me", get(me_handler::<S>))
        .route("/api/users/logout", post(logout_handler))
        .with_state(state)
}

/// Map a body that failed to parse to `BadInput`
fn parse_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AuthError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        tracing::debug!("Rejected request body: {}", rejection);
        AuthError::BadInput
    })
}

/// Cookie carrying a freshly issued session token
fn session_cookie(token: &IssuedToken) -> Cookie<'static> {
    let mut cookie = Cookie::build((TOKEN_COOKIE, token.token.clone()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build();

    // Out-of-range timestamps fall back to a session cookie
    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(token.expires_at.timestamp()) {
        cookie.set_expires(expires);
    }

    cookie
}

/// Empty cookie that is already expired, telling the client to drop it
fn expired_cookie() -> Cookie<'static> {
    Cookie::build((TOKEN_COOKIE, ""))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .expires(OffsetDateTime::now_utc() - time::Duration::hours(1))
        .build()
}

/// POST /api/users
/// Register a new user
async fn register_handler<S: UserStore>(
    State(state): State<Arc<AuthApiState<S>>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    let request = parse_body(payload)?;

    tracing::info!("Registration attempt for username: {}", request.username);

    let user = state.auth_service.register(request).await?;

    tracing::info!("User registered successfully: {}", user.username);

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            success: true,
            message: "User created successfully".to_string(),
            user: user.into(),
        }),
    ))
}

/// POST /api/users/login
/// Login and receive the session cookie
async fn login_handler<S: UserStore>(
    State(state): State<Arc<AuthApiState<S>>>,
    jar: CookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthError> {
    let request = parse_body(payload)?;

    tracing::info!("Login attempt for username: {}", request.username);

    let outcome = state.auth_service.login(request).await?;

    tracing::info!("User logged in successfully: {}", outcome.user.username);

    Ok((
        jar.add(session_cookie(&outcome.token)),
        Json(LoginResponse {
            success: true,
            user: PublicUser::from(&outcome.user),
        }),
    ))
}

/// GET /api/users/me
/// Get the identity stored in the session token
async fn me_handler<S: UserStore>(
    State(state): State<Arc<AuthApiState<S>>>,
    jar: CookieJar,
) -> Result<Json<MeResponse>, AuthError> {
    let token = jar.get(TOKEN_COOKIE).map(|cookie| cookie.value());

    let claims = state.auth_service.current_user(token).inspect_err(|e| {
        tracing::debug!("Session rejected: {}", e);
    })?;

    Ok(Json(MeResponse {
        success: true,
        user: claims.into(),
    }))
}

/// POST /api/users/logout
/// Expire the session cookie. The token itself stays valid until it expires.
async fn logout_handler(jar: CookieJar) -> (CookieJar, Json<SuccessResponse>) {
    tracing::info!("Logout request");

    (
        jar.add(expired_cookie()),
        Json(SuccessResponse {
            success: true,
            message: "Logged out successfully".to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::jwt::{JwtConfig, JwtService, SessionIdentity};
    use crate::core::auth::password::{MIN_COST, PasswordHasher};
    use crate::core::db::models::User;
    use crate::core::db::repositories::{MemoryUserStore, UserRepositoryError};
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use chrono::{Duration, Utc};
    use tower::ServiceExt;

    const SECRET: &str = "test_secret_key_for_testing_only_32bytes!";

    fn create_test_app() -> (Router, MemoryUserStore) {
        let store = MemoryUserStore::new();
        let auth_service = AuthService::new(
            store.clone(),
            PasswordHasher::new(MIN_COST),
            JwtService::new(JwtConfig::new(SECRET)),
        );
        (auth_api_router(AuthApiState { auth_service }), store)
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn me_request(cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("GET").uri("/api/users/me");
        if let Some(value) = cookie {
            builder = builder.header(header::COOKIE, format!("{}={}", TOKEN_COOKIE, value));
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn set_cookie(response: &Response) -> Cookie<'static> {
        let value = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("Set-Cookie header")
            .to_str()
            .unwrap()
            .to_string();
        Cookie::parse(value).unwrap()
    }

    async fn register(app: &Router, username: &str, email: &str, password: &str) -> Response {
        let body = format!(
            r#"{{"username": "{}", "email": "{}", "password": "{}"}}"#,
            username, email, password
        );
        send(app, json_request("/api/users", &body)).await
    }

    async fn login(app: &Router, username: &str, password: &str, remember: bool) -> Response {
        let body = format!(
            r#"{{"username": "{}", "password": "{}", "rememberme": {}}}"#,
            username, password, remember
        );
        send(app, json_request("/api/users/login", &body)).await
    }

    fn seconds_until(cookie: &Cookie<'_>) -> i64 {
        let expires = cookie.expires_datetime().expect("cookie expiry");
        (expires - OffsetDateTime::now_utc()).whole_seconds()
    }

    // ========================================================================
    // End-to-end
    // ========================================================================

    #[tokio::test]
    async fn test_register_login_me_logout() {
        let (app, _) = create_test_app();

        let response = register(&app, "alice", "a@x.com", "secret1").await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = login(&app, "alice", "secret1", false).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = set_cookie(&response);
        assert_eq!(cookie.name(), TOKEN_COOKIE);

        let response = send(&app, me_request(Some(cookie.value()))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["user"]["username"], "alice");
        assert_eq!(json["user"]["email"], "a@x.com");

        let response = send(&app, json_request("/api/users/logout", "")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let cleared = set_cookie(&response);
        assert_eq!(cleared.value(), "");
        assert!(seconds_until(&cleared) < 0);
    }

    // ========================================================================
    // Register
    // ========================================================================

    #[tokio::test]
    async fn test_register_response_omits_password() {
        let (app, store) = create_test_app();

        let response = register(&app, "alice", "a@x.com", "secret1").await;
        let json = body_json(response).await;

        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "User created successfully");
        assert_eq!(json["user"]["username"], "alice");
        assert_eq!(json["user"]["email"], "a@x.com");
        assert!(json["user"].get("password").is_none());
        assert!(json["user"].get("password_hash").is_none());

        let stored = store.find_by_username("alice").await.unwrap();
        assert_eq!(json["user"]["id"], stored.id.to_string());
        assert!(!json.to_string().contains(&stored.password_hash));
    }

    #[tokio::test]
    async fn test_register_duplicate_username_or_email() {
        let (app, store) = create_test_app();
        register(&app, "alice", "a@x.com", "secret1").await;

        for (username, email) in [("alice", "b@x.com"), ("bob", "a@x.com")] {
            let response = register(&app, username, email, "secret2").await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let json = body_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["error"], "Username or Email already exists");
        }

        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_register_bad_input() {
        let (app, store) = create_test_app();

        let bodies = [
            "not json",
            r#"{"username": "alice"}"#,
            r#"{"username": "", "email": "a@x.com", "password": "secret1"}"#,
        ];

        for body in bodies {
            let response = send(&app, json_request("/api/users", body)).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);

            let json = body_json(response).await;
            assert_eq!(json["success"], false);
            assert_eq!(json["error"], "Invalid request");
        }

        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_without_content_type_is_bad_input() {
        let (app, _) = create_test_app();

        let request = Request::builder()
            .method("POST")
            .uri("/api/users")
            .body(Body::from(
                r#"{"username": "alice", "email": "a@x.com", "password": "secret1"}"#,
            ))
            .unwrap();

        let response = send(&app, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ========================================================================
    // Login
    // ========================================================================

    #[tokio::test]
    async fn test_login_response_and_cookie_attributes() {
        let (app, _) = create_test_app();
        register(&app, "alice", "a@x.com", "secret1").await;

        let response = login(&app, "alice", "secret1", false).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = set_cookie(&response);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
        assert_eq!(cookie.path(), Some("/"));
        assert!(!cookie.value().is_empty());

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["user"]["username"], "alice");
        assert_eq!(json["user"]["email"], "a@x.com");
        assert!(json["user"].get("password").is_none());
        assert!(json["user"].get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_login_cookie_expiry_tiers() {
        let (app, _) = create_test_app();
        register(&app, "alice", "a@x.com", "secret1").await;

        let short = set_cookie(&login(&app, "alice", "secret1", false).await);
        let long = set_cookie(&login(&app, "alice", "secret1", true).await);

        assert!((seconds_until(&short) - 24 * 3600).abs() <= 5);
        assert!((seconds_until(&long) - 7 * 24 * 3600).abs() <= 5);
    }

    #[tokio::test]
    async fn test_login_remember_me_absent_uses_short_tier() {
        let (app, _) = create_test_app();
        register(&app, "alice", "a@x.com", "secret1").await;

        let response = send(
            &app,
            json_request(
                "/api/users/login",
                r#"{"username": "alice", "password": "secret1"}"#,
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = set_cookie(&response);
        assert!((seconds_until(&cookie) - 24 * 3600).abs() <= 5);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (app, _) = create_test_app();
        register(&app, "alice", "a@x.com", "secret1").await;

        let wrong_password = login(&app, "alice", "wrong", false).await;
        let unknown_user = login(&app, "nobody", "secret1", false).await;

        assert_eq!(wrong_password.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(unknown_user.status(), StatusCode::UNAUTHORIZED);
        assert!(wrong_password.headers().get(header::SET_COOKIE).is_none());

        let wrong_password = body_json(wrong_password).await;
        let unknown_user = body_json(unknown_user).await;
        assert_eq!(wrong_password, unknown_user);
        assert_eq!(wrong_password["error"], "Invalid username or password");
    }

    #[tokio::test]
    async fn test_login_bad_input() {
        let (app, _) = create_test_app();

        let response = send(&app, json_request("/api/users/login", "{")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    // ========================================================================
    // Me
    // ========================================================================

    #[tokio::test]
    async fn test_me_returns_token_claims() {
        let (app, store) = create_test_app();
        register(&app, "alice", "a@x.com", "secret1").await;
        let cookie = set_cookie(&login(&app, "alice", "secret1", false).await);

        let json = body_json(send(&app, me_request(Some(cookie.value()))).await).await;

        let stored = store.find_by_username("alice").await.unwrap();
        assert_eq!(json["user"]["userId"], stored.id.to_string());
    }

    #[tokio::test]
    async fn test_me_without_cookie() {
        let (app, _) = create_test_app();

        let response = send(&app, me_request(None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Unauthorized");
    }

    #[tokio::test]
    async fn test_me_rejects_bad_tokens() {
        let (app, _) = create_test_app();
        let identity = SessionIdentity {
            user_id: uuid::Uuid::new_v4(),
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
        };

        let expired = JwtService::new(JwtConfig::new(SECRET))
            .issue(&identity, Duration::seconds(-10))
            .unwrap();
        let foreign = JwtService::new(JwtConfig::new("a_different_secret"))
            .issue(&identity, Duration::hours(1))
            .unwrap();

        for token in ["malformed", expired.token.as_str(), foreign.token.as_str()] {
            let response = send(&app, me_request(Some(token))).await;
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

            let json = body_json(response).await;
            assert_eq!(json["error"], "Invalid token");
        }
    }

    #[tokio::test]
    async fn test_me_rejects_wrong_claims_shape() {
        let (app, _) = create_test_app();

        #[derive(Serialize)]
        struct Partial {
            sub: String,
            exp: i64,
        }

        let token = jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Partial {
                sub: "alice".to_string(),
                exp: (Utc::now() + Duration::hours(1)).timestamp(),
            },
            &jsonwebtoken::EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let response = send(&app, me_request(Some(&token))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid token claims");
    }

    // ========================================================================
    // Logout
    // ========================================================================

    #[tokio::test]
    async fn test_logout_without_session() {
        let (app, _) = create_test_app();

        let response = send(&app, json_request("/api/users/logout", "")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let cookie = set_cookie(&response);
        assert_eq!(cookie.name(), TOKEN_COOKIE);
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert!(seconds_until(&cookie) < 0);

        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "Logged out successfully");
    }

    #[tokio::test]
    async fn test_token_still_valid_after_logout() {
        let (app, _) = create_test_app();
        register(&app, "alice", "a@x.com", "secret1").await;
        let cookie = set_cookie(&login(&app, "alice", "secret1", false).await);

        send(&app, json_request("/api/users/logout", "")).await;

        // Stateless sessions: a retained token keeps working until it expires
        let response = send(&app, me_request(Some(cookie.value()))).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    // ========================================================================
    // Serialization
    // ========================================================================

    #[test]
    fn test_api_error_serialization() {
        let json = serde_json::to_value(ApiError::new("Something went wrong")).unwrap();

        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Something went wrong");
    }

    #[tokio::test]
    async fn test_internal_errors_hide_detail() {
        let response = AuthError::Database("password authentication failed".to_string())
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Database operation failed");
        assert!(!json.to_string().contains("password authentication failed"));
    }

    // ========================================================================
    // Internal failures
    // ========================================================================

    /// Store whose backend is always unreachable
    #[derive(Clone)]
    struct UnavailableStore;

    impl UserStore for UnavailableStore {
        async fn create_user(
            &self,
            _username: &str,
            _email: &str,
            _password_hash: &str,
        ) -> Result<User, UserRepositoryError> {
            Err(sqlx::Error::PoolTimedOut.into())
        }

        async fn find_by_username(&self, _username: &str) -> Result<User, UserRepositoryError> {
            Err(sqlx::Error::PoolTimedOut.into())
        }

        async fn count(&self) -> Result<i64, UserRepositoryError> {
            Err(sqlx::Error::PoolTimedOut.into())
        }
    }

    fn app_with<S: UserStore>(store: S, hasher: PasswordHasher) -> Router {
        let auth_service = AuthService::new(store, hasher, JwtService::new(JwtConfig::new(SECRET)));
        auth_api_router(AuthApiState { auth_service })
    }

    async fn assert_internal_error(response: Response, message: &str) {
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], message);
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_returns_generic_500() {
        let app = app_with(UnavailableStore, PasswordHasher::new(MIN_COST));

        let response = register(&app, "alice", "a@x.com", "secret1").await;
        assert_internal_error(response, "Database operation failed").await;

        let response = login(&app, "alice", "secret1", false).await;
        assert!(response.headers().get(header::SET_COOKIE).is_none());
        assert_internal_error(response, "Database operation failed").await;
    }

    #[tokio::test]
    async fn test_hashing_failure_returns_generic_500() {
        // bcrypt refuses work factors below 4
        let (_, store) = create_test_app();
        let app = app_with(store.clone(), PasswordHasher::new(MIN_COST - 1));

        let response = register(&app, "alice", "a@x.com", "secret1").await;
        assert_internal_error(response, "Error occurred while hashing password").await;
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_password_beyond_bcrypt_limit() {
        let (app, store) = create_test_app();

        let response = register(&app, "alice", "a@x.com", &"a".repeat(80)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.count().await.unwrap(), 0);

        let other_tail = format!("{}DIFFERENT", "a".repeat(72));
        let response = login(&app, "alice", &other_tail, false).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
