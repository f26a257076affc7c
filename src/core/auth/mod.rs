//! Authentication module
//!
//! This module provides authentication functionality including:
//! - Password hashing with bcrypt
//! - JWT session token issuance and validation
//! - User registration and login
//! - REST API endpoints for auth operations

pub mod api;
pub mod jwt;
pub mod password;
pub mod service;

pub use api::{AuthApiState, TOKEN_COOKIE, auth_api_router};
pub use jwt::{Claims, IssuedToken, JwtConfig, JwtError, JwtService, SessionIdentity};
pub use password::{PasswordError, PasswordHasher};
pub use service::{AuthError, AuthService, LoginOutcome, LoginRequest, RegisterRequest};
