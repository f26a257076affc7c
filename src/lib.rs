//! userauth - account registration and cookie-based sessions
//!
//! A small HTTP backend that registers users, checks their passwords and
//! hands out signed session tokens in a `token` cookie.

pub mod core;
