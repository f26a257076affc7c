//! Core domain logic: configuration, authentication and persistence

pub mod auth;
pub mod config;
pub mod db;
