//! HTTP middleware and extractors.

pub mod auth;

pub use auth::{OptionalAuth, RequireAdmin, RequireAuth, require_auth};
