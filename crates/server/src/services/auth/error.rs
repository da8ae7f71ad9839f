//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during identity resolution.
///
/// Credential errors (`MissingCredential`, `InvalidSignature`,
/// `MalformedCredential`, `Expired`) mean "log in again"; `Banned` means
/// "contact support". The distinction is surfaced to clients via the stable
/// [`code`](AuthError::code).
#[derive(Debug, Error)]
pub enum AuthError {
    /// No credential was supplied on the request.
    #[error("missing credential")]
    MissingCredential,

    /// The init-data signature does not match the bot token.
    #[error("invalid signature")]
    InvalidSignature,

    /// The credential payload could not be parsed.
    #[error("malformed credential")]
    MalformedCredential,

    /// The credential's auth_date is older than the configured TTL.
    #[error("credential expired")]
    Expired,

    /// The resolved user is banned.
    #[error("user is banned")]
    Banned,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl AuthError {
    /// Stable machine-readable code for the error body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::InvalidSignature => "invalid_signature",
            Self::MalformedCredential => "malformed_credential",
            Self::Expired => "expired",
            Self::Banned => "banned",
            Self::Repository(_) => "internal",
        }
    }
}
