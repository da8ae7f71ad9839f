//! Telegram Mini App identity verification.
//!
//! A Mini App client proves its session by presenting the init data the
//! Telegram client handed it: a query-string-shaped blob carrying a `user`
//! JSON sub-document, an `auth_date` unix timestamp, and an HMAC-SHA256
//! `hash` over the remaining fields, keyed by a value derived from the bot
//! token.
//!
//! Every request is verified independently against the live bot token and
//! the live ban flag - results are never cached, so a ban takes effect on
//! the very next request.

mod error;

pub use error::AuthError;

use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use sha2::Sha256;
use sqlx::PgPool;

use minishop_core::{TelegramId, UserId, UserRole};

use crate::db::users::UserRepository;
use crate::models::TelegramProfile;

/// Default credential time-to-live: 24 hours.
pub const DEFAULT_AUTH_TTL: Duration = Duration::from_secs(86_400);

/// Domain-separation constant for the derived signing key, fixed by the
/// Telegram Mini App protocol.
const SIGNING_DOMAIN: &[u8] = b"WebAppData";

const HASH_FIELD: &str = "hash";
const USER_FIELD: &str = "user";
const AUTH_DATE_FIELD: &str = "auth_date";

/// Telegram ID of the identity synthesized in debug mode.
const DEBUG_TELEGRAM_ID: i64 = 1;

type HmacSha256 = Hmac<Sha256>;

/// How a request presented its credential.
///
/// All three variants resolve to the same [`Identity`] shape so downstream
/// code never special-cases them.
#[derive(Debug)]
pub enum Credential {
    /// Raw init data to be fully verified: signature, shape, freshness.
    Signed(String),
    /// Legacy compatibility shim: init data accepted without signature or
    /// freshness checks. The embedded profile is trusted as-is; the upsert
    /// and ban check still run.
    Fallback(String),
    /// Debug/test mode: a fixed identity with no verification and no
    /// database write.
    Debug,
}

/// The resolved, request-scoped caller identity.
///
/// Constructed per request from a fresh credential; never cached across
/// requests and never persisted itself (the `users` row is).
#[derive(Debug, Clone, Serialize)]
pub struct Identity {
    /// Telegram user ID.
    pub telegram_id: TelegramId,
    /// First name from the credential profile.
    pub first_name: String,
    /// Last name from the credential profile.
    pub last_name: Option<String>,
    /// @username from the credential profile.
    pub username: Option<String>,
    /// Profile photo URL from the credential profile.
    pub photo_url: Option<String>,
    /// Role derived from the admin allowlist.
    pub role: UserRole,
    /// Persisted user row ID. Absent only for identities that never touched
    /// the store (debug mode).
    pub user_id: Option<UserId>,
    /// True when the identity came from an unverified credential path
    /// (fallback or debug) rather than a checked signature.
    pub from_credential_only: bool,
}

impl Identity {
    /// Display name: "First Last" or just "First".
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

/// Verify the init-data signature against the bot token.
///
/// The data-check string is every field except `hash`, sorted by key and
/// joined as `key=value` lines with `\n`. The signing key is
/// `HMAC-SHA256(key = "WebAppData", msg = bot_token)`. Any missing or
/// malformed piece yields `false`; this function never panics.
#[must_use]
pub fn verify_init_data(init_data: &str, bot_token: &str) -> bool {
    let mut pairs: Vec<(String, String)> = url::form_urlencoded::parse(init_data.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let Some(hash_pos) = pairs.iter().position(|(k, _)| k == HASH_FIELD) else {
        return false;
    };
    let provided = pairs.remove(hash_pos).1;

    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let data_check_string = pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("\n");

    let Ok(mut key_mac) = HmacSha256::new_from_slice(SIGNING_DOMAIN) else {
        return false;
    };
    key_mac.update(bot_token.as_bytes());
    let derived_key = key_mac.finalize().into_bytes();

    let Ok(mut mac) = HmacSha256::new_from_slice(&derived_key) else {
        return false;
    };
    mac.update(data_check_string.as_bytes());
    let computed = hex::encode(mac.finalize().into_bytes());

    computed == provided.to_lowercase()
}

/// Extract the profile sub-document and `auth_date` from init data.
///
/// Returns `None` if the `user` field is missing, is not valid JSON, or
/// lacks the mandatory `id`/`first_name`. A missing or unparseable
/// `auth_date` comes back as `0`, which freshness checking rejects as
/// expired.
#[must_use]
pub fn parse_init_data(init_data: &str) -> Option<(TelegramProfile, i64)> {
    let mut user_json: Option<String> = None;
    let mut auth_date: Option<String> = None;

    for (k, v) in url::form_urlencoded::parse(init_data.as_bytes()) {
        match k.as_ref() {
            USER_FIELD => user_json = Some(v.into_owned()),
            AUTH_DATE_FIELD => auth_date = Some(v.into_owned()),
            _ => {}
        }
    }

    let profile: TelegramProfile = serde_json::from_str(&user_json?).ok()?;
    let auth_date = auth_date.and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);

    Some((profile, auth_date))
}

/// Check that `auth_date` is within `ttl` of `now` (both unix seconds).
///
/// A zero or negative `auth_date` (missing from the credential) is treated
/// as expired.
fn check_freshness(auth_date: i64, now: i64, ttl: Duration) -> Result<(), AuthError> {
    if auth_date <= 0 {
        return Err(AuthError::Expired);
    }

    let ttl_secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX);
    if now - auth_date > ttl_secs {
        return Err(AuthError::Expired);
    }

    Ok(())
}

/// Resolves credentials into identities.
///
/// Holds the bot token, the immutable admin allowlist, and the freshness
/// window; everything else comes in per call, which keeps the resolver free
/// of ambient state.
pub struct IdentityResolver {
    bot_token: SecretString,
    admin_ids: Vec<TelegramId>,
    ttl: Duration,
}

impl IdentityResolver {
    /// Create a resolver with an explicit admin allowlist and TTL.
    #[must_use]
    pub const fn new(bot_token: SecretString, admin_ids: Vec<TelegramId>, ttl: Duration) -> Self {
        Self {
            bot_token,
            admin_ids,
            ttl,
        }
    }

    /// Role for a Telegram ID: exact allowlist match or plain user.
    #[must_use]
    pub fn role_for(&self, telegram_id: TelegramId) -> UserRole {
        if self.admin_ids.contains(&telegram_id) {
            UserRole::Admin
        } else {
            UserRole::User
        }
    }

    /// Resolve a credential into an [`Identity`], short-circuiting on the
    /// first failure.
    ///
    /// The signed path runs signature, shape, and freshness checks; the
    /// fallback path skips them and trusts the embedded profile. Both upsert
    /// the user row in one atomic statement and then enforce the ban flag -
    /// a banned identity is discarded, never returned.
    ///
    /// # Errors
    ///
    /// `InvalidSignature`, `MalformedCredential`, or `Expired` for
    /// credential failures; `Banned` for banned users; `Repository` if the
    /// upsert fails.
    pub async fn resolve(
        &self,
        pool: &PgPool,
        credential: Credential,
    ) -> Result<Identity, AuthError> {
        let (profile, from_credential_only) = match credential {
            Credential::Signed(init_data) => {
                if !verify_init_data(&init_data, self.bot_token.expose_secret()) {
                    return Err(AuthError::InvalidSignature);
                }
                let (profile, auth_date) =
                    parse_init_data(&init_data).ok_or(AuthError::MalformedCredential)?;
                check_freshness(auth_date, Utc::now().timestamp(), self.ttl)?;
                (profile, false)
            }
            Credential::Fallback(init_data) => {
                let (profile, _) =
                    parse_init_data(&init_data).ok_or(AuthError::MalformedCredential)?;
                tracing::warn!(
                    telegram_id = %profile.telegram_id,
                    "accepted unverified fallback credential"
                );
                (profile, true)
            }
            Credential::Debug => return Ok(self.debug_identity()),
        };

        let role = self.role_for(profile.telegram_id);
        let user = UserRepository::new(pool)
            .upsert_from_profile(&profile, role)
            .await?;

        if user.is_banned {
            return Err(AuthError::Banned);
        }

        Ok(Identity {
            telegram_id: user.telegram_id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            photo_url: user.photo_url,
            role: user.role,
            user_id: Some(user.id),
            from_credential_only,
        })
    }

    /// The fixed identity used by debug/test mode. No database write, so
    /// `user_id` is `None`.
    #[must_use]
    pub fn debug_identity(&self) -> Identity {
        let telegram_id = TelegramId::new(DEBUG_TELEGRAM_ID);
        Identity {
            telegram_id,
            first_name: "Test".to_owned(),
            last_name: None,
            username: Some("minishop_test".to_owned()),
            photo_url: None,
            role: self.role_for(telegram_id),
            user_id: None,
            from_credential_only: true,
        }
    }
}
