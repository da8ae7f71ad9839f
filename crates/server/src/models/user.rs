//! User domain types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use minishop_core::{TelegramId, UserId, UserRole};

/// The user sub-document embedded in a Telegram Mini App credential.
///
/// Deserialized from the URL-decoded `user` field of the init data. `id` and
/// `first_name` are mandatory; everything else is optional profile detail.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramProfile {
    /// Telegram user ID.
    #[serde(rename = "id")]
    pub telegram_id: TelegramId,
    /// First name (always present in Telegram profiles).
    pub first_name: String,
    /// Last name, if set.
    #[serde(default)]
    pub last_name: Option<String>,
    /// @username, if set.
    #[serde(default)]
    pub username: Option<String>,
    /// Profile photo URL, if shared.
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl TelegramProfile {
    /// Display name: "First Last" or just "First".
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

/// A persisted shop user.
///
/// Created by the first successful identity resolution for a Telegram ID and
/// updated on every subsequent one. Never deleted by the auth or checkout
/// paths.
#[derive(Debug, Clone)]
pub struct User {
    /// Unique user ID.
    pub id: UserId,
    /// Telegram user ID (unique, permanent external key).
    pub telegram_id: TelegramId,
    /// Telegram @username, if the user has one.
    pub username: Option<String>,
    /// First name from the Telegram profile.
    pub first_name: String,
    /// Last name from the Telegram profile.
    pub last_name: Option<String>,
    /// Profile photo URL from the Telegram profile.
    pub photo_url: Option<String>,
    /// Role derived from the admin allowlist.
    pub role: UserRole,
    /// Banned users fail identity resolution on every request.
    pub is_banned: bool,
    /// When the user was first seen.
    pub created_at: DateTime<Utc>,
    /// When the profile was last refreshed.
    pub updated_at: DateTime<Utc>,
}
