//! User repository.
//!
//! The central operation here is the upsert keyed by Telegram ID: identity
//! resolution performs exactly one write per authenticated request, and that
//! write must be a single atomic statement. A separate exists-then-insert
//! would open a race window between two first requests from the same user.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::str::FromStr;

use minishop_core::{TelegramId, UserId, UserRole};

use super::RepositoryError;
use crate::models::User;
use crate::models::user::TelegramProfile;

/// Repository for user database operations.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: UserId,
    telegram_id: TelegramId,
    username: Option<String>,
    first_name: String,
    last_name: Option<String>,
    photo_url: Option<String>,
    role: String,
    is_banned: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = UserRole::from_str(&row.role)
            .map_err(|e| RepositoryError::DataCorruption(format!("invalid role in database: {e}")))?;

        Ok(Self {
            id: row.id,
            telegram_id: row.telegram_id,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            photo_url: row.photo_url,
            role,
            is_banned: row.is_banned,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl<'a> UserRepository<'a> {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create or refresh the user row for a verified Telegram profile.
    ///
    /// Profile fields and role are overwritten on every call; `is_banned` is
    /// never touched here, so a ban survives any number of re-resolutions.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored role is invalid.
    pub async fn upsert_from_profile(
        &self,
        profile: &TelegramProfile,
        role: UserRole,
    ) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            INSERT INTO users (telegram_id, username, first_name, last_name, photo_url, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (telegram_id) DO UPDATE SET
                username = EXCLUDED.username,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                photo_url = EXCLUDED.photo_url,
                role = EXCLUDED.role,
                updated_at = now()
            RETURNING id, telegram_id, username, first_name, last_name, photo_url,
                      role, is_banned, created_at, updated_at
            ",
        )
        .bind(profile.telegram_id)
        .bind(&profile.username)
        .bind(&profile.first_name)
        .bind(&profile.last_name)
        .bind(&profile.photo_url)
        .bind(role.as_str())
        .fetch_one(self.pool)
        .await?;

        row.try_into()
    }

    /// Get a user by Telegram ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored role is invalid.
    pub async fn get_by_telegram_id(
        &self,
        telegram_id: TelegramId,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, telegram_id, username, first_name, last_name, photo_url,
                   role, is_banned, created_at, updated_at
            FROM users
            WHERE telegram_id = $1
            ",
        )
        .bind(telegram_id)
        .fetch_optional(self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    /// Set or clear the ban flag for a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if no such user exists.
    /// Returns `RepositoryError::Database` for other database errors.
    pub async fn set_banned(
        &self,
        telegram_id: TelegramId,
        banned: bool,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE users
            SET is_banned = $1, updated_at = now()
            WHERE telegram_id = $2
            ",
        )
        .bind(banned)
        .bind(telegram_id)
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}
