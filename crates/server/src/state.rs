//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::PgPool;

use crate::config::ServerConfig;
use crate::services::auth::IdentityResolver;
use crate::services::notifier::Notifier;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    resolver: IdentityResolver,
    notifier: Notifier,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The identity resolver and notifier are built from the config's bot
    /// token and admin allowlist.
    #[must_use]
    pub fn new(config: ServerConfig, pool: PgPool) -> Self {
        let resolver = IdentityResolver::new(
            config.bot_token.clone(),
            config.admin_telegram_ids.clone(),
            config.auth_ttl,
        );
        let notifier = Notifier::new(
            Some(SecretString::clone(&config.bot_token)),
            config.admin_telegram_ids.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                resolver,
                notifier,
            }),
        }
    }

    /// Get a reference to the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the identity resolver.
    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.inner.resolver
    }

    /// Get a reference to the admin notifier.
    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }
}
