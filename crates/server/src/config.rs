//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `MINISHOP_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`)
//! - `TELEGRAM_BOT_TOKEN` - Bot token; signs init data and sends
//!   notifications
//!
//! ## Optional
//! - `MINISHOP_HOST` - Bind address (default: 127.0.0.1)
//! - `MINISHOP_PORT` - Listen port (default: 3000)
//! - `MINISHOP_ENV` - `development` or `production` (default: development)
//! - `ADMIN_TELEGRAM_IDS` - Comma-separated Telegram IDs granted the admin
//!   role and sent order notifications
//! - `AUTH_TTL_SECS` - Credential freshness window (default: 86400)
//! - `AUTH_ALLOW_FALLBACK` - Accept the legacy unverified credential path
//!   (default: false)
//! - `DEBUG_AUTH_ENABLED` - Allow the debug identity header (default: false;
//!   ignored in production regardless)
//! - `DEBUG_AUTH_SECRET` - Shared secret the debug header must match
//! - `SENTRY_DSN` - Sentry error tracking DSN

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

use minishop_core::TelegramId;

use crate::services::auth::DEFAULT_AUTH_TTL;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Deployment environment.
///
/// Debug auth is structurally impossible in `Production`, whatever the
/// other flags say.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(format!("invalid environment: {s}")),
        }
    }
}

/// Server application configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Deployment environment
    pub environment: Environment,
    /// Telegram bot token (init-data signing key and Bot API credential)
    pub bot_token: SecretString,
    /// Telegram IDs granted the admin role; also notification recipients
    pub admin_telegram_ids: Vec<TelegramId>,
    /// Credential freshness window
    pub auth_ttl: Duration,
    /// Accept the legacy unverified credential path when the request flags it
    pub allow_auth_fallback: bool,
    /// Allow the debug identity header (outside production only)
    pub debug_auth_enabled: bool,
    /// Shared secret the debug header must match
    pub debug_auth_secret: Option<SecretString>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("MINISHOP_DATABASE_URL")?;
        let host = get_env_or_default("MINISHOP_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("MINISHOP_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("MINISHOP_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("MINISHOP_PORT".to_string(), e.to_string()))?;
        let environment = get_env_or_default("MINISHOP_ENV", "development")
            .parse::<Environment>()
            .map_err(|e| ConfigError::InvalidEnvVar("MINISHOP_ENV".to_string(), e))?;

        let bot_token = get_validated_secret("TELEGRAM_BOT_TOKEN")?;
        let admin_telegram_ids = parse_admin_ids(&get_env_or_default("ADMIN_TELEGRAM_IDS", ""))
            .map_err(|e| ConfigError::InvalidEnvVar("ADMIN_TELEGRAM_IDS".to_string(), e))?;

        let auth_ttl = match get_optional_env("AUTH_TTL_SECS") {
            Some(raw) => Duration::from_secs(raw.parse::<u64>().map_err(|e| {
                ConfigError::InvalidEnvVar("AUTH_TTL_SECS".to_string(), e.to_string())
            })?),
            None => DEFAULT_AUTH_TTL,
        };

        let allow_auth_fallback = parse_bool(&get_env_or_default("AUTH_ALLOW_FALLBACK", "false"));
        let debug_auth_enabled = parse_bool(&get_env_or_default("DEBUG_AUTH_ENABLED", "false"));
        let debug_auth_secret = get_optional_env("DEBUG_AUTH_SECRET")
            .map(|raw| {
                validate_secret_strength(&raw, "DEBUG_AUTH_SECRET")?;
                Ok(SecretString::from(raw))
            })
            .transpose()?;

        let sentry_dsn = get_optional_env("SENTRY_DSN");

        Ok(Self {
            database_url,
            host,
            port,
            environment,
            bot_token,
            admin_telegram_ids,
            auth_ttl,
            allow_auth_fallback,
            debug_auth_enabled,
            debug_auth_secret,
            sentry_dsn,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether this is a production deployment.
    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Whether the debug identity path may be taken at all.
    ///
    /// Requires all three server-side conditions: non-production
    /// environment, the explicit enable flag, and a configured shared
    /// secret. Production short-circuits to `false` before anything else is
    /// consulted.
    #[must_use]
    pub fn debug_auth_allowed(&self) -> bool {
        if self.is_production() {
            return false;
        }
        self.debug_auth_enabled && self.debug_auth_secret.is_some()
    }

    /// Constant-length comparison of the debug header value against the
    /// configured secret.
    #[must_use]
    pub fn debug_secret_matches(&self, candidate: &str) -> bool {
        self.debug_auth_secret
            .as_ref()
            .is_some_and(|secret| constant_time_eq(secret.expose_secret(), candidate))
    }
}

/// Compare two strings without short-circuiting on the first mismatch.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Parse a comma-separated list of Telegram IDs.
fn parse_admin_ids(raw: &str) -> Result<Vec<TelegramId>, String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map(TelegramId::new)
                .map_err(|e| format!("invalid Telegram ID '{s}': {e}"))
        })
        .collect()
}

/// Lenient boolean parsing for env flags.
fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "1" | "true" | "yes")
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    // Check blocklist
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    // Check entropy (real bot tokens and shared secrets have high entropy)
    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn test_config(environment: Environment) -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3000,
            environment,
            bot_token: SecretString::from("12345:aB3xY9mK2nL5pQ7r"),
            admin_telegram_ids: vec![TelegramId::new(42)],
            auth_ttl: DEFAULT_AUTH_TTL,
            allow_auth_fallback: false,
            debug_auth_enabled: true,
            debug_auth_secret: Some(SecretString::from("aB3$xY9!mK2@nL5#pQ7&")),
            sentry_dsn: None,
        }
    }

    #[test]
    fn test_shannon_entropy_degenerate_inputs() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_high() {
        let entropy = shannon_entropy("aB3$xY9!mK2@nL5#");
        assert!(entropy > 3.3);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        assert!(validate_secret_strength("your-bot-token-here", "TEST_VAR").is_err());
        assert!(validate_secret_strength("changeme123", "TEST_VAR").is_err());
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::InsecureSecret(_, _)
        ));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        assert!(validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR").is_ok());
    }

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids("").unwrap(), vec![]);
        assert_eq!(
            parse_admin_ids("1, 42 ,9000000000").unwrap(),
            vec![
                TelegramId::new(1),
                TelegramId::new(42),
                TelegramId::new(9_000_000_000)
            ]
        );
        assert!(parse_admin_ids("1,abc").is_err());
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("1"));
        assert!(parse_bool("true"));
        assert!(parse_bool("YES"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool(""));
    }

    #[test]
    fn test_environment_from_str() {
        assert_eq!(
            "production".parse::<Environment>().unwrap(),
            Environment::Production
        );
        assert_eq!(
            "dev".parse::<Environment>().unwrap(),
            Environment::Development
        );
        assert!("staging".parse::<Environment>().is_err());
    }

    #[test]
    fn test_debug_auth_allowed_in_development() {
        let config = test_config(Environment::Development);
        assert!(config.debug_auth_allowed());
    }

    #[test]
    fn test_debug_auth_disabled_in_production_regardless_of_flags() {
        // Enable flag set, secret set - production still wins.
        let config = test_config(Environment::Production);
        assert!(!config.debug_auth_allowed());
    }

    #[test]
    fn test_debug_auth_requires_secret() {
        let mut config = test_config(Environment::Development);
        config.debug_auth_secret = None;
        assert!(!config.debug_auth_allowed());
    }

    #[test]
    fn test_debug_auth_requires_enable_flag() {
        let mut config = test_config(Environment::Development);
        config.debug_auth_enabled = false;
        assert!(!config.debug_auth_allowed());
    }

    #[test]
    fn test_debug_secret_matches() {
        let config = test_config(Environment::Development);
        assert!(config.debug_secret_matches("aB3$xY9!mK2@nL5#pQ7&"));
        assert!(!config.debug_secret_matches("aB3$xY9!mK2@nL5#pQ7!"));
        assert!(!config.debug_secret_matches(""));
    }

    #[test]
    fn test_socket_addr() {
        let config = test_config(Environment::Development);
        let addr = config.socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3000);
    }
}
