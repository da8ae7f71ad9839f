//! Session guard middleware and extractors.
//!
//! Three enforcement policies over the same resolution pipeline:
//!
//! - hard-require: the [`require_auth`] router layer. Resolves the credential
//!   before any handler runs and stores the [`Identity`] in request
//!   extensions; unauthenticated requests never reach the handler.
//! - soft-require: the [`RequireAuth`] extractor. Handlers that declare it
//!   get an identity or the request is rejected; handlers that don't are
//!   untouched.
//! - optional: the [`OptionalAuth`] extractor. Yields `Some(identity)` when
//!   resolution succeeds and `None` on any failure, never rejecting.
//!
//! [`RequireAdmin`] layers a role check on soft-require and rejects
//! non-admins with 403.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{HeaderMap, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::error::{AppError, set_sentry_user};
use crate::services::auth::{AuthError, Credential, Identity};
use crate::state::AppState;

/// Header carrying raw Telegram init data.
pub const INIT_DATA_HEADER: &str = "x-telegram-init-data";

/// Header flagging the legacy unverified credential path. The value must be
/// `1` and the server must have fallback enabled in config.
pub const FALLBACK_HEADER: &str = "x-telegram-auth-fallback";

/// Header carrying the debug-mode shared secret.
pub const DEBUG_HEADER: &str = "x-debug-auth";

/// Pick the credential a request is presenting, if any.
///
/// Precedence: debug (when the server allows it and the secret matches),
/// then init data - as the fallback variant when the request flags it and
/// config permits, otherwise as the fully verified variant. A debug header
/// with a wrong secret is ignored rather than rejected, so it cannot be
/// used to probe whether debug mode is on.
fn credential_from_headers(headers: &HeaderMap, state: &AppState) -> Option<Credential> {
    if state.config().debug_auth_allowed()
        && let Some(value) = headers.get(DEBUG_HEADER).and_then(|v| v.to_str().ok())
        && state.config().debug_secret_matches(value)
    {
        return Some(Credential::Debug);
    }

    let init_data = headers
        .get(INIT_DATA_HEADER)
        .and_then(|v| v.to_str().ok())?
        .to_owned();

    let wants_fallback = headers
        .get(FALLBACK_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "1");

    if wants_fallback && state.config().allow_auth_fallback {
        Some(Credential::Fallback(init_data))
    } else {
        Some(Credential::Signed(init_data))
    }
}

/// Resolve the request's credential into an identity.
async fn resolve_identity(headers: &HeaderMap, state: &AppState) -> Result<Identity, AuthError> {
    let credential =
        credential_from_headers(headers, state).ok_or(AuthError::MissingCredential)?;

    let identity = state.resolver().resolve(state.pool(), credential).await?;
    set_sentry_user(&identity.telegram_id, identity.username.as_deref());

    Ok(identity)
}

/// Hard-require middleware: authenticate before the handler runs.
///
/// Attach with `axum::middleware::from_fn_with_state`. On success the
/// resolved [`Identity`] is inserted into request extensions, where the
/// extractors below pick it up without resolving twice.
///
/// # Errors
///
/// Any [`AuthError`] from resolution, mapped through [`AppError`].
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = resolve_identity(request.headers(), &state).await?;
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

/// Soft-require extractor: the handler gets an identity or a 401/403.
///
/// Checks request extensions first (populated by [`require_auth`] when the
/// route sits behind the hard-require layer), then falls back to resolving
/// the headers itself.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(RequireAuth(identity): RequireAuth) -> Json<Identity> {
///     Json(identity)
/// }
/// ```
pub struct RequireAuth(pub Identity);

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(Self(identity.clone()));
        }

        let identity = resolve_identity(&parts.headers, state).await?;
        Ok(Self(identity))
    }
}

/// Optional extractor: `Some(identity)` on success, `None` on any failure.
///
/// Fail-open by contract - a bad credential on an optional route degrades to
/// the anonymous experience instead of an error.
pub struct OptionalAuth(pub Option<Identity>);

impl FromRequestParts<AppState> for OptionalAuth {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(Self(Some(identity.clone())));
        }

        Ok(Self(resolve_identity(&parts.headers, state).await.ok()))
    }
}

/// Admin extractor: soft-require plus a role check.
///
/// Unauthenticated requests get the usual 401; authenticated non-admins get
/// 403 `forbidden`.
pub struct RequireAdmin(pub Identity);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(identity) = RequireAuth::from_request_parts(parts, state).await?;

        if !identity.role.is_admin() {
            return Err(AppError::Forbidden);
        }

        Ok(Self(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use secrecy::SecretString;

    use crate::config::{Environment, ServerConfig};

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).expect("valid header name"),
                v.parse().expect("valid header value"),
            );
        }
        map
    }

    fn test_config(environment: Environment, allow_fallback: bool) -> ServerConfig {
        ServerConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().expect("valid addr"),
            port: 0,
            environment,
            bot_token: SecretString::from("12345:aB3xY9mK2nL5pQ7r"),
            admin_telegram_ids: vec![],
            auth_ttl: Duration::from_secs(86_400),
            allow_auth_fallback: allow_fallback,
            debug_auth_enabled: true,
            debug_auth_secret: Some(SecretString::from("aB3$xY9!mK2@nL5#pQ7&")),
            sentry_dsn: None,
        }
    }

    // credential_from_headers needs an AppState, which needs a PgPool; the
    // header-selection logic is exercised through a lazily-connecting pool
    // that is never actually used for I/O in these tests.
    fn test_state(config: ServerConfig) -> AppState {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        AppState::new(config, pool)
    }

    #[tokio::test]
    async fn test_no_headers_yields_no_credential() {
        let state = test_state(test_config(Environment::Development, false));
        assert!(credential_from_headers(&HeaderMap::new(), &state).is_none());
    }

    #[tokio::test]
    async fn test_init_data_header_yields_signed() {
        let state = test_state(test_config(Environment::Development, false));
        let headers = headers(&[(INIT_DATA_HEADER, "user=x&hash=ff")]);
        assert!(matches!(
            credential_from_headers(&headers, &state),
            Some(Credential::Signed(_))
        ));
    }

    #[tokio::test]
    async fn test_fallback_flag_requires_config_opt_in() {
        let headers = headers(&[(INIT_DATA_HEADER, "user=x"), (FALLBACK_HEADER, "1")]);

        let state = test_state(test_config(Environment::Development, false));
        assert!(matches!(
            credential_from_headers(&headers, &state),
            Some(Credential::Signed(_))
        ));

        let state = test_state(test_config(Environment::Development, true));
        assert!(matches!(
            credential_from_headers(&headers, &state),
            Some(Credential::Fallback(_))
        ));
    }

    #[tokio::test]
    async fn test_debug_header_with_matching_secret() {
        let state = test_state(test_config(Environment::Development, false));
        let headers = headers(&[(DEBUG_HEADER, "aB3$xY9!mK2@nL5#pQ7&")]);
        assert!(matches!(
            credential_from_headers(&headers, &state),
            Some(Credential::Debug)
        ));
    }

    #[tokio::test]
    async fn test_debug_header_wrong_secret_is_ignored() {
        let state = test_state(test_config(Environment::Development, false));
        let headers = headers(&[(DEBUG_HEADER, "wrong")]);
        assert!(credential_from_headers(&headers, &state).is_none());
    }

    #[tokio::test]
    async fn test_debug_header_ignored_in_production() {
        let state = test_state(test_config(Environment::Production, false));
        let headers = headers(&[(DEBUG_HEADER, "aB3$xY9!mK2@nL5#pQ7&")]);
        assert!(credential_from_headers(&headers, &state).is_none());
    }

    #[tokio::test]
    async fn test_debug_takes_precedence_over_init_data() {
        let state = test_state(test_config(Environment::Development, false));
        let headers = headers(&[
            (DEBUG_HEADER, "aB3$xY9!mK2@nL5#pQ7&"),
            (INIT_DATA_HEADER, "user=x&hash=ff"),
        ]);
        assert!(matches!(
            credential_from_headers(&headers, &state),
            Some(Credential::Debug)
        ));
    }
}
