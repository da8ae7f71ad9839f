//! Current-identity endpoint.

use axum::Json;

use crate::error::Result;
use crate::middleware::RequireAuth;
use crate::services::auth::Identity;

/// `GET /api/me` - the caller's resolved identity.
pub async fn me(RequireAuth(identity): RequireAuth) -> Result<Json<Identity>> {
    Ok(Json(identity))
}
