//! Catalog listing.

use axum::{Json, extract::State};

use crate::db::RepositoryError;
use crate::error::Result;
use crate::middleware::OptionalAuth;
use crate::models::Product;
use crate::state::AppState;

/// `GET /api/products` - the product catalog.
///
/// Anonymous callers and plain users see only active products; admins see
/// the full catalog including sold-out (inactive) entries.
pub async fn list_products(
    State(state): State<AppState>,
    OptionalAuth(identity): OptionalAuth,
) -> Result<Json<Vec<Product>>> {
    let include_inactive = identity.is_some_and(|i| i.role.is_admin());

    let products = sqlx::query_as::<_, Product>(
        r"
        SELECT id, title, description, price, is_active, created_at
        FROM products
        WHERE is_active = TRUE OR $1
        ORDER BY created_at DESC
        ",
    )
    .bind(include_inactive)
    .fetch_all(state.pool())
    .await
    .map_err(RepositoryError::Database)?;

    Ok(Json(products))
}
