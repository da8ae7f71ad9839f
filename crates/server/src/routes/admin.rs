//! Admin order listing.

use axum::{Json, extract::State};

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Order;
use crate::state::AppState;

/// Most recent orders returned to the admin view.
const RECENT_ORDER_LIMIT: i64 = 50;

/// `GET /api/admin/orders` - recent orders with their items, newest first.
pub async fn list_orders(
    State(state): State<AppState>,
    RequireAdmin(_identity): RequireAdmin,
) -> Result<Json<Vec<Order>>> {
    let orders = OrderRepository::new(state.pool())
        .list_recent(RECENT_ORDER_LIMIT)
        .await?;

    Ok(Json(orders))
}
