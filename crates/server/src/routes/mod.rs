//! HTTP route handlers.
//!
//! Route table:
//! - `GET  /api/me` - resolved caller identity (soft-require)
//! - `GET  /api/products` - catalog listing (optional auth; admins also see
//!   inactive products)
//! - `POST /api/checkout` - cart-to-order conversion (hard-require layer)
//! - `GET  /api/admin/orders` - recent orders (admin only)

mod admin;
mod checkout;
mod me;
mod products;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the API router.
pub fn routes(state: &AppState) -> Router<AppState> {
    let checkout = Router::new()
        .route("/api/checkout", post(checkout::checkout))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::require_auth,
        ));

    Router::new()
        .route("/api/me", get(me::me))
        .route("/api/products", get(products::list_products))
        .route("/api/admin/orders", get(admin::list_orders))
        .merge(checkout)
}
