//! Cart domain types.

use rust_decimal::Decimal;

use minishop_core::{CartId, CartItemId, ProductId};

/// One cart item joined with the current state of its product.
///
/// Checkout reads these inside its transaction so that the price and
/// availability seen here are the ones the order is built from.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLine {
    /// Cart item row ID.
    pub cart_item_id: CartItemId,
    /// Cart the item belongs to.
    pub cart_id: CartId,
    /// Product being purchased.
    pub product_id: ProductId,
    /// Requested quantity.
    pub quantity: i32,
    /// Product title at read time (for notifications).
    pub title: String,
    /// Live product price at read time.
    pub unit_price: Decimal,
    /// Live product availability at read time.
    pub is_active: bool,
}
