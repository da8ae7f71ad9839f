//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use minishop_core::{Email, OrderId, OrderItemId, OrderStatus, ProductId, TelegramId, UserId};

/// Shipping details supplied at checkout.
///
/// Shape validation (lengths, phone pattern, email format) happens in the
/// request layer before this struct is constructed.
#[derive(Debug, Clone)]
pub struct ShippingInfo {
    /// Recipient name.
    pub name: String,
    /// Contact phone number.
    pub phone: String,
    /// Delivery address.
    pub address: String,
    /// Optional contact email.
    pub email: Option<Email>,
}

/// A persisted order.
///
/// Created only by checkout, inside a single transaction. `total_amount` and
/// the item prices are fixed at creation time.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    /// Unique order ID.
    pub id: OrderId,
    /// The buyer.
    pub user_id: UserId,
    /// Lifecycle status; checkout always creates `pending`.
    pub status: OrderStatus,
    /// Sum of `unit_price * quantity` over all items, captured at checkout.
    pub total_amount: Decimal,
    /// Shipping details as submitted.
    pub shipping: OrderShipping,
    /// Buyer identity snapshot taken at checkout.
    pub buyer: BuyerSnapshot,
    /// When the order was placed.
    pub created_at: DateTime<Utc>,
    /// Line items.
    pub items: Vec<OrderItem>,
}

/// Shipping fields as stored on the order row.
#[derive(Debug, Clone, Serialize)]
pub struct OrderShipping {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub email: Option<String>,
}

/// Buyer identity captured when the order was placed.
///
/// Decoupled from the live `users` row so later profile changes don't
/// rewrite order history.
#[derive(Debug, Clone, Serialize)]
pub struct BuyerSnapshot {
    pub telegram_id: TelegramId,
    pub name: String,
}

/// A single order line.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    /// Unique order item ID.
    pub id: OrderItemId,
    /// Order this line belongs to.
    pub order_id: OrderId,
    /// Ordered product.
    pub product_id: ProductId,
    /// Ordered quantity.
    pub quantity: i32,
    /// Unit price at purchase time. Immutable; never re-read from the
    /// product row.
    pub unit_price: Decimal,
}
