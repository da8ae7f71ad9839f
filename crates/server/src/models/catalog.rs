//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use minishop_core::ProductId;

/// A product in the catalog.
///
/// Single-unit inventory: `is_active == false` means the item is no longer
/// for sale, either pulled by an admin or already sold.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    /// Unique product ID.
    pub id: ProductId,
    /// Display title.
    pub title: String,
    /// Optional long description.
    pub description: Option<String>,
    /// Current price. Orders capture this at checkout time; later changes
    /// never affect existing orders.
    pub price: Decimal,
    /// Whether the product can currently be ordered.
    pub is_active: bool,
    /// When the product was listed.
    pub created_at: DateTime<Utc>,
}
