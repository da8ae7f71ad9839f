//! Cart-to-order checkout transaction.
//!
//! Everything from the cart read to the cart clear happens inside one
//! `PostgreSQL` transaction. The `FOR UPDATE` read is the concurrency
//! control: a second checkout for the same user blocks on the row locks,
//! and once the first commits it observes the emptied cart and rejects with
//! `CartEmpty`. Admin stock edits racing a checkout serialize the same way.

use rust_decimal::Decimal;
use sqlx::PgPool;

use minishop_core::{CartId, OrderId, UserId};

use crate::db::{OrderRepository, RepositoryError};
use crate::models::order::BuyerSnapshot;
use crate::models::{CartLine, Order, ShippingInfo};

/// Errors that can occur during checkout.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// The user has no cart or the cart has no items.
    #[error("cart is empty")]
    CartEmpty,

    /// At least one cart item's product is no longer available.
    #[error("product unavailable")]
    ProductUnavailable,

    /// Repository/database error; the transaction rolled back.
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),
}

impl CheckoutError {
    /// Stable machine-readable code for the error body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::CartEmpty => "cart_empty",
            Self::ProductUnavailable => "product_unavailable",
            Self::Repository(_) => "internal",
        }
    }
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::Database(e))
    }
}

/// Reject empty carts and carts holding a product that is no longer active.
///
/// Runs after the transaction-scoped read, so the availability seen here is
/// the availability the order would be built from.
fn validate_lines(lines: &[CartLine]) -> Result<(), CheckoutError> {
    if lines.is_empty() {
        return Err(CheckoutError::CartEmpty);
    }

    if lines.iter().any(|line| !line.is_active) {
        return Err(CheckoutError::ProductUnavailable);
    }

    Ok(())
}

/// Order total: sum of live unit price times quantity over all lines.
fn order_total(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.unit_price * Decimal::from(line.quantity))
        .sum()
}

/// The checkout coordinator.
pub struct CheckoutService<'a> {
    pool: &'a PgPool,
}

impl<'a> CheckoutService<'a> {
    /// Create a new checkout service.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Convert the user's cart into an order.
    ///
    /// In one transaction: lock-read the cart lines with their products,
    /// validate, compute the total from live prices, insert the order and
    /// its items (capturing unit prices), mark every ordered product
    /// inactive (single-unit inventory), and clear the cart. On any error
    /// the transaction rolls back and nothing is written.
    ///
    /// Notification is not handled here - callers fire it after the
    /// response path is secured.
    ///
    /// # Errors
    ///
    /// `CartEmpty` or `ProductUnavailable` for business rejections (zero
    /// writes); `Repository` for database failures.
    pub async fn checkout(
        &self,
        user_id: UserId,
        buyer: &BuyerSnapshot,
        shipping: &ShippingInfo,
    ) -> Result<Order, CheckoutError> {
        let mut tx = self.pool.begin().await?;

        // The read must be transaction-scoped and locking: it fixes the
        // prices and availability the order is built from and blocks rival
        // checkouts on the same rows.
        let lines = sqlx::query_as::<_, CartLine>(
            r"
            SELECT ci.id AS cart_item_id, ci.cart_id, ci.product_id, ci.quantity,
                   p.title, p.price AS unit_price, p.is_active
            FROM cart_items ci
            JOIN carts c ON c.id = ci.cart_id
            JOIN products p ON p.id = ci.product_id
            WHERE c.user_id = $1
            ORDER BY ci.id
            FOR UPDATE OF ci, p
            ",
        )
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        validate_lines(&lines)?;
        let total = order_total(&lines);

        let order_id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO orders (user_id, status, total_amount, shipping_name, shipping_phone,
                                shipping_address, shipping_email, buyer_telegram_id, buyer_name)
            VALUES ($1, 'pending', $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(total)
        .bind(&shipping.name)
        .bind(&shipping.phone)
        .bind(&shipping.address)
        .bind(shipping.email.as_ref().map(minishop_core::Email::as_str))
        .bind(buyer.telegram_id)
        .bind(&buyer.name)
        .fetch_one(&mut *tx)
        .await?;

        for line in &lines {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, quantity, unit_price)
                VALUES ($1, $2, $3, $4)
                ",
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(line.quantity)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        // Single-unit inventory: a sold product leaves the catalog.
        let product_ids: Vec<i32> = lines.iter().map(|l| l.product_id.as_i32()).collect();
        sqlx::query("UPDATE products SET is_active = FALSE WHERE id = ANY($1)")
            .bind(&product_ids)
            .execute(&mut *tx)
            .await?;

        // All lines belong to the user's single cart; the cart row survives.
        let cart_id: CartId = lines
            .first()
            .map(|l| l.cart_id)
            .ok_or(CheckoutError::CartEmpty)?;
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let order = OrderRepository::new(self.pool)
            .get_with_items(order_id)
            .await?;

        tracing::info!(
            order_id = %order.id,
            user_id = %user_id,
            total = %order.total_amount,
            items = order.items.len(),
            "checkout completed"
        );

        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use minishop_core::{CartItemId, ProductId};

    fn line(product_id: i32, quantity: i32, unit_price: i64, is_active: bool) -> CartLine {
        CartLine {
            cart_item_id: CartItemId::new(product_id),
            cart_id: CartId::new(1),
            product_id: ProductId::new(product_id),
            quantity,
            title: format!("Product {product_id}"),
            unit_price: Decimal::from(unit_price),
            is_active,
        }
    }

    #[test]
    fn test_validate_rejects_empty_cart() {
        assert!(matches!(
            validate_lines(&[]),
            Err(CheckoutError::CartEmpty)
        ));
    }

    #[test]
    fn test_validate_rejects_any_inactive_product() {
        let lines = vec![line(1, 1, 5000, true), line(2, 2, 100, false)];
        assert!(matches!(
            validate_lines(&lines),
            Err(CheckoutError::ProductUnavailable)
        ));
    }

    #[test]
    fn test_validate_accepts_active_lines() {
        let lines = vec![line(1, 1, 5000, true), line(2, 3, 100, true)];
        assert!(validate_lines(&lines).is_ok());
    }

    #[test]
    fn test_total_is_price_times_quantity() {
        let lines = vec![line(1, 1, 5000, true)];
        assert_eq!(order_total(&lines), Decimal::from(5000));

        let lines = vec![line(1, 2, 5000, true), line(2, 3, 100, true)];
        assert_eq!(order_total(&lines), Decimal::from(10_300));
    }

    #[test]
    fn test_total_of_no_lines_is_zero() {
        assert_eq!(order_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(CheckoutError::CartEmpty.code(), "cart_empty");
        assert_eq!(CheckoutError::ProductUnavailable.code(), "product_unavailable");
    }
}
