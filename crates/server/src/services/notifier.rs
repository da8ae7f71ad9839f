//! Best-effort admin notifications via the Telegram Bot API.
//!
//! Delivery is fire-and-forget: checkout spawns it after the transaction
//! commits, and no failure here ever rolls back or fails the checkout
//! response. Each recipient is attempted independently.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use minishop_core::TelegramId;

use crate::models::Order;

/// Telegram Bot API base URL.
const BOT_API_BASE: &str = "https://api.telegram.org";

/// Sends plain-text messages to the configured admin chat IDs.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    bot_token: Option<SecretString>,
    admin_ids: Vec<TelegramId>,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
}

impl Notifier {
    /// Create a notifier. A missing bot token disables delivery without
    /// being an error - notifications are optional by contract.
    #[must_use]
    pub fn new(bot_token: Option<SecretString>, admin_ids: Vec<TelegramId>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bot_token,
            admin_ids,
        }
    }

    /// Attempt delivery of `text` to every configured admin.
    ///
    /// Failures (network errors, API rejections, missing credentials) are
    /// logged and swallowed; one recipient failing does not stop the rest.
    pub async fn notify_admins(&self, text: &str) {
        let Some(token) = &self.bot_token else {
            tracing::debug!("bot token not configured, skipping admin notification");
            return;
        };

        if self.admin_ids.is_empty() {
            tracing::debug!("no admin recipients configured, skipping admin notification");
            return;
        }

        let url = format!("{BOT_API_BASE}/bot{}/sendMessage", token.expose_secret());

        for admin in &self.admin_ids {
            let body = SendMessage {
                chat_id: admin.as_i64(),
                text,
            };

            match self.client.post(&url).json(&body).send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!(chat_id = %admin, "admin notification delivered");
                }
                Ok(response) => {
                    tracing::warn!(
                        chat_id = %admin,
                        status = %response.status(),
                        "admin notification rejected by Bot API"
                    );
                }
                Err(e) => {
                    tracing::warn!(chat_id = %admin, error = %e, "admin notification failed");
                }
            }
        }
    }
}

/// Format the new-order message sent to admins.
#[must_use]
pub fn order_notification(order: &Order) -> String {
    format!(
        "New order #{}\nBuyer: {}\nItems: {}\nTotal: {}",
        order.id,
        order.buyer.name,
        order.items.len(),
        order.total_amount
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use minishop_core::{OrderId, OrderItemId, OrderStatus, ProductId, UserId};
    use rust_decimal::Decimal;

    use crate::models::OrderItem;
    use crate::models::order::{BuyerSnapshot, OrderShipping};

    #[test]
    fn test_order_notification_format() {
        let order = Order {
            id: OrderId::new(17),
            user_id: UserId::new(3),
            status: OrderStatus::Pending,
            total_amount: Decimal::from(5000),
            shipping: OrderShipping {
                name: "Alice Example".to_owned(),
                phone: "+15550100123".to_owned(),
                address: "1 Example Street, Exampleville".to_owned(),
                email: None,
            },
            buyer: BuyerSnapshot {
                telegram_id: minishop_core::TelegramId::new(123),
                name: "Alice".to_owned(),
            },
            created_at: Utc::now(),
            items: vec![OrderItem {
                id: OrderItemId::new(1),
                order_id: OrderId::new(17),
                product_id: ProductId::new(9),
                quantity: 1,
                unit_price: Decimal::from(5000),
            }],
        };

        let text = order_notification(&order);
        assert_eq!(text, "New order #17\nBuyer: Alice\nItems: 1\nTotal: 5000");
    }
}
