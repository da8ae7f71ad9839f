//! Checkout endpoint.

use std::sync::LazyLock;

use axum::{Json, extract::State};
use regex::Regex;
use serde::Deserialize;

use minishop_core::Email;

use crate::error::{AppError, Result};
use crate::middleware::RequireAuth;
use crate::models::order::BuyerSnapshot;
use crate::models::{Order, ShippingInfo};
use crate::services::checkout::CheckoutService;
use crate::services::notifier::order_notification;
use crate::state::AppState;

/// Digits, spaces, parens, and dashes with an optional leading `+`.
static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9][0-9 ()\-]{5,19}$").unwrap_or_else(|e| {
        // A const pattern that fails to compile is a programming error.
        unreachable!("phone regex is valid: {e}")
    })
});

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub name: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub email: Option<String>,
}

fn invalid(message: &str) -> AppError {
    AppError::Validation("invalid_shipping_info", message.to_string())
}

/// Validate the request shape and normalize it into [`ShippingInfo`].
///
/// Shape errors are client errors (`invalid_shipping_info`); they are
/// checked before any database work so a bad request costs nothing.
fn validate_shipping(request: &CheckoutRequest) -> Result<ShippingInfo> {
    let name = request.name.trim();
    if name.len() < 2 || name.len() > 100 {
        return Err(invalid("name must be 2-100 characters"));
    }

    let phone = request.phone.trim();
    if !PHONE_RE.is_match(phone) {
        return Err(invalid("phone must be a valid phone number"));
    }

    let address = request.address.trim();
    if address.len() < 10 || address.len() > 500 {
        return Err(invalid("address must be 10-500 characters"));
    }

    let email = request
        .email
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(Email::parse)
        .transpose()
        .map_err(|e| invalid(&format!("invalid email: {e}")))?;

    Ok(ShippingInfo {
        name: name.to_owned(),
        phone: phone.to_owned(),
        address: address.to_owned(),
        email,
    })
}

/// `POST /api/checkout` - convert the caller's cart into an order.
///
/// Runs behind the hard-require auth layer. On success the admin
/// notification is spawned fire-and-forget; the response never waits on it.
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(identity): RequireAuth,
    Json(request): Json<CheckoutRequest>,
) -> Result<Json<Order>> {
    let shipping = validate_shipping(&request)?;

    // Debug identities have no persisted user row and nothing to buy with.
    let Some(user_id) = identity.user_id else {
        return Err(AppError::Forbidden);
    };

    let buyer = BuyerSnapshot {
        telegram_id: identity.telegram_id,
        name: identity.display_name(),
    };

    let order = CheckoutService::new(state.pool())
        .checkout(user_id, &buyer, &shipping)
        .await?;

    let notifier = state.notifier().clone();
    let text = order_notification(&order);
    tokio::spawn(async move {
        notifier.notify_admins(&text).await;
    });

    Ok(Json(order))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(name: &str, phone: &str, address: &str, email: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            name: name.to_owned(),
            phone: phone.to_owned(),
            address: address.to_owned(),
            email: email.map(str::to_owned),
        }
    }

    const GOOD_ADDRESS: &str = "1 Example Street, Exampleville";

    #[test]
    fn test_valid_request() {
        let shipping =
            validate_shipping(&request("Alice", "+1 555 010-0123", GOOD_ADDRESS, None)).unwrap();
        assert_eq!(shipping.name, "Alice");
        assert!(shipping.email.is_none());
    }

    #[test]
    fn test_fields_are_trimmed() {
        let shipping =
            validate_shipping(&request("  Alice  ", "+15550100123", GOOD_ADDRESS, None)).unwrap();
        assert_eq!(shipping.name, "Alice");
    }

    #[test]
    fn test_rejects_short_name() {
        assert!(validate_shipping(&request("A", "+15550100123", GOOD_ADDRESS, None)).is_err());
    }

    #[test]
    fn test_rejects_bad_phone() {
        assert!(validate_shipping(&request("Alice", "not-a-phone", GOOD_ADDRESS, None)).is_err());
        assert!(validate_shipping(&request("Alice", "123", GOOD_ADDRESS, None)).is_err());
    }

    #[test]
    fn test_rejects_short_address() {
        assert!(validate_shipping(&request("Alice", "+15550100123", "short", None)).is_err());
    }

    #[test]
    fn test_rejects_bad_email() {
        assert!(
            validate_shipping(&request("Alice", "+15550100123", GOOD_ADDRESS, Some("nope")))
                .is_err()
        );
    }

    #[test]
    fn test_accepts_valid_email() {
        let shipping = validate_shipping(&request(
            "Alice",
            "+15550100123",
            GOOD_ADDRESS,
            Some("alice@example.com"),
        ))
        .unwrap();
        assert_eq!(shipping.email.unwrap().as_str(), "alice@example.com");
    }

    #[test]
    fn test_empty_email_is_none() {
        let shipping =
            validate_shipping(&request("Alice", "+15550100123", GOOD_ADDRESS, Some("  ")))
                .unwrap();
        assert!(shipping.email.is_none());
    }

    #[test]
    fn test_validation_error_carries_shipping_code() {
        let err = validate_shipping(&request("A", "+15550100123", GOOD_ADDRESS, None))
            .err()
            .unwrap();
        assert_eq!(err.code(), "invalid_shipping_info");
    }
}
