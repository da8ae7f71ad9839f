//! Business services.
//!
//! - [`auth`] - Telegram init-data verification and identity resolution
//! - [`checkout`] - Cart-to-order transaction
//! - [`notifier`] - Best-effort admin notifications via the Bot API

pub mod auth;
pub mod checkout;
pub mod notifier;
