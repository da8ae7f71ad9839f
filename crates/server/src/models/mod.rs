//! Domain models.
//!
//! These types represent validated domain objects separate from database row
//! types; repositories do the row-to-domain conversion.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod user;

pub use cart::CartLine;
pub use catalog::Product;
pub use order::{Order, OrderItem, ShippingInfo};
pub use user::{TelegramProfile, User};
