//! Data models
//!
//! Shared between order-server and its clients (via API).
//! All IDs are `i64`; money is `rust_decimal::Decimal` serialized as a float.

pub mod menu_item;
pub mod order;
pub mod restaurant_table;

// Re-exports
pub use menu_item::*;
pub use order::*;
pub use restaurant_table::*;
