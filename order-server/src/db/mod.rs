//! Database Module
//!
//! The [`Store`] trait is the persistence seam for orders, menu items and
//! restaurant tables. Every mutation publishes a change event on the
//! [`ChangeFeed`](crate::message::ChangeFeed).
//!
//! - [`MemoryStore`] - process memory (default, tests)
//! - [`SqliteStore`] - SQLite file with WAL and migrations

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use shared::models::{
    MenuItem, MenuItemCreate, MenuItemUpdate, Order, OrderDraft, OrderStatus, RestaurantTable,
};
use thiserror::Error;

use crate::utils::AppError;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate: {0}")]
    Duplicate(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepoError::NotFound(err.to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Duplicate(db.message().to_string())
            }
            _ => RepoError::Database(err.to_string()),
        }
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::not_found(msg),
            RepoError::Duplicate(msg) => AppError::conflict(msg),
            RepoError::Database(msg) => AppError::database(msg),
            RepoError::Validation(msg) => AppError::validation(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;

/// Order list filter
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub table_number: Option<i32>,
    /// Newest first; `None` returns everything
    pub limit: Option<usize>,
}

impl OrderFilter {
    pub fn with_status(status: OrderStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| order.status == s)
            && self.table_number.is_none_or(|n| order.table_number == n)
    }
}

/// Persistence collaborator
///
/// Orders are listed newest first, tables by number, menu items by id.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    // ── Menu ──────────────────────────────────────────────────────────
    async fn list_menu_items(&self) -> RepoResult<Vec<MenuItem>>;
    async fn find_menu_item(&self, id: i64) -> RepoResult<Option<MenuItem>>;
    async fn insert_menu_item(&self, data: MenuItemCreate) -> RepoResult<MenuItem>;
    async fn update_menu_item(&self, id: i64, data: MenuItemUpdate) -> RepoResult<MenuItem>;
    async fn delete_menu_item(&self, id: i64) -> RepoResult<bool>;

    // ── Tables ────────────────────────────────────────────────────────
    async fn list_tables(&self) -> RepoResult<Vec<RestaurantTable>>;
    async fn find_table(&self, id: i64) -> RepoResult<Option<RestaurantTable>>;
    async fn find_table_by_number(&self, table_number: i32) -> RepoResult<Option<RestaurantTable>>;
    /// Fails with `Duplicate` when the number is taken
    async fn insert_table(&self, table_number: i32) -> RepoResult<RestaurantTable>;
    /// Overwrite status and occupancy link by id
    async fn update_table(&self, table: &RestaurantTable) -> RepoResult<RestaurantTable>;
    async fn delete_table(&self, id: i64) -> RepoResult<bool>;

    // ── Orders ────────────────────────────────────────────────────────
    async fn list_orders(&self, filter: OrderFilter) -> RepoResult<Vec<Order>>;
    async fn find_order(&self, id: i64) -> RepoResult<Option<Order>>;
    async fn find_order_by_receipt(&self, receipt_id: &str) -> RepoResult<Option<Order>>;
    /// Fails with `Duplicate` when the receipt code is taken
    async fn insert_order(&self, draft: OrderDraft) -> RepoResult<Order>;
    /// Overwrite status and payment fields by id
    async fn update_order(&self, order: &Order) -> RepoResult<Order>;

    /// Cheap liveness probe
    async fn ping(&self) -> RepoResult<()>;
}

impl std::fmt::Debug for dyn Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Store")
    }
}
