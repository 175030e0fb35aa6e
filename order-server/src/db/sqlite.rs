//! SQLite store
//!
//! File-backed persistence using sqlx. Opening applies the embedded
//! migrations; decimals are stored as TEXT and order lines as JSON.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::message::{ChangeKind, StoreTable};
use shared::models::{
    MenuItem, MenuItemCreate, MenuItemUpdate, Order, OrderDraft, OrderItem, OrderStatus,
    PaymentMethod, PaymentStatus, PaymentType, RestaurantTable, TableStatus,
};
use shared::util::now_millis;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use super::{OrderFilter, RepoError, RepoResult, Store};
use crate::message::ChangeFeed;

const MENU_COLUMNS: &str = "id, name, price, category, available";
const TABLE_COLUMNS: &str = "id, table_number, status, current_order_id";
const ORDER_COLUMNS: &str = "id, receipt_id, table_number, items, subtotal, tip_amount, total, \
     status, payment_method, payment_status, payment_type, transaction_id, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct MenuItemRow {
    id: i64,
    name: String,
    price: String,
    category: String,
    available: bool,
}

impl TryFrom<MenuItemRow> for MenuItem {
    type Error = RepoError;

    fn try_from(row: MenuItemRow) -> Result<Self, Self::Error> {
        Ok(MenuItem {
            id: row.id,
            price: parse_decimal("price", &row.price)?,
            name: row.name,
            category: row.category,
            available: row.available,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TableRow {
    id: i64,
    table_number: i32,
    status: String,
    current_order_id: Option<String>,
}

impl TryFrom<TableRow> for RestaurantTable {
    type Error = RepoError;

    fn try_from(row: TableRow) -> Result<Self, Self::Error> {
        Ok(RestaurantTable {
            id: row.id,
            table_number: row.table_number,
            status: parse_text::<TableStatus>("status", &row.status)?,
            current_order_id: row.current_order_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i64,
    receipt_id: String,
    table_number: i32,
    items: String,
    subtotal: String,
    tip_amount: String,
    total: String,
    status: String,
    payment_method: Option<String>,
    payment_status: String,
    payment_type: Option<String>,
    transaction_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepoError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let items: Vec<OrderItem> = serde_json::from_str(&row.items)
            .map_err(|e| RepoError::Database(format!("corrupt order items: {e}")))?;
        Ok(Order {
            id: row.id,
            receipt_id: row.receipt_id,
            table_number: row.table_number,
            items,
            subtotal: parse_decimal("subtotal", &row.subtotal)?,
            tip_amount: parse_decimal("tip_amount", &row.tip_amount)?,
            total: parse_decimal("total", &row.total)?,
            status: parse_text::<OrderStatus>("status", &row.status)?,
            payment_method: row
                .payment_method
                .as_deref()
                .map(|v| parse_text::<PaymentMethod>("payment_method", v))
                .transpose()?,
            payment_status: parse_text::<PaymentStatus>("payment_status", &row.payment_status)?,
            payment_type: row
                .payment_type
                .as_deref()
                .map(|v| parse_text::<PaymentType>("payment_type", v))
                .transpose()?,
            transaction_id: row.transaction_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn parse_decimal(column: &str, value: &str) -> RepoResult<Decimal> {
    Decimal::from_str(value)
        .map_err(|e| RepoError::Database(format!("corrupt {column} '{value}': {e}")))
}

fn parse_text<T: FromStr<Err = String>>(column: &str, value: &str) -> RepoResult<T> {
    value
        .parse()
        .map_err(|e| RepoError::Database(format!("corrupt {column}: {e}")))
}

fn collect<R, T>(rows: Vec<R>) -> RepoResult<Vec<T>>
where
    T: TryFrom<R, Error = RepoError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// SQLite-backed [`Store`]
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Open (or create) the database file and apply migrations
    pub async fn open(path: impl AsRef<Path>, feed: ChangeFeed) -> RepoResult<Self> {
        let path = path.as_ref().display().to_string();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{path}"))
            .map_err(|e| RepoError::Database(format!("Invalid database path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .pragma("foreign_keys", "ON");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| RepoError::Database(format!("Failed to open database: {e}")))?;

        // busy_timeout: 写冲突时等待 5s 而非立即失败
        sqlx::query("PRAGMA busy_timeout = 5000;").execute(&pool).await?;
        tracing::info!(path = %path, "Database connection established (SQLite WAL, busy_timeout=5000ms)");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| RepoError::Database(format!("Failed to apply migrations: {e}")))?;
        tracing::info!("Database migrations applied");

        Ok(Self { pool, feed })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_menu_item(&self, id: i64) -> RepoResult<Option<MenuItem>> {
        let row: Option<MenuItemRow> =
            sqlx::query_as(&format!("SELECT {MENU_COLUMNS} FROM menu_items WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(MenuItem::try_from).transpose()
    }

    async fn fetch_table(&self, id: i64) -> RepoResult<Option<RestaurantTable>> {
        let row: Option<TableRow> =
            sqlx::query_as(&format!("SELECT {TABLE_COLUMNS} FROM restaurant_tables WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(RestaurantTable::try_from).transpose()
    }

    async fn fetch_order(&self, id: i64) -> RepoResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Order::try_from).transpose()
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn list_menu_items(&self) -> RepoResult<Vec<MenuItem>> {
        let rows: Vec<MenuItemRow> =
            sqlx::query_as(&format!("SELECT {MENU_COLUMNS} FROM menu_items ORDER BY id"))
                .fetch_all(&self.pool)
                .await?;
        collect(rows)
    }

    async fn find_menu_item(&self, id: i64) -> RepoResult<Option<MenuItem>> {
        self.fetch_menu_item(id).await
    }

    async fn insert_menu_item(&self, data: MenuItemCreate) -> RepoResult<MenuItem> {
        let id = sqlx::query(
            "INSERT INTO menu_items (name, price, category, available) VALUES (?, ?, ?, ?)",
        )
        .bind(&data.name)
        .bind(data.price.to_string())
        .bind(&data.category)
        .bind(data.available.unwrap_or(true))
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        let item = self
            .fetch_menu_item(id)
            .await?
            .ok_or_else(|| RepoError::Database("inserted menu item vanished".into()))?;
        self.feed.publish(StoreTable::MenuItems, ChangeKind::Insert, id);
        Ok(item)
    }

    async fn update_menu_item(&self, id: i64, data: MenuItemUpdate) -> RepoResult<MenuItem> {
        let mut item = self
            .fetch_menu_item(id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("menu item {id}")))?;
        data.apply_to(&mut item);

        sqlx::query(
            "UPDATE menu_items SET name = ?, price = ?, category = ?, available = ? WHERE id = ?",
        )
        .bind(&item.name)
        .bind(item.price.to_string())
        .bind(&item.category)
        .bind(item.available)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.feed.publish(StoreTable::MenuItems, ChangeKind::Update, id);
        Ok(item)
    }

    async fn delete_menu_item(&self, id: i64) -> RepoResult<bool> {
        let affected = sqlx::query("DELETE FROM menu_items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected > 0 {
            self.feed.publish(StoreTable::MenuItems, ChangeKind::Delete, id);
        }
        Ok(affected > 0)
    }

    async fn list_tables(&self) -> RepoResult<Vec<RestaurantTable>> {
        let rows: Vec<TableRow> = sqlx::query_as(&format!(
            "SELECT {TABLE_COLUMNS} FROM restaurant_tables ORDER BY table_number"
        ))
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn find_table(&self, id: i64) -> RepoResult<Option<RestaurantTable>> {
        self.fetch_table(id).await
    }

    async fn find_table_by_number(&self, table_number: i32) -> RepoResult<Option<RestaurantTable>> {
        let row: Option<TableRow> = sqlx::query_as(&format!(
            "SELECT {TABLE_COLUMNS} FROM restaurant_tables WHERE table_number = ?"
        ))
        .bind(table_number)
        .fetch_optional(&self.pool)
        .await?;
        row.map(RestaurantTable::try_from).transpose()
    }

    async fn insert_table(&self, table_number: i32) -> RepoResult<RestaurantTable> {
        if table_number <= 0 {
            return Err(RepoError::Validation(format!(
                "table number must be positive: {table_number}"
            )));
        }
        let id = sqlx::query("INSERT INTO restaurant_tables (table_number, status) VALUES (?, ?)")
            .bind(table_number)
            .bind(TableStatus::Available.as_str())
            .execute(&self.pool)
            .await?
            .last_insert_rowid();

        let table = self
            .fetch_table(id)
            .await?
            .ok_or_else(|| RepoError::Database("inserted table vanished".into()))?;
        self.feed.publish(StoreTable::RestaurantTables, ChangeKind::Insert, id);
        Ok(table)
    }

    async fn update_table(&self, table: &RestaurantTable) -> RepoResult<RestaurantTable> {
        let affected = sqlx::query(
            "UPDATE restaurant_tables SET status = ?, current_order_id = ? WHERE id = ?",
        )
        .bind(table.status.as_str())
        .bind(&table.current_order_id)
        .bind(table.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(RepoError::NotFound(format!("table {}", table.id)));
        }

        let updated = self
            .fetch_table(table.id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("table {}", table.id)))?;
        self.feed.publish(StoreTable::RestaurantTables, ChangeKind::Update, table.id);
        Ok(updated)
    }

    async fn delete_table(&self, id: i64) -> RepoResult<bool> {
        let affected = sqlx::query("DELETE FROM restaurant_tables WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected > 0 {
            self.feed.publish(StoreTable::RestaurantTables, ChangeKind::Delete, id);
        }
        Ok(affected > 0)
    }

    async fn list_orders(&self, filter: OrderFilter) -> RepoResult<Vec<Order>> {
        // LIMIT -1 means unbounded in SQLite
        let limit = filter.limit.map_or(-1, |l| l as i64);
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR table_number = ?2) \
             ORDER BY id DESC LIMIT ?3"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.table_number)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        collect(rows)
    }

    async fn find_order(&self, id: i64) -> RepoResult<Option<Order>> {
        self.fetch_order(id).await
    }

    async fn find_order_by_receipt(&self, receipt_id: &str) -> RepoResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE receipt_id = ?"))
                .bind(receipt_id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Order::try_from).transpose()
    }

    async fn insert_order(&self, draft: OrderDraft) -> RepoResult<Order> {
        let items = serde_json::to_string(&draft.items)
            .map_err(|e| RepoError::Validation(format!("order items: {e}")))?;

        let id = sqlx::query(
            "INSERT INTO orders (receipt_id, table_number, items, subtotal, tip_amount, total, \
             status, payment_method, payment_status, payment_type, transaction_id, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&draft.receipt_id)
        .bind(draft.table_number)
        .bind(items)
        .bind(draft.subtotal.to_string())
        .bind(draft.tip_amount.to_string())
        .bind(draft.total.to_string())
        .bind(draft.status.as_str())
        .bind(draft.payment_method.map(|m| m.as_str()))
        .bind(draft.payment_status.as_str())
        .bind(draft.payment_type.map(|t| t.as_str()))
        .bind(&draft.transaction_id)
        .bind(draft.created_at)
        .bind(draft.updated_at)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.feed.publish(StoreTable::Orders, ChangeKind::Insert, id);
        Ok(draft.into_order(id))
    }

    async fn update_order(&self, order: &Order) -> RepoResult<Order> {
        let affected = sqlx::query(
            "UPDATE orders SET status = ?, payment_method = ?, payment_status = ?, \
             payment_type = ?, transaction_id = ?, updated_at = ? WHERE id = ?",
        )
        .bind(order.status.as_str())
        .bind(order.payment_method.map(|m| m.as_str()))
        .bind(order.payment_status.as_str())
        .bind(order.payment_type.map(|t| t.as_str()))
        .bind(&order.transaction_id)
        .bind(now_millis())
        .bind(order.id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if affected == 0 {
            return Err(RepoError::NotFound(format!("order {}", order.id)));
        }

        let updated = self
            .fetch_order(order.id)
            .await?
            .ok_or_else(|| RepoError::NotFound(format!("order {}", order.id)))?;
        self.feed.publish(StoreTable::Orders, ChangeKind::Update, order.id);
        Ok(updated)
    }

    async fn ping(&self) -> RepoResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
