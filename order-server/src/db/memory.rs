//! In-memory store
//!
//! Default backend. Data lives for the process lifetime only.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use shared::message::{ChangeKind, StoreTable};
use shared::models::{
    MenuItem, MenuItemCreate, MenuItemUpdate, Order, OrderDraft, RestaurantTable, TableStatus,
};
use shared::util::now_millis;

use super::{OrderFilter, RepoError, RepoResult, Store};
use crate::message::ChangeFeed;

#[derive(Debug)]
pub struct MemoryStore {
    menu_items: RwLock<BTreeMap<i64, MenuItem>>,
    tables: RwLock<BTreeMap<i64, RestaurantTable>>,
    orders: RwLock<BTreeMap<i64, Order>>,
    menu_seq: AtomicI64,
    table_seq: AtomicI64,
    order_seq: AtomicI64,
    feed: ChangeFeed,
}

impl MemoryStore {
    pub fn new(feed: ChangeFeed) -> Self {
        Self {
            menu_items: RwLock::new(BTreeMap::new()),
            tables: RwLock::new(BTreeMap::new()),
            orders: RwLock::new(BTreeMap::new()),
            menu_seq: AtomicI64::new(0),
            table_seq: AtomicI64::new(0),
            order_seq: AtomicI64::new(0),
            feed,
        }
    }

    fn next_id(seq: &AtomicI64) -> i64 {
        seq.fetch_add(1, Ordering::SeqCst) + 1
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn list_menu_items(&self) -> RepoResult<Vec<MenuItem>> {
        Ok(self.menu_items.read().values().cloned().collect())
    }

    async fn find_menu_item(&self, id: i64) -> RepoResult<Option<MenuItem>> {
        Ok(self.menu_items.read().get(&id).cloned())
    }

    async fn insert_menu_item(&self, data: MenuItemCreate) -> RepoResult<MenuItem> {
        let item = MenuItem {
            id: Self::next_id(&self.menu_seq),
            name: data.name,
            price: data.price,
            category: data.category,
            available: data.available.unwrap_or(true),
        };
        self.menu_items.write().insert(item.id, item.clone());
        self.feed.publish(StoreTable::MenuItems, ChangeKind::Insert, item.id);
        Ok(item)
    }

    async fn update_menu_item(&self, id: i64, data: MenuItemUpdate) -> RepoResult<MenuItem> {
        let updated = {
            let mut items = self.menu_items.write();
            let item = items
                .get_mut(&id)
                .ok_or_else(|| RepoError::NotFound(format!("menu item {id}")))?;
            data.apply_to(item);
            item.clone()
        };
        self.feed.publish(StoreTable::MenuItems, ChangeKind::Update, id);
        Ok(updated)
    }

    async fn delete_menu_item(&self, id: i64) -> RepoResult<bool> {
        let removed = self.menu_items.write().remove(&id).is_some();
        if removed {
            self.feed.publish(StoreTable::MenuItems, ChangeKind::Delete, id);
        }
        Ok(removed)
    }

    async fn list_tables(&self) -> RepoResult<Vec<RestaurantTable>> {
        let mut tables: Vec<_> = self.tables.read().values().cloned().collect();
        tables.sort_by_key(|t| t.table_number);
        Ok(tables)
    }

    async fn find_table(&self, id: i64) -> RepoResult<Option<RestaurantTable>> {
        Ok(self.tables.read().get(&id).cloned())
    }

    async fn find_table_by_number(&self, table_number: i32) -> RepoResult<Option<RestaurantTable>> {
        Ok(self
            .tables
            .read()
            .values()
            .find(|t| t.table_number == table_number)
            .cloned())
    }

    async fn insert_table(&self, table_number: i32) -> RepoResult<RestaurantTable> {
        if table_number <= 0 {
            return Err(RepoError::Validation(format!(
                "table number must be positive: {table_number}"
            )));
        }
        let table = {
            let mut tables = self.tables.write();
            if tables.values().any(|t| t.table_number == table_number) {
                return Err(RepoError::Duplicate(format!("table number {table_number}")));
            }
            let table = RestaurantTable {
                id: Self::next_id(&self.table_seq),
                table_number,
                status: TableStatus::Available,
                current_order_id: None,
            };
            tables.insert(table.id, table.clone());
            table
        };
        self.feed.publish(StoreTable::RestaurantTables, ChangeKind::Insert, table.id);
        Ok(table)
    }

    async fn update_table(&self, table: &RestaurantTable) -> RepoResult<RestaurantTable> {
        let updated = {
            let mut tables = self.tables.write();
            let existing = tables
                .get_mut(&table.id)
                .ok_or_else(|| RepoError::NotFound(format!("table {}", table.id)))?;
            existing.status = table.status;
            existing.current_order_id = table.current_order_id.clone();
            existing.clone()
        };
        self.feed.publish(StoreTable::RestaurantTables, ChangeKind::Update, table.id);
        Ok(updated)
    }

    async fn delete_table(&self, id: i64) -> RepoResult<bool> {
        let removed = self.tables.write().remove(&id).is_some();
        if removed {
            self.feed.publish(StoreTable::RestaurantTables, ChangeKind::Delete, id);
        }
        Ok(removed)
    }

    async fn list_orders(&self, filter: OrderFilter) -> RepoResult<Vec<Order>> {
        let orders = self.orders.read();
        let matching = orders.values().rev().filter(|o| filter.matches(o)).cloned();
        Ok(match filter.limit {
            Some(limit) => matching.take(limit).collect(),
            None => matching.collect(),
        })
    }

    async fn find_order(&self, id: i64) -> RepoResult<Option<Order>> {
        Ok(self.orders.read().get(&id).cloned())
    }

    async fn find_order_by_receipt(&self, receipt_id: &str) -> RepoResult<Option<Order>> {
        Ok(self
            .orders
            .read()
            .values()
            .find(|o| o.receipt_id == receipt_id)
            .cloned())
    }

    async fn insert_order(&self, draft: OrderDraft) -> RepoResult<Order> {
        let order = {
            let mut orders = self.orders.write();
            if orders.values().any(|o| o.receipt_id == draft.receipt_id) {
                return Err(RepoError::Duplicate(format!("receipt {}", draft.receipt_id)));
            }
            let order = draft.into_order(Self::next_id(&self.order_seq));
            orders.insert(order.id, order.clone());
            order
        };
        self.feed.publish(StoreTable::Orders, ChangeKind::Insert, order.id);
        Ok(order)
    }

    async fn update_order(&self, order: &Order) -> RepoResult<Order> {
        let updated = {
            let mut orders = self.orders.write();
            let existing = orders
                .get_mut(&order.id)
                .ok_or_else(|| RepoError::NotFound(format!("order {}", order.id)))?;
            existing.status = order.status;
            existing.payment_method = order.payment_method;
            existing.payment_status = order.payment_status;
            existing.payment_type = order.payment_type;
            existing.transaction_id = order.transaction_id.clone();
            existing.updated_at = now_millis();
            existing.clone()
        };
        self.feed.publish(StoreTable::Orders, ChangeKind::Update, order.id);
        Ok(updated)
    }

    async fn ping(&self) -> RepoResult<()> {
        Ok(())
    }
}
