//! 员工后台业务
//!
//! 订单状态流转、桌台占用、菜单维护。所有写入都经过 [`Store`]，
//! 由存储层发布变更事件。
//!
//! # 桌台占用
//!
//! ```text
//! confirm_order ──▶ table.booked  + current_order_id = receipt
//! record_payment ─┐
//! cancel_order ───┼─▶ table.available + current_order_id = None
//! release_table ──┘
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use shared::models::{
    MenuItem, MenuItemCreate, MenuItemUpdate, Order, OrderStatus, PaymentMethod, PaymentStatus,
    RestaurantTable, TableStatus, next_table_number,
};

use crate::db::{OrderFilter, RepoError, Store};
use crate::utils::validation::{
    MAX_CATEGORY_LEN, MAX_NAME_LEN, validate_optional_text, validate_price, validate_required_text,
};
use crate::utils::{AppError, AppResult, ErrorCode};

/// 订单统计
#[derive(Debug, Clone, Serialize)]
pub struct OrderSummary {
    /// 每个状态的订单数 (包含 0)
    pub counts: BTreeMap<&'static str, usize>,
    /// 未支付也未取消的订单数
    pub active: usize,
    /// 已支付订单总额
    pub paid_revenue: Decimal,
}

#[derive(Clone)]
pub struct AdminService {
    store: Arc<dyn Store>,
}

impl std::fmt::Debug for AdminService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminService").finish_non_exhaustive()
    }
}

fn order_not_found(id: i64) -> AppError {
    AppError::with_message(ErrorCode::OrderNotFound, format!("Order {id} not found"))
        .with_detail("id", id)
}

fn table_not_found(id: i64) -> AppError {
    AppError::with_message(ErrorCode::TableNotFound, format!("Table {id} not found"))
        .with_detail("id", id)
}

fn menu_item_not_found(id: i64) -> AppError {
    AppError::with_message(ErrorCode::MenuItemNotFound, format!("Menu item {id} not found"))
        .with_detail("id", id)
}

fn invalid_transition(order: &Order, target: OrderStatus) -> AppError {
    AppError::with_message(
        ErrorCode::OrderInvalidTransition,
        format!("Order {} cannot move from {} to {}", order.receipt_id, order.status, target),
    )
    .with_detail("from", order.status.as_str())
    .with_detail("to", target.as_str())
}

impl AdminService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // ========== Orders ==========

    pub async fn list_orders(&self, filter: OrderFilter) -> AppResult<Vec<Order>> {
        Ok(self.store.list_orders(filter).await?)
    }

    pub async fn get_order(&self, id: i64) -> AppResult<Order> {
        self.store
            .find_order(id)
            .await?
            .ok_or_else(|| order_not_found(id))
    }

    /// 确认订单并占用桌台
    ///
    /// 桌台已被另一个进行中的订单占用时返回 `TableOccupied`；
    /// 桌台不存在时仍然确认订单，只记录警告。
    pub async fn confirm_order(&self, id: i64) -> AppResult<Order> {
        let mut order = self.get_order(id).await?;
        if !order.status.can_transition_to(OrderStatus::Confirmed) {
            return Err(invalid_transition(&order, OrderStatus::Confirmed));
        }

        let table = self.store.find_table_by_number(order.table_number).await?;
        if let Some(table) = &table {
            self.ensure_table_free_for(table, &order).await?;
        }

        order.status = OrderStatus::Confirmed;
        let order = self.store.update_order(&order).await?;

        match table {
            Some(mut table) => {
                table.book_for(order.receipt_id.clone());
                self.store.update_table(&table).await?;
            }
            None => {
                tracing::warn!(
                    receipt_id = %order.receipt_id,
                    table = order.table_number,
                    "Confirmed order references a missing table"
                );
            }
        }

        tracing::info!(receipt_id = %order.receipt_id, table = order.table_number, "Order confirmed");
        Ok(order)
    }

    async fn ensure_table_free_for(&self, table: &RestaurantTable, order: &Order) -> AppResult<()> {
        let Some(linked) = table.current_order_id.as_deref() else {
            return Ok(());
        };
        if linked == order.receipt_id {
            return Ok(());
        }
        // 关联订单已结束则视为陈旧占用，可覆盖
        let still_active = self
            .store
            .find_order_by_receipt(linked)
            .await?
            .is_some_and(|o| o.is_active());
        if still_active {
            return Err(AppError::with_message(
                ErrorCode::TableOccupied,
                format!("Table {} is occupied by order {linked}", table.table_number),
            )
            .with_detail("table_number", table.table_number)
            .with_detail("current_order_id", linked));
        }
        Ok(())
    }

    /// 记录付款：订单 paid，释放桌台
    ///
    /// `method` 为空时沿用已有方式 (pay-now 订单)，否则默认现金。
    pub async fn record_payment(&self, id: i64, method: Option<PaymentMethod>) -> AppResult<Order> {
        let mut order = self.get_order(id).await?;
        if !order.status.can_transition_to(OrderStatus::Paid) {
            return Err(invalid_transition(&order, OrderStatus::Paid));
        }

        order.status = OrderStatus::Paid;
        order.payment_status = PaymentStatus::Paid;
        order.payment_method = order
            .payment_method
            .or(method)
            .or(Some(PaymentMethod::Cash));
        let order = self.store.update_order(&order).await?;
        self.release_linked_table(&order).await?;

        tracing::info!(
            receipt_id = %order.receipt_id,
            method = order.payment_method.map(|m| m.as_str()).unwrap_or_default(),
            total = %order.total,
            "Payment recorded"
        );
        Ok(order)
    }

    /// 取消订单，释放桌台
    pub async fn cancel_order(&self, id: i64) -> AppResult<Order> {
        let mut order = self.get_order(id).await?;
        if !order.status.can_transition_to(OrderStatus::Cancelled) {
            return Err(invalid_transition(&order, OrderStatus::Cancelled));
        }

        order.status = OrderStatus::Cancelled;
        let order = self.store.update_order(&order).await?;
        self.release_linked_table(&order).await?;

        tracing::info!(receipt_id = %order.receipt_id, "Order cancelled");
        Ok(order)
    }

    /// 通用状态变更
    ///
    /// 重复设置相同状态不做任何修改；`paid` 必须通过 [`record_payment`](Self::record_payment)。
    pub async fn update_status(&self, id: i64, status: OrderStatus) -> AppResult<Order> {
        let order = self.get_order(id).await?;
        if order.status == status {
            return Ok(order);
        }
        match status {
            OrderStatus::Paid => Err(invalid_transition(&order, status)
                .with_detail("hint", "record the payment instead")),
            OrderStatus::Confirmed => self.confirm_order(id).await,
            OrderStatus::Cancelled => self.cancel_order(id).await,
            _ => {
                if !order.status.can_transition_to(status) {
                    return Err(invalid_transition(&order, status));
                }
                let mut order = order;
                order.status = status;
                let order = self.store.update_order(&order).await?;
                tracing::info!(receipt_id = %order.receipt_id, status = %status, "Order status updated");
                Ok(order)
            }
        }
    }

    async fn release_linked_table(&self, order: &Order) -> AppResult<()> {
        let Some(mut table) = self.store.find_table_by_number(order.table_number).await? else {
            return Ok(());
        };
        if table.current_order_id.as_deref() == Some(order.receipt_id.as_str()) {
            table.release();
            self.store.update_table(&table).await?;
            tracing::debug!(table = table.table_number, "Table released");
        }
        Ok(())
    }

    /// 按状态统计
    pub async fn order_summary(&self) -> AppResult<OrderSummary> {
        let orders = self.store.list_orders(OrderFilter::default()).await?;
        let mut counts: BTreeMap<&'static str, usize> =
            OrderStatus::ALL.iter().map(|s| (s.as_str(), 0)).collect();
        for order in &orders {
            *counts.entry(order.status.as_str()).or_default() += 1;
        }
        Ok(OrderSummary {
            counts,
            active: orders.iter().filter(|o| o.is_active()).count(),
            paid_revenue: orders
                .iter()
                .filter(|o| o.payment_status == PaymentStatus::Paid)
                .map(|o| o.total)
                .sum(),
        })
    }

    // ========== Tables ==========

    pub async fn list_tables(&self) -> AppResult<Vec<RestaurantTable>> {
        Ok(self.store.list_tables().await?)
    }

    pub async fn get_table(&self, id: i64) -> AppResult<RestaurantTable> {
        self.store
            .find_table(id)
            .await?
            .ok_or_else(|| table_not_found(id))
    }

    /// 新增桌台，编号为现有最大编号 + 1
    pub async fn add_table(&self) -> AppResult<RestaurantTable> {
        let tables = self.store.list_tables().await?;
        let number = next_table_number(&tables);
        match self.store.insert_table(number).await {
            Ok(table) => {
                tracing::info!(table = table.table_number, "Table added");
                Ok(table)
            }
            Err(RepoError::Duplicate(_)) => Err(AppError::with_message(
                ErrorCode::TableNumberExists,
                format!("Table {number} already exists"),
            )),
            Err(e) => Err(e.into()),
        }
    }

    /// 删除桌台，不重新编号
    pub async fn remove_table(&self, id: i64) -> AppResult<()> {
        if !self.store.delete_table(id).await? {
            return Err(table_not_found(id));
        }
        tracing::info!(table_id = id, "Table removed");
        Ok(())
    }

    /// 无论订单状态如何，清除占用
    pub async fn release_table(&self, id: i64) -> AppResult<RestaurantTable> {
        let mut table = self.get_table(id).await?;
        table.release();
        Ok(self.store.update_table(&table).await?)
    }

    /// 手动设置桌台状态；设为 available 同时清除关联订单
    pub async fn set_table_status(&self, id: i64, status: TableStatus) -> AppResult<RestaurantTable> {
        let mut table = self.get_table(id).await?;
        match status {
            TableStatus::Available => table.release(),
            other => table.status = other,
        }
        Ok(self.store.update_table(&table).await?)
    }

    // ========== Menu ==========

    pub async fn list_menu_items(&self) -> AppResult<Vec<MenuItem>> {
        Ok(self.store.list_menu_items().await?)
    }

    pub async fn create_menu_item(&self, data: MenuItemCreate) -> AppResult<MenuItem> {
        validate_required_text(&data.name, "name", MAX_NAME_LEN)?;
        validate_required_text(&data.category, "category", MAX_CATEGORY_LEN)?;
        validate_price(data.price, "price")?;

        let item = self.store.insert_menu_item(data).await?;
        tracing::info!(menu_item_id = item.id, name = %item.name, "Menu item created");
        Ok(item)
    }

    pub async fn update_menu_item(&self, id: i64, data: MenuItemUpdate) -> AppResult<MenuItem> {
        validate_optional_text(&data.name, "name", MAX_NAME_LEN)?;
        validate_optional_text(&data.category, "category", MAX_CATEGORY_LEN)?;
        if let Some(price) = data.price {
            validate_price(price, "price")?;
        }

        match self.store.update_menu_item(id, data).await {
            Ok(item) => Ok(item),
            Err(RepoError::NotFound(_)) => Err(menu_item_not_found(id)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_menu_item(&self, id: i64) -> AppResult<()> {
        if !self.store.delete_menu_item(id).await? {
            return Err(menu_item_not_found(id));
        }
        tracing::info!(menu_item_id = id, "Menu item deleted");
        Ok(())
    }

    pub async fn set_availability(&self, id: i64, available: bool) -> AppResult<MenuItem> {
        self.update_menu_item(
            id,
            MenuItemUpdate {
                available: Some(available),
                ..Default::default()
            },
        )
        .await
    }
}
