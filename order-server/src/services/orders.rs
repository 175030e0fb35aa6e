//! 订单提交与查询
//!
//! 顾客流程只会创建订单；后续状态变更全部由 [`AdminService`](super::AdminService) 负责。

use std::sync::Arc;

use shared::models::Order;
use shared::order::{Checkout, generate_receipt_code};
use shared::util::now_millis;

use super::notify::StaffNotifier;
use crate::db::{RepoError, Store};
use crate::utils::{AppError, AppResult, ErrorCode};

/// 收据号生成最大尝试次数
pub const MAX_RECEIPT_ATTEMPTS: usize = 5;

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    notifier: Arc<dyn StaffNotifier>,
}

impl std::fmt::Debug for OrderService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderService").finish_non_exhaustive()
    }
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn StaffNotifier>) -> Self {
        Self { store, notifier }
    }

    /// 持久化一次结账
    ///
    /// 收据号冲突时重新生成；存储失败直接返回，不重试。
    /// 成功后异步通知员工，通知失败只记录 warn。
    pub async fn submit(&self, checkout: Checkout, table_number: i32) -> AppResult<Order> {
        if checkout.items.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty));
        }

        let order = self.insert_with_fresh_code(checkout, table_number).await?;
        tracing::info!(
            receipt_id = %order.receipt_id,
            table = order.table_number,
            total = %order.total,
            items = order.item_count(),
            "Order submitted"
        );

        let notifier = Arc::clone(&self.notifier);
        let placed = order.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.notify(&placed).await {
                tracing::warn!(receipt_id = %placed.receipt_id, error = %e, "staff notification failed");
            }
        });

        Ok(order)
    }

    async fn insert_with_fresh_code(&self, checkout: Checkout, table_number: i32) -> AppResult<Order> {
        for attempt in 1..=MAX_RECEIPT_ATTEMPTS {
            let code = generate_receipt_code();
            if self.store.find_order_by_receipt(&code).await?.is_some() {
                tracing::debug!(attempt, receipt_id = %code, "receipt code taken, regenerating");
                continue;
            }

            let draft = checkout.clone().into_draft(code, table_number, now_millis());
            match self.store.insert_order(draft).await {
                Ok(order) => return Ok(order),
                Err(RepoError::Duplicate(msg)) => {
                    tracing::debug!(attempt, %msg, "receipt code collided on insert");
                }
                Err(e) => {
                    tracing::error!(table = table_number, error = %e, "Failed to persist order");
                    return Err(AppError::database(format!(
                        "Could not place the order, please try again: {e}"
                    )));
                }
            }
        }
        Err(AppError::new(ErrorCode::ReceiptCodeExhausted))
    }

    /// 按收据号查询 (顾客追踪)
    pub async fn track(&self, receipt_id: &str) -> AppResult<Order> {
        let receipt_id = receipt_id.trim();
        if receipt_id.is_empty() {
            return Err(AppError::required("receipt_id"));
        }
        self.store
            .find_order_by_receipt(receipt_id)
            .await?
            .ok_or_else(|| {
                AppError::with_message(ErrorCode::OrderNotFound, format!("Order {receipt_id} not found"))
            })
    }
}
