//! Order API Handlers

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use shared::models::{Order, OrderStatus, PaymentMethod};

use crate::core::ServerState;
use crate::db::OrderFilter;
use crate::services::{OrderSummary, ReceiptView};
use crate::utils::AppResult;

/// GET /api/orders/track/:receipt_id - 顾客追踪订单
pub async fn track(
    State(state): State<ServerState>,
    Path(receipt_id): Path<String>,
) -> AppResult<Json<ReceiptView>> {
    let order = state.orders.track(&receipt_id).await?;
    Ok(Json(ReceiptView::from_order(&order)))
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub table_number: Option<i32>,
    pub limit: Option<usize>,
}

/// GET /api/admin/orders - 订单列表 (新订单在前)
pub async fn list(
    State(state): State<ServerState>,
    Query(query): Query<OrderQuery>,
) -> AppResult<Json<Vec<Order>>> {
    let filter = OrderFilter {
        status: query.status,
        table_number: query.table_number,
        limit: query.limit,
    };
    let orders = state.admin.list_orders(filter).await?;
    Ok(Json(orders))
}

/// GET /api/admin/orders/summary - 按状态统计
pub async fn summary(State(state): State<ServerState>) -> AppResult<Json<OrderSummary>> {
    Ok(Json(state.admin.order_summary().await?))
}

/// GET /api/admin/orders/board - 进行中订单 (内存快照)
pub async fn board(State(state): State<ServerState>) -> Json<Vec<Order>> {
    Json(state.order_board.snapshot().as_ref().clone())
}

/// GET /api/admin/orders/:id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.admin.get_order(id).await?))
}

/// POST /api/admin/orders/:id/confirm - 确认订单并占用桌台
pub async fn confirm(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.admin.confirm_order(id).await?))
}

/// POST /api/admin/orders/:id/cancel
pub async fn cancel(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.admin.cancel_order(id).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct PaymentRequest {
    pub method: Option<PaymentMethod>,
}

/// POST /api/admin/orders/:id/payment - 收款并释放桌台
///
/// 请求体可省略
pub async fn record_payment(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    payload: Option<Json<PaymentRequest>>,
) -> AppResult<Json<Order>> {
    let method = payload.and_then(|Json(p)| p.method);
    Ok(Json(state.admin.record_payment(id, method).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: OrderStatus,
}

/// PUT /api/admin/orders/:id/status
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<StatusRequest>,
) -> AppResult<Json<Order>> {
    Ok(Json(state.admin.update_status(id, payload.status).await?))
}
