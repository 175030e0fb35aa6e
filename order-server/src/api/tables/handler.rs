//! Restaurant Table API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::models::{RestaurantTable, TableStatus};

use crate::core::ServerState;
use crate::services::QrCode;
use crate::utils::{AppError, AppResult};

/// GET /api/admin/tables - 获取所有桌台 (按桌号)
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<RestaurantTable>>> {
    Ok(Json(state.admin.list_tables().await?))
}

/// GET /api/admin/tables/:id - 获取单个桌台
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<RestaurantTable>> {
    Ok(Json(state.admin.get_table(id).await?))
}

/// POST /api/admin/tables - 新增桌台 (桌号 = 当前最大桌号 + 1)
pub async fn create(State(state): State<ServerState>) -> AppResult<Json<RestaurantTable>> {
    Ok(Json(state.admin.add_table().await?))
}

/// DELETE /api/admin/tables/:id - 删除桌台
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<bool>> {
    state.admin.remove_table(id).await?;
    Ok(Json(true))
}

/// POST /api/admin/tables/:id/release - 手动释放桌台
pub async fn release(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<RestaurantTable>> {
    Ok(Json(state.admin.release_table(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct TableStatusRequest {
    pub status: TableStatus,
}

/// PUT /api/admin/tables/:id/status
pub async fn update_status(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<TableStatusRequest>,
) -> AppResult<Json<RestaurantTable>> {
    Ok(Json(state.admin.set_table_status(id, payload.status).await?))
}

/// GET /api/admin/tables/:id/qr - 桌台二维码
pub async fn qr_code(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<QrCode>> {
    let table = state.admin.get_table(id).await?;
    let qr = state.qr.for_table(table.table_number).ok_or_else(|| {
        AppError::internal(format!(
            "QR service URL is invalid: {}",
            state.config.qr_service_url
        ))
    })?;
    Ok(Json(qr))
}
