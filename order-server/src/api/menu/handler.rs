//! Menu API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::models::{MenuCategory, MenuItem, MenuItemCreate, MenuItemUpdate, group_by_category};

use crate::core::ServerState;
use crate::utils::AppResult;

/// GET /api/menu - 可点菜品，按分类分组
///
/// 读取内存快照，不访问存储
pub async fn public_menu(State(state): State<ServerState>) -> Json<Vec<MenuCategory>> {
    let snapshot = state.menu_cache.snapshot();
    let available = snapshot.iter().filter(|item| item.available).cloned();
    Json(group_by_category(available))
}

/// GET /api/admin/menu - 全部菜品 (含下架)
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<Vec<MenuItem>>> {
    let items = state.admin.list_menu_items().await?;
    Ok(Json(items))
}

/// POST /api/admin/menu - 新建菜品
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<MenuItemCreate>,
) -> AppResult<Json<MenuItem>> {
    let item = state.admin.create_menu_item(payload).await?;
    Ok(Json(item))
}

/// PUT /api/admin/menu/:id - 更新菜品
pub async fn update(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<MenuItemUpdate>,
) -> AppResult<Json<MenuItem>> {
    let item = state.admin.update_menu_item(id, payload).await?;
    Ok(Json(item))
}

/// DELETE /api/admin/menu/:id - 删除菜品
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<bool>> {
    state.admin.delete_menu_item(id).await?;
    Ok(Json(true))
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityRequest {
    pub available: bool,
}

/// PUT /api/admin/menu/:id/availability - 上架/下架
pub async fn set_availability(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<AvailabilityRequest>,
) -> AppResult<Json<MenuItem>> {
    let item = state.admin.set_availability(id, payload.available).await?;
    Ok(Json(item))
}
