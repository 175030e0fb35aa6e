//! Chat Session API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use serde::Deserialize;
use shared::order::ChatAction;
use uuid::Uuid;

use crate::core::ServerState;
use crate::services::SessionView;
use crate::utils::AppResult;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub table_number: i32,
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// POST /api/sessions - 开始会话
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateSessionRequest>,
) -> AppResult<Json<SessionView>> {
    let view = state.sessions.create(payload.table_number).await?;
    Ok(Json(view))
}

/// GET /api/sessions/:id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SessionView>> {
    Ok(Json(state.sessions.get(id)?))
}

/// DELETE /api/sessions/:id - 放弃会话 (购物车直接丢弃)
pub async fn delete(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<bool>> {
    state.sessions.delete(id)?;
    Ok(Json(true))
}

/// POST /api/sessions/:id/actions
pub async fn apply_action(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(action): Json<ChatAction>,
) -> AppResult<Json<SessionView>> {
    let view = state.sessions.apply(id, action).await?;
    Ok(Json(view))
}

/// POST /api/sessions/:id/messages
pub async fn post_message(
    State(state): State<ServerState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MessageRequest>,
) -> AppResult<Json<SessionView>> {
    let view = state.sessions.post_message(id, &payload.text).await?;
    Ok(Json(view))
}
