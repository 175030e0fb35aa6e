//! Chat Session API 模块 (顾客端，公共)
//!
//! | 路径 | 方法 | 说明 |
//! |------|------|------|
//! | /api/sessions | POST | 扫码开始会话 |
//! | /api/sessions/{id} | GET / DELETE | 查看 / 放弃会话 |
//! | /api/sessions/{id}/actions | POST | 流程按钮 |
//! | /api/sessions/{id}/messages | POST | 自由文本 |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/sessions", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id).delete(handler::delete))
        .route("/{id}/actions", post(handler::apply_action))
        .route("/{id}/messages", post(handler::post_message))
}
