//! Order API 模块
//!
//! - `GET /api/orders/track/{receipt_id}` - 顾客按收据号追踪 (公共)
//! - `/api/admin/orders` - 员工端订单管理

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/orders/track/{receipt_id}", get(handler::track))
        .nest("/api/admin/orders", admin_routes())
}

fn admin_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/summary", get(handler::summary))
        .route("/board", get(handler::board))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/confirm", post(handler::confirm))
        .route("/{id}/cancel", post(handler::cancel))
        .route("/{id}/payment", post(handler::record_payment))
        .route("/{id}/status", put(handler::update_status))
        .layer(middleware::from_fn(require_admin))
}
