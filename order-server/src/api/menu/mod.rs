//! Menu API 模块
//!
//! - `GET /api/menu` - 顾客端菜单 (公共，读取缓存快照)
//! - `/api/admin/menu` - 员工端菜单管理

mod handler;

use axum::{
    Router, middleware,
    routing::{get, put},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/menu", get(handler::public_menu))
        .nest("/api/admin/menu", admin_routes())
}

fn admin_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", put(handler::update).delete(handler::delete))
        .route("/{id}/availability", put(handler::set_availability))
        .layer(middleware::from_fn(require_admin))
}
