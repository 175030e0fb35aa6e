//! Restaurant Table API 模块 (员工端)

mod handler;

use axum::{
    Router, middleware,
    routing::{get, post, put},
};

use crate::auth::require_admin;
use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/admin/tables", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}", get(handler::get_by_id).delete(handler::delete))
        .route("/{id}/release", post(handler::release))
        .route("/{id}/status", put(handler::update_status))
        .route("/{id}/qr", get(handler::qr_code))
        .layer(middleware::from_fn(require_admin))
}
