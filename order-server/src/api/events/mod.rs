//! 变更事件流 (SSE)
//!
//! `GET /api/admin/events[?table=orders]` 将存储变更实时推送给员工端看板。
//! 事件只告知"哪张表哪一行变了"，客户端收到后自行重新拉取。

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    Router,
    extract::{Query, State},
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::auth::require_admin;
use crate::core::ServerState;
use crate::message::{ChangeEvent, StoreTable};

/// 心跳间隔
const KEEP_ALIVE_SECS: u64 = 15;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/admin/events", get(stream_events))
        .layer(middleware::from_fn(require_admin))
}

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// 只推送指定表的变更
    pub table: Option<StoreTable>,
}

/// GET /api/admin/events
pub async fn stream_events(
    State(state): State<ServerState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(table = ?query.table, "SSE client connected");
    let rx = state.feed.receiver();
    let stream = change_stream(rx, query.table)
        .take_until(state.feed.shutdown_token().clone().cancelled_owned());
    Sse::new(stream)
        .keep_alive(KeepAlive::new().interval(Duration::from_secs(KEEP_ALIVE_SECS)))
}

/// 广播接收端转为 SSE 事件流
///
/// 落后时发送 `resync` 事件提示客户端全量刷新；通道关闭后结束。
/// 服务器关闭时由 feed 的取消令牌截断。
fn change_stream(
    rx: broadcast::Receiver<ChangeEvent>,
    table: Option<StoreTable>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(change) => {
                    if table.is_some_and(|t| t != change.table) {
                        continue;
                    }
                    let event = Event::default()
                        .event(change.table.as_str())
                        .id(change.version.to_string())
                        .json_data(&change)
                        .unwrap_or_else(|_| Event::default().event("error"));
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "SSE client lagged behind change feed");
                    let event = Event::default().event("resync").data(skipped.to_string());
                    return Some((Ok(event), rx));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
}
