//! 变更订阅通道
//!
//! # 架构
//!
//! ```text
//! Store mutation ──▶ ChangeFeed::publish() ──▶ broadcast::Sender<ChangeEvent>
//!                                                   │
//!                     ┌─────────────────────────────┼───────────────────┐
//!                     ▼                             ▼                   ▼
//!          subscribe(table, mask, cb)    subscribe(...)          receiver() (SSE)
//!                     │
//!               Subscription (drop / cancel ⇒ 停止投递)
//! ```
//!
//! 订阅回调只用来触发重新拉取，事件本身不携带行数据。

use std::sync::Arc;

use dashmap::DashMap;
use futures::future::BoxFuture;
use shared::message::{ChangeEvent, ChangeKind, EventMask, StoreTable};
use shared::util::now_millis;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// 默认通道容量
const DEFAULT_CAPACITY: usize = 1024;

/// 订阅回调
pub type ChangeCallback = Arc<dyn Fn(ChangeEvent) -> BoxFuture<'static, ()> + Send + Sync>;

/// 资源版本管理器
///
/// 每张表维护独立的单调递增版本号，客户端可据此判断数据新旧。
#[derive(Debug, Default)]
pub struct ResourceVersions {
    versions: DashMap<StoreTable, u64>,
}

impl ResourceVersions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 递增版本号 (从 1 开始)，并在持有该表条目锁期间执行 `f`
    ///
    /// 同一张表的 `f` 串行执行，顺序与版本号一致。
    pub fn increment_with<R>(&self, table: StoreTable, f: impl FnOnce(u64) -> R) -> R {
        let mut entry = self.versions.entry(table).or_insert(0);
        *entry += 1;
        f(*entry)
    }

    /// 当前版本号，未变更过为 0
    pub fn get(&self, table: StoreTable) -> u64 {
        self.versions.get(&table).map(|v| *v).unwrap_or(0)
    }
}

/// 变更通道
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
    versions: Arc<ResourceVersions>,
    /// 关闭信号令牌 (所有订阅的父令牌)
    shutdown_token: CancellationToken,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            versions: Arc::new(ResourceVersions::new()),
            shutdown_token: CancellationToken::new(),
        }
    }

    /// 发布一次存储写入
    ///
    /// 同一张表的事件按版本号顺序进入通道；无订阅者时事件被丢弃
    pub fn publish(&self, table: StoreTable, kind: ChangeKind, id: i64) -> ChangeEvent {
        let event = self.versions.increment_with(table, |version| {
            let event = ChangeEvent {
                table,
                kind,
                id,
                version,
                at: now_millis(),
            };
            let _ = self.tx.send(event.clone());
            event
        });
        tracing::debug!(table = %table, kind = %kind, id, version = event.version, "change published");
        event
    }

    /// 订阅指定表的变更
    ///
    /// 回调在独立任务中按事件顺序执行；返回的 [`Subscription`]
    /// 被 drop 或 `cancel()` 后不再投递。
    pub fn subscribe<F>(&self, table: StoreTable, mask: EventMask, callback: F) -> Subscription
    where
        F: Fn(ChangeEvent) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    {
        let callback: ChangeCallback = Arc::new(callback);
        let mut rx = self.tx.subscribe();
        let token = self.shutdown_token.child_token();
        let task_token = token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) if event.table == table && mask.contains(event.kind) => {
                            callback(event).await;
                        }
                        Ok(_) => {}
                        Err(RecvError::Lagged(skipped)) => {
                            tracing::warn!(table = %table, skipped, "change subscriber lagged");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        });

        Subscription {
            table,
            token,
            handle,
        }
    }

    /// 原始广播接收端 (SSE 推送)
    pub fn receiver(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    /// 当前版本号
    pub fn version(&self, table: StoreTable) -> u64 {
        self.versions.get(table)
    }

    /// 关闭令牌
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown_token
    }

    /// 取消所有订阅
    pub fn shutdown(&self) {
        tracing::info!("Shutting down change feed");
        self.shutdown_token.cancel();
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

/// 订阅句柄
#[derive(Debug)]
pub struct Subscription {
    table: StoreTable,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn table(&self) -> StoreTable {
        self.table
    }

    /// 停止投递
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_active(&self) -> bool {
        !self.token.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
