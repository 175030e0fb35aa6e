use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use shared::models::{MenuItem, Order};

use crate::auth::JwtService;
use crate::core::config::StoreBackend;
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result, ServerError};
use crate::db::{MemoryStore, OrderFilter, RepoError, SqliteStore, Store};
use crate::message::{ChangeFeed, EventMask, LiveCollection, StoreTable, Subscription};
use crate::services::{
    AdminService, ChatAssistant, LogNotifier, OpenAiAssistant, OrderService, QrLinks,
    SessionService, StaffNotifier, WebhookNotifier,
};

/// 服务器状态 - 持有所有服务的单例引用
///
/// 使用 Arc 实现浅拷贝，所有权成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | store | Arc<dyn Store> | 持久化 (内存 / SQLite) |
/// | feed | ChangeFeed | 存储变更广播 |
/// | jwt_service | Arc<JwtService> | JWT 认证服务 |
/// | orders | OrderService | 订单提交与追踪 |
/// | admin | AdminService | 员工端管理 |
/// | sessions | Arc<SessionService> | 顾客聊天会话 |
/// | qr | QrLinks | 桌台二维码 |
/// | menu_cache | Arc<LiveCollection<MenuItem>> | 菜单快照 |
/// | order_board | Arc<LiveCollection<Order>> | 进行中订单快照 |
///
/// # 使用示例
///
/// ```ignore
/// let state = ServerState::initialize(&config).await?;
/// let tasks = state.start_background_tasks().await;
/// let menu = state.menu_cache.snapshot();
/// ```
#[derive(Clone, Debug)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 存储后端
    pub store: Arc<dyn Store>,
    /// 存储变更广播
    pub feed: ChangeFeed,
    /// JWT 认证服务 (Arc 共享所有权)
    pub jwt_service: Arc<JwtService>,
    /// 订单提交
    pub orders: OrderService,
    /// 员工端管理
    pub admin: AdminService,
    /// 顾客会话
    pub sessions: Arc<SessionService>,
    /// 二维码链接
    pub qr: QrLinks,
    /// 菜单快照 (变更后整体重新拉取)
    pub menu_cache: Arc<LiveCollection<MenuItem>>,
    /// 进行中订单看板
    pub order_board: Arc<LiveCollection<Order>>,
    /// 存活的订阅句柄，drop 即取消
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl ServerState {
    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录结构
    /// 2. 存储 (memory 或 work_dir/database/orders.db)
    /// 3. 各服务 (JWT, 订单, 通知, 助手, 会话)
    pub async fn initialize(config: &Config) -> Result<Self> {
        config.ensure_work_dir_structure()?;

        let feed = ChangeFeed::new();
        let store: Arc<dyn Store> = match config.store_backend {
            StoreBackend::Memory => {
                tracing::info!("Using in-memory store");
                Arc::new(MemoryStore::new(feed.clone()))
            }
            StoreBackend::Sqlite => {
                let path = config.database_file();
                tracing::info!(path = %path.display(), "Opening SQLite store");
                let store = SqliteStore::open(&path, feed.clone())
                    .await
                    .map_err(|e| ServerError::Storage(e.to_string()))?;
                Arc::new(store)
            }
        };

        Ok(Self::with_store(config.clone(), store, feed))
    }

    /// 使用给定存储构造 (测试与嵌入场景)
    pub fn with_store(config: Config, store: Arc<dyn Store>, feed: ChangeFeed) -> Self {
        let timeout = Duration::from_millis(config.request_timeout_ms);

        let notifier: Arc<dyn StaffNotifier> = match &config.staff_webhook_url {
            Some(url) => Arc::new(WebhookNotifier::new(url.clone(), timeout)),
            None => Arc::new(LogNotifier),
        };
        let assistant: Option<Arc<dyn ChatAssistant>> =
            config.assistant_api_key.as_ref().map(|key| {
                Arc::new(OpenAiAssistant::new(
                    config.assistant_api_url.clone(),
                    key.clone(),
                    config.assistant_model.clone(),
                    timeout,
                )) as Arc<dyn ChatAssistant>
            });
        if assistant.is_none() {
            tracing::info!("ASSISTANT_API_KEY not set, free-text replies use the fallback");
        }

        let menu_store = Arc::clone(&store);
        let menu_cache: Arc<LiveCollection<MenuItem>> = Arc::new(LiveCollection::new("menu", move || {
            let store = Arc::clone(&menu_store);
            Box::pin(async move { store.list_menu_items().await })
        }));

        let board_store = Arc::clone(&store);
        let order_board: Arc<LiveCollection<Order>> = Arc::new(LiveCollection::new("order_board", move || {
            let store = Arc::clone(&board_store);
            Box::pin(async move {
                let orders = store.list_orders(OrderFilter::default()).await?;
                Ok::<_, RepoError>(orders.into_iter().filter(Order::is_active).collect::<Vec<_>>())
            })
        }));

        let orders = OrderService::new(Arc::clone(&store), notifier);
        let sessions = Arc::new(SessionService::new(
            Arc::clone(&store),
            orders.clone(),
            assistant,
            Arc::clone(&menu_cache),
            Duration::from_secs(config.session_ttl_secs),
        ));

        Self {
            jwt_service: Arc::new(JwtService::with_config(config.jwt.clone())),
            admin: AdminService::new(Arc::clone(&store)),
            qr: QrLinks::new(config.public_base_url.clone(), config.qr_service_url.clone()),
            orders,
            sessions,
            menu_cache,
            order_board,
            subscriptions: Arc::new(Mutex::new(Vec::new())),
            store,
            feed,
            config,
        }
    }

    /// 内存存储状态 (测试用)
    pub fn in_memory(config: Config) -> Self {
        let feed = ChangeFeed::new();
        let store = Arc::new(MemoryStore::new(feed.clone()));
        Self::with_store(config, store, feed)
    }

    /// 启动后台任务
    ///
    /// - 订阅菜单与订单变更，刷新快照
    /// - 首次加载快照 (Warmup)
    /// - 空闲会话回收 (Periodic)
    pub async fn start_background_tasks(&self) -> BackgroundTasks {
        let mut tasks = BackgroundTasks::with_token(self.feed.shutdown_token().child_token());

        {
            let mut subscriptions = self.subscriptions.lock();
            subscriptions.push(self.menu_cache.bind(&self.feed, StoreTable::MenuItems, EventMask::ALL));
            subscriptions.push(self.order_board.bind(&self.feed, StoreTable::Orders, EventMask::ALL));
        }

        let menu_cache = Arc::clone(&self.menu_cache);
        let order_board = Arc::clone(&self.order_board);
        tasks.spawn("snapshot_warmup", TaskKind::Warmup, async move {
            match menu_cache.refresh().await {
                Ok(len) => tracing::info!(items = len, "Menu cache loaded"),
                Err(e) => tracing::error!(error = %e, "Failed to load menu cache"),
            }
            if let Err(e) = order_board.refresh().await {
                tracing::error!(error = %e, "Failed to load order board");
            }
        });

        let token = tasks.shutdown_token();
        tasks.spawn(
            "session_eviction",
            TaskKind::Periodic,
            Arc::clone(&self.sessions).run_eviction(token),
        );

        tasks.log_summary();
        tasks
    }

    /// 获取 JWT 服务
    pub fn get_jwt_service(&self) -> Arc<JwtService> {
        self.jwt_service.clone()
    }

    /// 停止订阅与后台任务
    pub async fn shutdown(&self, tasks: BackgroundTasks) {
        self.subscriptions.lock().clear();
        tasks.shutdown().await;
        self.feed.shutdown();
    }
}
