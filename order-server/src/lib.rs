//! Table-side ordering server
//!
//! # 架构概述
//!
//! 顾客扫描桌台二维码后通过聊天式流程点单，提交的订单写入存储并通知员工；
//! 员工端管理订单状态、桌台和菜单，并通过 SSE 接收实时变更。
//!
//! - **会话** (`services::sessions`): 内存中的顾客聊天会话
//! - **存储** (`db`): 内存 / SQLite 两种后端，每次写入发布变更事件
//! - **变更订阅** (`message`): 按表与事件类型订阅，订阅方整体重新拉取
//! - **认证** (`auth`): JWT + Argon2 员工认证
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! order-server/src/
//! ├── core/          # 配置、状态、错误、后台任务
//! ├── auth/          # JWT 认证、中间件
//! ├── services/      # 会话、订单、员工管理、通知、AI 助手、二维码
//! ├── api/           # HTTP 路由和处理器
//! ├── utils/         # 日志、输入校验
//! ├── db/            # 存储层
//! └── message/       # 变更订阅
//! ```

pub mod api;
pub mod auth;
pub mod core;
pub mod db;
pub mod message;
pub mod services;
pub mod utils;

// Re-export 公共类型
pub use auth::{CurrentUser, JwtService};
pub use core::{Config, Server, ServerError, ServerState};
pub use db::{MemoryStore, SqliteStore, Store};
pub use message::{ChangeFeed, LiveCollection, Subscription};
pub use utils::{AppError, AppResult};

// Re-export unified error types from shared
pub use utils::{ApiResponse, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{cleanup_old_logs, init_logger, init_logger_with_file};

// Security logging macro - 支持 tracing 格式说明符
#[macro_export]
macro_rules! security_log {
    ($level:expr, $event:expr, $($key:ident = $value:expr),*) => {
        tracing::info!(
            target: "security",
            level = $level,
            event = $event,
            $($key = $value),*
        );
    };
}

/// 加载 .env、读取配置、创建工作目录并初始化日志
pub fn setup_environment() -> Result<Config, ServerError> {
    dotenv::dotenv().ok();

    let config = Config::from_env();
    config.ensure_work_dir_structure()?;

    let log_dir = config.logs_dir();
    init_logger_with_file(
        Some(config.log_level.as_str()),
        Some(config.log_json),
        log_dir.to_str(),
    );

    config.validate()?;
    Ok(config)
}

pub fn print_banner() {
    println!(
        r#"
   ____          __
  / __ \________/ /__  _____
 / / / / ___/ __  / _ \/ ___/
/ /_/ / /  / /_/ /  __/ /
\____/_/   \__,_/\___/_/
    "#
    );
}
