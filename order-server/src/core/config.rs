use std::path::PathBuf;
use std::str::FromStr;

use crate::auth::JwtConfig;
use crate::core::error::{Result, ServerError};

/// 存储后端
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// 进程内存 (默认，重启丢失)
    #[default]
    Memory,
    /// SQLite 文件
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

/// 种子管理员账号
#[derive(Debug, Clone)]
pub struct AdminAccount {
    /// 登录邮箱
    pub email: String,
    /// Argon2 PHC 哈希；未设置时无法登录
    pub password_hash: Option<String>,
}

/// 服务器配置
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | {WORK_DIR}/logs | 日志目录 |
/// | LOG_JSON | false | JSON 日志 |
/// | STORE_BACKEND | memory | memory / sqlite |
/// | DATABASE_PATH | {WORK_DIR}/database/orders.db | SQLite 文件 |
/// | PUBLIC_BASE_URL | http://localhost:3000 | 顾客端入口 (二维码链接) |
/// | QR_SERVICE_URL | https://api.qrserver.com/v1/create-qr-code/ | 二维码图片服务 |
/// | STAFF_WEBHOOK_URL | - | 新订单通知 webhook |
/// | ASSISTANT_API_URL | https://api.openai.com/v1/chat/completions | AI 接口 |
/// | ASSISTANT_API_KEY | - | AI 密钥，未设置则关闭 |
/// | ASSISTANT_MODEL | gpt-4o-mini | AI 模型 |
/// | REQUEST_TIMEOUT_MS | 30000 | 请求超时(毫秒) |
/// | SESSION_TTL_SECS | 7200 | 空闲会话回收时间 |
/// | ADMIN_EMAIL | admin@example.com | 管理员邮箱 |
/// | ADMIN_PASSWORD_HASH | - | 管理员密码 (Argon2 PHC) |
///
/// JWT 相关变量见 [`JwtConfig::from_env`]。
///
/// # 示例
///
/// ```ignore
/// STORE_BACKEND=sqlite HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 日志级别
    pub log_level: String,
    /// 日志目录 (None 表示仅输出到终端)
    pub log_dir: Option<String>,
    /// JSON 格式日志
    pub log_json: bool,

    /// 存储后端
    pub store_backend: StoreBackend,
    /// SQLite 文件路径
    pub database_path: Option<String>,

    /// 顾客端入口地址
    pub public_base_url: String,
    /// 二维码图片服务地址
    pub qr_service_url: String,
    /// 员工通知 webhook
    pub staff_webhook_url: Option<String>,

    /// AI 接口地址
    pub assistant_api_url: String,
    /// AI 密钥
    pub assistant_api_key: Option<String>,
    /// AI 模型
    pub assistant_model: String,

    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    /// 空闲会话回收时间 (秒)
    pub session_ttl_secs: u64,

    /// 管理员账号
    pub admin: AdminAccount,
    /// JWT 认证配置
    pub jwt: JwtConfig,
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./data".into()),
            http_port: env_parse("HTTP_PORT", 3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_dir: env_opt("LOG_DIR"),
            log_json: env_parse("LOG_JSON", false),

            store_backend: env_parse("STORE_BACKEND", StoreBackend::Memory),
            database_path: env_opt("DATABASE_PATH"),

            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            qr_service_url: std::env::var("QR_SERVICE_URL")
                .unwrap_or_else(|_| "https://api.qrserver.com/v1/create-qr-code/".into()),
            staff_webhook_url: env_opt("STAFF_WEBHOOK_URL"),

            assistant_api_url: std::env::var("ASSISTANT_API_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".into()),
            assistant_api_key: env_opt("ASSISTANT_API_KEY"),
            assistant_model: std::env::var("ASSISTANT_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".into()),

            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30000),
            session_ttl_secs: env_parse("SESSION_TTL_SECS", 7200),

            admin: AdminAccount {
                email: std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".into()),
                password_hash: env_opt("ADMIN_PASSWORD_HASH"),
            },
            jwt: JwtConfig::from_env(),
        }
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    /// 启动前检查
    ///
    /// 生产环境必须显式配置 JWT 密钥和管理员密码
    pub fn validate(&self) -> Result<()> {
        if self.is_production() {
            if self.jwt.ephemeral {
                return Err(ServerError::Config(
                    "JWT_SECRET (>= 32 chars) must be set in production".into(),
                ));
            }
            if self.admin.password_hash.is_none() {
                return Err(ServerError::Config(
                    "ADMIN_PASSWORD_HASH must be set in production".into(),
                ));
            }
        }
        if self.session_ttl_secs == 0 {
            return Err(ServerError::Config("SESSION_TTL_SECS must be positive".into()));
        }
        Ok(())
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 数据库目录
    pub fn database_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("database")
    }

    /// SQLite 文件路径
    pub fn database_file(&self) -> PathBuf {
        self.database_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.database_dir().join("orders.db"))
    }

    /// 日志目录
    pub fn logs_dir(&self) -> PathBuf {
        self.log_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.work_dir).join("logs"))
    }

    /// 确保工作目录结构存在
    pub fn ensure_work_dir_structure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.work_dir)?;
        std::fs::create_dir_all(self.logs_dir())?;
        if self.store_backend == StoreBackend::Sqlite {
            if let Some(parent) = self.database_file().parent() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!("SQLite".parse::<StoreBackend>(), Ok(StoreBackend::Sqlite));
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_paths_derive_from_work_dir() {
        let mut config = Config::with_overrides("/tmp/orders", 0);
        config.database_path = None;
        config.log_dir = None;
        assert_eq!(config.database_file(), PathBuf::from("/tmp/orders/database/orders.db"));
        assert_eq!(config.logs_dir(), PathBuf::from("/tmp/orders/logs"));
    }

    #[test]
    fn test_production_requires_secrets() {
        let mut config = Config::with_overrides("/tmp/orders", 0);
        config.environment = "production".into();
        config.jwt = JwtConfig::with_secret("s".repeat(40));
        config.admin.password_hash = None;
        assert!(matches!(config.validate(), Err(ServerError::Config(_))));

        config.admin.password_hash = Some("$argon2id$stub".into());
        assert!(config.validate().is_ok());

        config.jwt.ephemeral = true;
        assert!(config.validate().is_err());
    }
}
