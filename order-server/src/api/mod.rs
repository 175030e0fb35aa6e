//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`auth`] - 员工登录
//! - [`menu`] - 顾客菜单与菜单管理
//! - [`sessions`] - 顾客聊天会话
//! - [`orders`] - 订单追踪与订单管理
//! - [`tables`] - 桌台与二维码管理
//! - [`events`] - 存储变更 SSE 推送

pub mod auth;
pub mod events;
pub mod health;
pub mod menu;
pub mod orders;
pub mod sessions;
pub mod tables;

// Re-export common types for handlers
pub use crate::utils::AppResult;
