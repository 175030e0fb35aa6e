//! 服务层 - 服务器核心服务
//!
//! # 服务列表
//!
//! - [`SessionService`] - 顾客聊天会话 (内存)
//! - [`OrderService`] - 订单提交与追踪
//! - [`AdminService`] - 员工端订单/桌台/菜单管理
//! - [`StaffNotifier`] - 新订单通知 (webhook / 日志)
//! - [`ChatAssistant`] - 自由文本的 AI 回复
//! - [`QrLinks`] - 桌台二维码链接
//! - [`http`] - 路由组装与 HTTP 服务

pub mod admin;
pub mod assistant;
pub mod http;
pub mod notify;
pub mod orders;
pub mod qr;
pub mod sessions;

pub use admin::{AdminService, OrderSummary};
pub use assistant::{AssistantPrompt, ChatAssistant, OpenAiAssistant};
pub use notify::{LogNotifier, NotifyError, StaffNotifier, WebhookNotifier};
pub use orders::OrderService;
pub use qr::{QrCode, QrLinks};
pub use sessions::{ReceiptView, SessionService, SessionView};
