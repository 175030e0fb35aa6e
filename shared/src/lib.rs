//! Shared types for the table-side ordering service
//!
//! Domain models, money calculation, receipt codes, the chat flow state
//! machine, change-event types and the unified error/response types used by
//! `order-server` and its clients.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use message::{ChangeEvent, ChangeKind, EventMask, StoreTable};
