//! 认证授权模块
//!
//! 提供员工 JWT 认证和中间件：
//! - [`JwtService`] - JWT 令牌服务
//! - [`CurrentUser`] - 当前员工上下文
//! - [`require_auth`] - 认证中间件
//! - [`require_admin`] - 管理员检查中间件
//! - [`password`] - Argon2 密码哈希

pub mod jwt;
pub mod middleware;
pub mod password;

pub use jwt::{Claims, CurrentUser, JwtConfig, JwtError, JwtService};
pub use middleware::{is_public_route, require_admin, require_auth};
pub use password::{hash_password, verify_password};
