//! Authentication Handlers
//!
//! Staff sign-in against the configured admin account

use std::time::Duration;

use axum::{Extension, Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::AppError;
use crate::auth::{CurrentUser, verify_password};
use crate::core::ServerState;
use crate::security_log;

/// Fixed delay for failed sign-ins to blunt credential guessing
const AUTH_FIXED_DELAY_MS: u64 = 300;

/// Staff account id embedded in tokens
const ADMIN_USER_ID: &str = "admin";

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: UserInfo,
}

/// Login handler
///
/// Verifies email/password and returns a JWT token
pub async fn login(
    State(state): State<ServerState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let admin = &state.config.admin;
    let email = req.email.trim().to_lowercase();

    // Unified error for unknown email and wrong password
    let valid = email == admin.email.to_lowercase()
        && admin
            .password_hash
            .as_deref()
            .is_some_and(|hash| verify_password(&req.password, hash));

    if !valid {
        tokio::time::sleep(Duration::from_millis(AUTH_FIXED_DELAY_MS)).await;
        security_log!("WARN", "login_failed", email = email.clone());
        tracing::warn!(email = %email, "Login failed - invalid credentials");
        return Err(AppError::invalid_credentials());
    }

    let jwt_service = state.get_jwt_service();
    let token = jwt_service
        .generate_token(ADMIN_USER_ID, &admin.email, "admin")
        .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))?;

    tracing::info!(email = %admin.email, "Staff logged in");

    Ok(Json(LoginResponse {
        token,
        expires_in: jwt_service.expires_in_seconds(),
        user: UserInfo {
            id: ADMIN_USER_ID.to_string(),
            email: admin.email.clone(),
            role: "admin".to_string(),
        },
    }))
}

/// Current staff member
pub async fn me(Extension(user): Extension<CurrentUser>) -> Json<UserInfo> {
    Json(UserInfo {
        id: user.id,
        email: user.username,
        role: user.role,
    })
}
