//! Server Implementation
//!
//! HTTP 服务器启动和管理

use crate::core::{Config, Result, ServerError, ServerState};
use crate::services::http::{build_router, serve};

/// HTTP Server
pub struct Server {
    config: Config,
    state: Option<ServerState>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: None,
        }
    }

    /// Create server with existing state (for sharing with oneshot)
    pub fn with_state(config: Config, state: ServerState) -> Self {
        Self {
            config,
            state: Some(state),
        }
    }

    pub async fn run(&self) -> Result<()> {
        // Create application state if not provided
        let state = match &self.state {
            Some(s) => s.clone(),
            None => ServerState::initialize(&self.config).await?,
        };

        // Start background tasks
        let tasks = state.start_background_tasks().await;

        tracing::info!(
            port = self.config.http_port,
            backend = ?self.config.store_backend,
            environment = %self.config.environment,
            "🦀 Order server starting"
        );

        // 关闭 feed 以结束 SSE 长连接
        let feed = state.feed.clone();
        let shutdown = async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down...");
            feed.shutdown();
        };

        let result = serve(build_router(state.clone()), self.config.http_port, shutdown).await;

        state.shutdown(tasks).await;
        result.map_err(|e| ServerError::Internal(anyhow::anyhow!(e.message)))
    }
}
