use order_server::{Server, ServerState, cleanup_old_logs, print_banner, setup_environment};

/// 日志保留天数
const LOG_RETENTION_DAYS: u64 = 14;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 设置环境 (dotenv, 配置, 工作目录, 日志)
    let config = setup_environment()?;

    // 打印横幅
    print_banner();

    tracing::info!("🦀 Order server starting...");

    if let Some(dir) = config.logs_dir().to_str() {
        match cleanup_old_logs(dir, LOG_RETENTION_DAYS) {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Removed old log files"),
            Err(e) => tracing::warn!(error = %e, "Log cleanup failed"),
        }
    }

    // 2. 初始化服务器状态
    let state = ServerState::initialize(&config).await?;

    // 3. 启动 HTTP 服务器 (Server::run 会自动启动后台任务)
    let server = Server::with_state(config, state);

    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
    }

    Ok(())
}
