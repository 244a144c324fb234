//! IronRelay 主入口
//! 跨链执行/报价服务

use std::sync::Arc;

use anyhow::Result;
use ironrelay::{api, app_state::AppState, service::relay_worker::RelayWorker};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    // ✅ 1. 加载环境变量
    dotenvy::dotenv().ok();

    // ✅ 2. 加载配置（CONFIG_PATH 指向 TOML 文件时合并）
    let config = Arc::new(ironrelay::config::Config::from_env_and_file(
        std::env::var("CONFIG_PATH").ok().as_deref(),
    )?);

    // ✅ 3. 初始化日志（结构化日志，可选文件输出）
    let _log_guard = ironrelay::infrastructure::logging::init_logging(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    tracing::info!("🚀 Starting IronRelay cross-chain executor service");

    if std::env::var("QUOTER_KEY").is_err() {
        tracing::warn!("⚠️ QUOTER_KEY not set, using the development default key");
    }

    // ✅ 4. 初始化应用状态（报价引擎、价格服务、链适配器、注册表）
    let state = Arc::new(AppState::new(config.clone())?);

    // ✅ 5. 启动转发循环（停止信号在迭代间被观察，协作式退出）
    let (stop_tx, stop_rx) = watch::channel(false);
    let worker = RelayWorker::new(
        config.clone(),
        state.registry.clone(),
        state.adapters.clone(),
        stop_rx,
    );
    tokio::spawn(worker.run());
    tracing::info!("✅ Relay worker started");

    // ✅ 6. 构建API路由并启动服务器
    let app = api::routes(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    tracing::info!("🎉 Server listening on http://{}", config.server.bind_addr);
    tracing::info!(
        "📖 OpenAPI: http://{}/openapi.json",
        config.server.bind_addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(stop_tx))
        .await?;

    Ok(())
}

/// 等待 Ctrl-C，然后要求转发循环在下一次迭代边界退出
async fn shutdown_signal(stop_tx: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = ?e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received, stopping");
    let _ = stop_tx.send(true);
}
