use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, ServiceRole};
use crate::services::health::HealthProber;
use crate::services::registry::{RegistryStore, create_router};

/// 初始化日志，过滤规则取自 `RUST_LOG`，默认 `info`
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // 测试中可能重复初始化，忽略错误
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Ctrl-C 后触发取消
pub async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for shutdown signal"),
    }
    cancel.cancel();
}

pub async fn start(config: &Config, cancel: CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.bind_address(ServiceRole::Registry);
    let listener = TcpListener::bind(&addr).await?;

    // 初始化服务注册表
    let store = Arc::new(RegistryStore::new(HealthProber::new(config.health_timeout())));

    tracing::info!(addr = %addr, "Registry server listening");
    serve_registry(listener, store, cancel).await?;
    tracing::info!("Registry server stopped");

    Ok(())
}

/// 在给定监听器上提供注册中心 API，直到取消
pub async fn serve_registry(
    listener: TcpListener,
    store: Arc<RegistryStore>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, create_router(store))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
