//! Service bootstrap shared by every service binary.

use axum::{Json, Router, routing::get};
use chrono::{SecondsFormat, Utc};
use serde_json::json;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::services::client::{ClientError, RegistryClient};
use crate::services::registry::Registration;

#[derive(Error, Debug)]
pub enum HostError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
    #[error("Server task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("Registry error: {0}")]
    Client(#[from] ClientError),
}

/// 绑定地址后托管服务，见 [`serve_registered`]
pub async fn run_service(
    bind_addr: &str,
    registration: Registration,
    routes: Router,
    client: RegistryClient,
    cancel: CancellationToken,
) -> Result<(), HostError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|source| HostError::Bind {
            addr: bind_addr.to_string(),
            source,
        })?;
    serve_registered(listener, registration, routes, client, cancel).await
}

/// 启动 HTTP 服务并向注册中心注册，取消后优雅停止并按 URL 注销
///
/// 自动挂载 `/health`，`routes` 中不能再定义该路径。
pub async fn serve_registered(
    listener: TcpListener,
    registration: Registration,
    routes: Router,
    client: RegistryClient,
    cancel: CancellationToken,
) -> Result<(), HostError> {
    let app = routes.route("/health", get(liveness));
    let local_addr = listener.local_addr()?;

    let shutdown = cancel.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    // 监听已经建立，注册后立即可以接受探测
    if let Err(e) = client.register(&registration).await {
        tracing::error!(
            service_name = %registration.service_name,
            error = %e,
            "Failed to register service, shutting down"
        );
        cancel.cancel();
        server.await??;
        return Err(e.into());
    }

    tracing::info!(
        service_name = %registration.service_name,
        addr = %local_addr,
        "Service started"
    );

    let served = server.await;

    if let Err(e) = client.deregister(&registration.service_url).await {
        tracing::warn!(
            service_name = %registration.service_name,
            error = %e,
            "Failed to deregister service"
        );
    }
    tracing::info!(service_name = %registration.service_name, "Service stopped");

    served??;
    Ok(())
}

async fn liveness() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}
