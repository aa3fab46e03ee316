use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::prober::HealthProber;
use crate::services::client::{ClientError, RegistryClient, RegistrySource};
use crate::services::discovery::DiscoveryCache;
use crate::services::registry::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Unhealthy,
    Unknown,
}

/// 单个服务的监控状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub name: String,
    pub url: String,
    pub status: HealthState,
    pub last_check: Option<DateTime<Utc>>,
    pub latency: u64,
}

/// 健康监控：按固定间隔探测所有已注册服务
#[derive(Debug)]
pub struct HealthMonitor<S = RegistryClient> {
    cache: Arc<DiscoveryCache<S>>,
    prober: HealthProber,
    interval: Duration,
    checks: DashMap<String, ServiceStatus>,
}

impl<S: RegistrySource> HealthMonitor<S> {
    pub fn new(cache: Arc<DiscoveryCache<S>>, prober: HealthProber, interval: Duration) -> Self {
        Self {
            cache,
            prober,
            interval,
            checks: DashMap::new(),
        }
    }

    /// 探测一轮，返回本轮检查的服务数量
    pub async fn check_all_services(&self) -> Result<usize, ClientError> {
        let services = self.cache.get_services().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to get services for health monitoring");
        })?;

        // 从未探测过的服务先记为 unknown，已有结果保留到本轮探测完成
        for reg in &services {
            self.checks
                .entry(reg.service_name.clone())
                .or_insert_with(|| ServiceStatus {
                    name: reg.service_name.clone(),
                    url: reg.service_url.clone(),
                    status: HealthState::Unknown,
                    last_check: None,
                    latency: 0,
                });
        }

        let probes = services.iter().map(|reg| self.prober.probe_registration(reg));
        let results = futures::future::join_all(probes).await;

        for (reg, result) in services.iter().zip(results) {
            let status = if result.healthy {
                HealthState::Healthy
            } else {
                HealthState::Unhealthy
            };
            self.checks.insert(
                reg.service_name.clone(),
                ServiceStatus {
                    name: reg.service_name.clone(),
                    url: reg.service_url.clone(),
                    status,
                    last_check: Some(result.checked_at),
                    latency: result.latency_ms,
                },
            );
        }

        // 清理已注销的服务
        let current: HashSet<&str> = services.iter().map(|r| r.service_name.as_str()).collect();
        self.checks.retain(|name, _| {
            let keep = current.contains(name.as_str());
            if !keep {
                tracing::info!(service_name = %name, "Dropping status of deregistered service");
            }
            keep
        });

        Ok(services.len())
    }

    pub fn statuses(&self) -> Vec<ServiceStatus> {
        let mut statuses: Vec<_> = self.checks.iter().map(|e| e.value().clone()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }

    pub fn service_status(&self, service_name: &str) -> Option<ServiceStatus> {
        self.checks.get(service_name).map(|e| e.value().clone())
    }

    /// 周期性检查，直到取消
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Health monitor stopped");
                    break;
                }
                _ = ticker.tick() => {
                    tracing::debug!("Executing health check round...");
                    if let Ok(checked) = self.check_all_services().await {
                        tracing::debug!(checked, "Health check round completed");
                    }
                }
            }
        }
    }
}

/// `GET /monitor` 与 `GET /monitor/{name}`
pub fn create_router<S: RegistrySource>(monitor: Arc<HealthMonitor<S>>) -> Router {
    Router::new()
        .route("/monitor", get(all_statuses::<S>))
        .route("/monitor/:name", get(one_status::<S>))
        .with_state(monitor)
}

async fn all_statuses<S: RegistrySource>(
    State(monitor): State<Arc<HealthMonitor<S>>>,
) -> Json<Vec<ServiceStatus>> {
    Json(monitor.statuses())
}

async fn one_status<S: RegistrySource>(
    State(monitor): State<Arc<HealthMonitor<S>>>,
    Path(name): Path<String>,
) -> Result<Json<ServiceStatus>, ApiError> {
    monitor
        .service_status(&name)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("service {name} not found")))
}
