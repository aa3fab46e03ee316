use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::time::Instant;

use crate::services::registry::{HealthCheck, Registration};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// 单次探测的结果
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub healthy: bool,
    pub latency_ms: u64,
    pub checked_at: DateTime<Utc>,
}

impl From<&ProbeResult> for HealthCheck {
    fn from(result: &ProbeResult) -> Self {
        HealthCheck {
            healthy: result.healthy,
            latency_ms: result.latency_ms,
        }
    }
}

/// 健康探测器
///
/// 对一个 URL 发一次 GET，2xx 且无传输错误即为健康。不做重试，
/// 重试和调度由上层的周期任务负责。
#[derive(Debug, Clone)]
pub struct HealthProber {
    http_client: Client,
    timeout: Duration,
}

impl Default for HealthProber {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl HealthProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http_client: Client::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 探测给定地址本身
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let start = Instant::now();
        let outcome = self
            .http_client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await;
        let latency_ms = start.elapsed().as_millis() as u64;

        let healthy = match outcome {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(url = %url, latency_ms, "Health probe passed");
                true
            }
            Ok(response) => {
                tracing::warn!(url = %url, status = %response.status(), "Health probe failed");
                false
            }
            Err(e) if e.is_timeout() => {
                tracing::warn!(url = %url, timeout_ms = self.timeout.as_millis() as u64, "Health probe timed out");
                false
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Health probe error");
                false
            }
        };

        ProbeResult {
            healthy,
            latency_ms,
            checked_at: Utc::now(),
        }
    }

    /// 探测注册信息的健康端点（`healthCheckUrl` 或 `serviceUrl` 加 `/health`）
    pub async fn probe_registration(&self, registration: &Registration) -> ProbeResult {
        self.probe(&registration.health_endpoint()).await
    }
}
