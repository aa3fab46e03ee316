use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::cache::DiscoveryCache;
use crate::services::client::{ClientError, RegistryClient, RegistrySource};
use crate::services::health::{HealthProber, ProbeResult};
use crate::services::registry::Registration;

/// 服务实例：注册信息加上最近一次探测得到的状态
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceInstance {
    pub name: String,
    pub url: String,
    pub version: String,
    pub metadata: HashMap<String, String>,
    pub tags: Vec<String>,
    pub healthy: bool,
    pub latency: u64,
    pub last_check: DateTime<Utc>,
}

impl ServiceInstance {
    pub fn observe(registration: &Registration, probe: &ProbeResult) -> Self {
        Self {
            name: registration.service_name.clone(),
            url: registration.service_url.clone(),
            version: registration.service_version.clone(),
            metadata: registration.metadata.clone(),
            tags: registration.tags.clone(),
            healthy: probe.healthy,
            latency: probe.latency_ms,
            last_check: probe.checked_at,
        }
    }
}

pub type InstanceMap = HashMap<String, Vec<ServiceInstance>>;

/// 每个观察者通道的容量
pub const DEFAULT_WATCH_CAPACITY: usize = 10;

type WatcherMap = HashMap<String, Vec<mpsc::Sender<ServiceInstance>>>;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("No healthy instance found for {0}")]
    NoHealthyInstance(String),

    #[error("Registry read failed: {0}")]
    Source(#[from] ClientError),
}

/// 服务发现：周期性地读取注册信息并探测健康状态
#[derive(Debug)]
pub struct Discovery<S = RegistryClient> {
    cache: Arc<DiscoveryCache<S>>,
    prober: HealthProber,
    instances: RwLock<InstanceMap>,
    cursor: AtomicUsize,
    /// 服务名 -> 观察者通道
    watchers: Mutex<WatcherMap>,
}

impl<S: RegistrySource> Discovery<S> {
    pub fn new(cache: Arc<DiscoveryCache<S>>, prober: HealthProber) -> Self {
        Self {
            cache,
            prober,
            instances: RwLock::new(HashMap::new()),
            cursor: AtomicUsize::new(0),
            watchers: Mutex::new(HashMap::new()),
        }
    }

    fn watchers(&self) -> MutexGuard<'_, WatcherMap> {
        self.watchers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 观察某个服务：每次刷新后收到该服务的第一个实例
    ///
    /// 通道满时丢弃本次通知，丢弃接收端即取消观察。
    pub fn watch(&self, service_name: &str) -> mpsc::Receiver<ServiceInstance> {
        let (sender, receiver) = mpsc::channel(DEFAULT_WATCH_CAPACITY);
        self.watchers()
            .entry(service_name.to_string())
            .or_default()
            .push(sender);
        tracing::debug!(service_name = %service_name, "Watcher registered");
        receiver
    }

    pub fn watcher_count(&self, service_name: &str) -> usize {
        self.watchers().get(service_name).map_or(0, Vec::len)
    }

    fn notify_watchers(&self, instances: &InstanceMap) {
        let mut watchers = self.watchers();
        for (service_name, senders) in watchers.iter_mut() {
            let Some(first) = instances.get(service_name).and_then(|list| list.first()) else {
                continue;
            };
            senders.retain(|sender| match sender.try_send(first.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(service_name = %service_name, "Watcher channel full, dropping update");
                    true
                }
                Err(TrySendError::Closed(_)) => false,
            });
        }
        watchers.retain(|_, senders| !senders.is_empty());
    }

    /// 刷新实例表。读取失败时保留旧的实例表并返回错误
    pub async fn refresh(&self) -> Result<(), DiscoveryError> {
        let registrations = self.cache.get_services().await?;

        // 并发探测，探测期间不持有实例表的锁
        let probes = registrations
            .iter()
            .map(|reg| self.prober.probe_registration(reg));
        let results = futures::future::join_all(probes).await;

        let mut fresh: InstanceMap = HashMap::new();
        for (registration, probe) in registrations.iter().zip(results.iter()) {
            fresh
                .entry(registration.service_name.clone())
                .or_default()
                .push(ServiceInstance::observe(registration, probe));
        }

        let healthy = fresh.values().flatten().filter(|i| i.healthy).count();
        tracing::debug!(
            services = fresh.len(),
            healthy_instances = healthy,
            "Discovery refreshed"
        );

        self.notify_watchers(&fresh);
        *self.instances.write().await = fresh;
        Ok(())
    }

    pub async fn instances(&self, service_name: &str) -> Vec<ServiceInstance> {
        self.instances
            .read()
            .await
            .get(service_name)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn all_instances(&self) -> InstanceMap {
        self.instances.read().await.clone()
    }

    /// 在健康实例间轮询选择
    pub async fn healthy_instance(&self, service_name: &str) -> Result<ServiceInstance, DiscoveryError> {
        let healthy: Vec<ServiceInstance> = self
            .instances(service_name)
            .await
            .into_iter()
            .filter(|instance| instance.healthy)
            .collect();

        if healthy.is_empty() {
            return Err(DiscoveryError::NoHealthyInstance(service_name.to_string()));
        }

        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        Ok(healthy[idx % healthy.len()].clone())
    }

    /// 定时刷新，直到取消
    pub async fn run_polling(&self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Discovery polling stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        tracing::warn!(error = %e, "Discovery refresh error");
                    }
                }
            }
        }
    }
}
