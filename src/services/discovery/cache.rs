use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::services::client::{ClientError, RegistryClient, RegistrySource};
use crate::services::registry::Registration;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct CacheState {
    services: Vec<Registration>,
    last_update: Option<Instant>,
}

/// 带 TTL 的服务发现缓存
///
/// TTL 内的读取直接返回缓存（可能已过期的数据是可接受的）；
/// 刷新失败时保留上一次成功的快照，并把错误返回给调用方。
#[derive(Debug)]
pub struct DiscoveryCache<S = RegistryClient> {
    source: S,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl<S: RegistrySource> DiscoveryCache<S> {
    pub fn new(source: S, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    fn is_fresh(&self, state: &CacheState) -> bool {
        !state.services.is_empty()
            && state
                .last_update
                .is_some_and(|updated| updated.elapsed() < self.ttl)
    }

    /// 获取所有服务（带缓存）
    ///
    /// 过期后只有拿到写锁的读者去拉取，其余读者在写锁释放后直接读到新快照。
    pub async fn get_services(&self) -> Result<Vec<Registration>, ClientError> {
        {
            let state = self.state.read().await;
            if self.is_fresh(&state) {
                tracing::debug!(cached = state.services.len(), "Discovery cache hit");
                return Ok(state.services.clone());
            }
        }

        let mut state = self.state.write().await;
        if self.is_fresh(&state) {
            tracing::debug!(cached = state.services.len(), "Discovery cache refreshed by another reader");
            return Ok(state.services.clone());
        }
        self.fetch_into(&mut state).await
    }

    /// 强制从注册中心拉取，成功后覆盖缓存
    pub async fn get_services_fresh(&self) -> Result<Vec<Registration>, ClientError> {
        let mut state = self.state.write().await;
        self.fetch_into(&mut state).await
    }

    async fn fetch_into(&self, state: &mut CacheState) -> Result<Vec<Registration>, ClientError> {
        let services = self.source.list_services().await.inspect_err(|e| {
            tracing::warn!(error = %e, "Failed to refresh discovery cache, keeping last snapshot");
        })?;

        state.services = services.clone();
        state.last_update = Some(Instant::now());
        tracing::debug!(services = services.len(), "Discovery cache refreshed");

        Ok(services)
    }

    /// 查找服务（带缓存），缓存过期或未命中时转为远程查询
    pub async fn find_service(&self, service_name: &str) -> Result<Registration, ClientError> {
        {
            let state = self.state.read().await;
            if self.is_fresh(&state) {
                if let Some(found) = state
                    .services
                    .iter()
                    .find(|reg| reg.service_name == service_name)
                {
                    return Ok(found.clone());
                }
            }
        }
        self.find_service_fresh(service_name).await
    }

    /// 按名称远程查询，结果合并进缓存
    pub async fn find_service_fresh(&self, service_name: &str) -> Result<Registration, ClientError> {
        let found = self.source.find_services(service_name).await?;
        let first = found
            .first()
            .cloned()
            .ok_or_else(|| ClientError::NotFound(service_name.to_string()))?;

        // 只替换同名条目，不更新 last_update：局部结果不能当作完整快照
        let mut state = self.state.write().await;
        state.services.retain(|reg| reg.service_name != service_name);
        state.services.extend(found);

        Ok(first)
    }

    /// 最近一次成功拉取的快照，不触发网络请求
    pub async fn snapshot(&self) -> Vec<Registration> {
        self.state.read().await.services.clone()
    }

    /// 清空缓存，下一次读取必然走远程
    pub async fn clear_cache(&self) {
        let mut state = self.state.write().await;
        state.services.clear();
        state.last_update = None;
    }
}
