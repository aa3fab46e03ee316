use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;

use super::types::{HealthCheck, Registration, RegistryError};
use crate::services::health::HealthProber;

type Table = IndexMap<String, Registration>;

/// 注册中心的权威内存表（服务名 -> 注册信息）
///
/// 读写共用同一把互斥锁。表按服务名唯一，按插入顺序遍历。
#[derive(Debug, Default)]
pub struct RegistryStore {
    table: Mutex<Table>,
    prober: HealthProber,
}

impl RegistryStore {
    pub fn new(prober: HealthProber) -> Self {
        Self {
            table: Mutex::new(IndexMap::new()),
            prober,
        }
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        // 锁中毒时数据仍然一致（所有写操作都是单步替换），继续使用
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 按服务名 upsert：同名已存在则原位替换，否则追加
    pub fn add(&self, registration: Registration) {
        let service_name = registration.service_name.clone();
        let service_url = registration.service_url.clone();

        let previous = self.table().insert(service_name.clone(), registration);
        match previous {
            Some(old) => tracing::info!(
                service_name = %service_name,
                old_url = %old.service_url,
                new_url = %service_url,
                "Updated service registration"
            ),
            None => tracing::info!(
                service_name = %service_name,
                url = %service_url,
                "Registered new service"
            ),
        }
    }

    /// 按 URL 注销，删除第一个匹配项
    pub fn remove(&self, url: &str) -> Result<Registration, RegistryError> {
        let mut table = self.table();
        let index = table
            .values()
            .position(|reg| reg.service_url == url)
            .ok_or_else(|| RegistryError::NotFound { url: url.to_string() })?;

        // shift_remove 保持其余条目的相对顺序
        let (service_name, removed) = table
            .shift_remove_index(index)
            .ok_or_else(|| RegistryError::NotFound { url: url.to_string() })?;
        drop(table);

        tracing::info!(service_name = %service_name, url = %url, "Removed service registration");
        Ok(removed)
    }

    /// 所有注册信息的拷贝
    pub fn list(&self) -> Vec<Registration> {
        self.table().values().cloned().collect()
    }

    /// 返回零个或多个同名条目，调用方不应假设最多一个
    pub fn find_by_name(&self, service_name: &str) -> Vec<Registration> {
        self.table().get(service_name).cloned().into_iter().collect()
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<Registration> {
        self.table()
            .values()
            .filter(|reg| reg.has_tag(tag))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// 依次探测同名条目的健康端点，第一个健康的即返回；无匹配时为 `(false, 0)`
    pub async fn health_check(&self, service_name: &str) -> HealthCheck {
        // 探测期间不持有表锁
        let candidates = self.find_by_name(service_name);
        if candidates.is_empty() {
            tracing::debug!(service_name = %service_name, "Health check for unknown service");
            return HealthCheck::default();
        }

        for registration in &candidates {
            let result = self.prober.probe_registration(registration).await;
            if result.healthy {
                return HealthCheck::from(&result);
            }
        }

        HealthCheck::default()
    }
}
