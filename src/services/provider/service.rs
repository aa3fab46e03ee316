use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

use super::types::{ProviderConfig, ProviderError, ProviderStats, ServiceEvent, Subscription};
use crate::services::client::{RegistryClient, RegistrySource};
use crate::services::discovery::DiscoveryCache;
use crate::services::registry::Registration;

#[derive(Debug)]
struct SubscriberSlot {
    id: Uuid,
    sender: mpsc::Sender<ServiceEvent>,
}

#[derive(Debug, Default)]
struct ProviderState {
    /// 上一次看到的完整快照
    snapshot: Vec<Registration>,
    /// 服务名 -> 订阅者
    subscribers: HashMap<String, Vec<SubscriberSlot>>,
    stats: ProviderStats,
}

/// 服务提供者：对比前后两次快照，向订阅者推送新增/注销事件
///
/// 快照和订阅表由同一把锁保护，投递在锁内用 `try_send` 完成，
/// 因此取消订阅之后不会再有发送，慢订阅者也不会阻塞通知方。
#[derive(Debug)]
pub struct ServiceProvider<S = RegistryClient> {
    cache: Arc<DiscoveryCache<S>>,
    config: ProviderConfig,
    state: Mutex<ProviderState>,
}

impl<S: RegistrySource> ServiceProvider<S> {
    pub fn new(cache: Arc<DiscoveryCache<S>>, config: ProviderConfig) -> Self {
        Self {
            cache,
            config,
            state: Mutex::new(ProviderState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 用新快照替换旧快照，返回本次产生的事件
    ///
    /// 只按服务名比较：两边都存在的服务即使其他字段变了也不通知。
    pub fn update_services(&self, services: Vec<Registration>) -> Vec<ServiceEvent> {
        let mut state = self.state();

        let events = {
            let old_names: HashSet<&str> = state
                .snapshot
                .iter()
                .map(|reg| reg.service_name.as_str())
                .collect();
            let new_names: HashSet<&str> = services
                .iter()
                .map(|reg| reg.service_name.as_str())
                .collect();

            let mut events = Vec::new();
            let mut seen = HashSet::new();
            for reg in &services {
                if !old_names.contains(reg.service_name.as_str())
                    && seen.insert(reg.service_name.as_str())
                {
                    events.push(ServiceEvent::Added(reg.clone()));
                }
            }
            for reg in &state.snapshot {
                if !new_names.contains(reg.service_name.as_str())
                    && seen.insert(reg.service_name.as_str())
                {
                    events.push(ServiceEvent::removed(&reg.service_name));
                }
            }
            events
        };

        for event in &events {
            tracing::info!(
                service_name = %event.service_name(),
                removed = event.is_removal(),
                "Service change detected"
            );
            Self::notify_all(&mut state, event);
        }

        state.snapshot = services;
        events
    }

    // 非阻塞投递：通道满则丢弃，接收端已关闭则移除该订阅者
    fn notify_all(state: &mut ProviderState, event: &ServiceEvent) {
        let ProviderState {
            subscribers, stats, ..
        } = state;
        let Some(slots) = subscribers.get_mut(event.service_name()) else {
            return;
        };

        slots.retain(|slot| match slot.sender.try_send(event.clone()) {
            Ok(()) => {
                stats.events_delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                stats.events_dropped += 1;
                tracing::warn!(
                    service_name = %event.service_name(),
                    subscriber_id = %slot.id,
                    "Subscriber channel full, dropping event"
                );
                true
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(subscriber_id = %slot.id, "Pruning closed subscriber");
                false
            }
        });

        if slots.is_empty() {
            subscribers.remove(event.service_name());
        }
        stats.active_subscribers = subscribers.values().map(Vec::len).sum();
    }

    /// 订阅某个服务的变化
    pub fn subscribe(&self, service_name: &str) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        let id = Uuid::new_v4();

        let mut state = self.state();
        state
            .subscribers
            .entry(service_name.to_string())
            .or_default()
            .push(SubscriberSlot { id, sender });
        state.stats.active_subscribers += 1;
        drop(state);

        tracing::info!(service_name = %service_name, subscriber_id = %id, "New subscription created");

        Subscription {
            id,
            service_name: service_name.to_string(),
            receiver,
        }
    }

    /// 取消订阅并关闭通道；缓冲区中已有的事件仍可读出
    pub fn unsubscribe(&self, subscription: &mut Subscription) -> bool {
        let mut state = self.state();
        let removed = match state.subscribers.get_mut(&subscription.service_name) {
            Some(slots) => {
                let before = slots.len();
                slots.retain(|slot| slot.id != subscription.id);
                let removed = slots.len() != before;
                if slots.is_empty() {
                    state.subscribers.remove(&subscription.service_name);
                }
                removed
            }
            None => false,
        };
        state.stats.active_subscribers = state.subscribers.values().map(Vec::len).sum();
        drop(state);

        subscription.receiver.close();
        if removed {
            tracing::info!(
                service_name = %subscription.service_name,
                subscriber_id = %subscription.id,
                "Unsubscribed"
            );
        }
        removed
    }

    pub fn subscriber_count(&self, service_name: &str) -> usize {
        self.state()
            .subscribers
            .get(service_name)
            .map_or(0, Vec::len)
    }

    pub fn stats(&self) -> ProviderStats {
        self.state().stats.clone()
    }

    /// 上一次的快照
    pub fn snapshot(&self) -> Vec<Registration> {
        self.state().snapshot.clone()
    }

    /// 读取最新快照并推送变化，读取失败时返回错误且不改变快照
    pub async fn refresh(&self) -> Result<Vec<Registration>, ProviderError> {
        let services = self.cache.get_services().await?;
        self.update_services(services.clone());
        Ok(services)
    }

    /// 获取所有服务；读取失败时退回上一次的快照
    pub async fn get_services(&self) -> Vec<Registration> {
        match self.refresh().await {
            Ok(services) => services,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to get services, serving previous snapshot");
                self.snapshot()
            }
        }
    }

    pub async fn find_service(&self, service_name: &str) -> Result<Registration, ProviderError> {
        self.get_services()
            .await
            .into_iter()
            .find(|reg| reg.service_name == service_name)
            .ok_or_else(|| ProviderError::NotFound(service_name.to_string()))
    }
}
