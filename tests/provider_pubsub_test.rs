use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tokio_stream::StreamExt;

use service_registry::services::client::{ClientError, RegistrySource};
use service_registry::services::discovery::DiscoveryCache;
use service_registry::services::provider::{
    ProviderConfig, ProviderError, ServiceEvent, ServiceProvider,
};
use service_registry::services::registry::Registration;

/// 可随时替换内容或切换为失败的注册表
#[derive(Default)]
struct SwitchableRegistry {
    services: Mutex<Vec<Registration>>,
    failing: Mutex<bool>,
}

impl SwitchableRegistry {
    fn set(&self, services: Vec<Registration>) {
        *self.services.lock().unwrap() = services;
    }

    fn fail(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl RegistrySource for SwitchableRegistry {
    async fn list_services(&self) -> Result<Vec<Registration>, ClientError> {
        if *self.failing.lock().unwrap() {
            return Err(ClientError::Decode("registry unavailable".into()));
        }
        Ok(self.services.lock().unwrap().clone())
    }

    async fn find_services(&self, service_name: &str) -> Result<Vec<Registration>, ClientError> {
        let found: Vec<_> = self
            .services
            .lock()
            .unwrap()
            .iter()
            .filter(|reg| reg.service_name == service_name)
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(ClientError::NotFound(service_name.to_string()));
        }
        Ok(found)
    }
}

fn provider_with(
    capacity: usize,
) -> (
    Arc<SwitchableRegistry>,
    ServiceProvider<Arc<SwitchableRegistry>>,
) {
    let registry = Arc::new(SwitchableRegistry::default());
    // TTL 为零，每次读取都会打到注册表
    let cache = Arc::new(DiscoveryCache::new(registry.clone(), Duration::ZERO));
    let provider = ServiceProvider::new(
        cache,
        ProviderConfig {
            channel_capacity: capacity,
        },
    );
    (registry, provider)
}

fn reg(name: &str) -> Registration {
    Registration::new(name, format!("http://{}:8080", name.to_lowercase()))
}

#[tokio::test]
async fn test_snapshot_diff_notifies_by_name() {
    let (_, provider) = provider_with(10);

    let mut sub_x = provider.subscribe("X");
    let mut sub_y = provider.subscribe("Y");
    let mut sub_z = provider.subscribe("Z");

    // 第一次快照：X、Y 都是新增
    let events = provider.update_services(vec![reg("X"), reg("Y")]);
    assert_eq!(events.len(), 2);
    assert_eq!(sub_x.try_recv(), Some(ServiceEvent::Added(reg("X"))));
    assert_eq!(sub_y.try_recv(), Some(ServiceEvent::Added(reg("Y"))));
    assert!(sub_z.try_recv().is_none());

    // {X, Y} -> {Y, Z}
    let events = provider.update_services(vec![reg("Y"), reg("Z")]);
    assert_eq!(events.len(), 2);

    let removal = sub_x.try_recv().expect("X should see a removal");
    assert!(removal.is_removal());
    assert_eq!(removal.service_name(), "X");
    assert!(removal.registration().service_url.is_empty());
    assert!(sub_x.try_recv().is_none());

    assert!(sub_y.try_recv().is_none());

    assert_eq!(sub_z.try_recv(), Some(ServiceEvent::Added(reg("Z"))));
    assert!(sub_z.try_recv().is_none());
}

#[tokio::test]
async fn test_unchanged_names_are_silent() {
    let (_, provider) = provider_with(10);
    let mut sub = provider.subscribe("Y");

    provider.update_services(vec![reg("Y")]);
    assert!(sub.try_recv().is_some());

    // 同名但 URL 变化不算变化
    let moved = Registration::new("Y", "http://elsewhere:9000");
    assert!(provider.update_services(vec![moved.clone()]).is_empty());
    assert!(sub.try_recv().is_none());
    assert_eq!(provider.snapshot(), vec![moved]);
}

#[tokio::test]
async fn test_multiple_subscribers_same_service() {
    let (_, provider) = provider_with(10);

    let stream1 = provider.subscribe("multi").into_stream();
    let stream2 = provider.subscribe("multi").into_stream();
    assert_eq!(provider.subscriber_count("multi"), 2);

    provider.update_services(vec![reg("multi")]);

    for mut stream in [stream1, stream2] {
        let event = timeout(Duration::from_secs(1), stream.next())
            .await
            .expect("Timeout waiting for event")
            .expect("Stream ended unexpectedly");
        assert_eq!(event.service_name(), "multi");
        assert!(!event.is_removal());
    }
}

#[tokio::test]
async fn test_full_channel_drops_events() {
    let (_, provider) = provider_with(2);
    let mut sub = provider.subscribe("busy");

    // 交替出现和消失，每次更新产生一个事件，共 5 个
    for round in 0..5 {
        if round % 2 == 0 {
            provider.update_services(vec![reg("busy")]);
        } else {
            provider.update_services(Vec::new());
        }
    }

    assert!(matches!(sub.try_recv(), Some(ServiceEvent::Added(_))));
    assert!(matches!(sub.try_recv(), Some(ServiceEvent::Removed(_))));
    assert!(sub.try_recv().is_none());

    let stats = provider.stats();
    assert_eq!(stats.events_delivered, 2);
    assert_eq!(stats.events_dropped, 3);
    assert_eq!(stats.active_subscribers, 1);
}

#[tokio::test]
async fn test_unsubscribe_closes_channel() {
    let (_, provider) = provider_with(10);
    let mut sub = provider.subscribe("gone");

    provider.update_services(vec![reg("gone")]);
    assert!(provider.unsubscribe(&mut sub));
    assert_eq!(provider.subscriber_count("gone"), 0);

    // 缓冲区中已有的事件仍可读出，之后通道关闭
    assert!(sub.recv().await.is_some());
    let closed = timeout(Duration::from_secs(1), sub.recv())
        .await
        .expect("channel should be closed");
    assert!(closed.is_none());

    // 取消后的变化不再投递，重复取消无效果
    provider.update_services(Vec::new());
    assert!(!provider.unsubscribe(&mut sub));
    assert_eq!(provider.stats().active_subscribers, 0);
}

#[tokio::test]
async fn test_dropped_subscription_is_pruned() {
    let (_, provider) = provider_with(10);
    let sub = provider.subscribe("short-lived");
    drop(sub);

    provider.update_services(vec![reg("short-lived")]);
    assert_eq!(provider.subscriber_count("short-lived"), 0);
    assert_eq!(provider.stats().active_subscribers, 0);
    assert_eq!(provider.stats().events_delivered, 0);
}

#[tokio::test]
async fn test_refresh_reads_through_cache() {
    let (registry, provider) = provider_with(10);
    let mut sub = provider.subscribe("A");

    registry.set(vec![reg("A"), reg("B")]);
    let services = provider.refresh().await.unwrap();
    assert_eq!(services.len(), 2);
    assert_eq!(sub.try_recv(), Some(ServiceEvent::Added(reg("A"))));

    registry.set(vec![reg("B")]);
    provider.refresh().await.unwrap();
    assert!(sub.try_recv().is_some_and(|event| event.is_removal()));

    assert_eq!(provider.find_service("B").await.unwrap(), reg("B"));
    assert!(matches!(
        provider.find_service("A").await,
        Err(ProviderError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_registry_failure_keeps_previous_snapshot() {
    let (registry, provider) = provider_with(10);
    registry.set(vec![reg("A")]);
    provider.refresh().await.unwrap();

    registry.fail(true);
    assert!(matches!(
        provider.refresh().await,
        Err(ProviderError::Source(_))
    ));
    // 读取失败时没有事件，也不改变快照
    assert_eq!(provider.get_services().await, vec![reg("A")]);
    assert_eq!(provider.snapshot(), vec![reg("A")]);
}
