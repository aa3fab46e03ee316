use std::sync::Arc;

use service_registry::config::{Config, ServiceRole};
use service_registry::host;
use service_registry::server;
use service_registry::services::discovery::{self, Discovery, DiscoveryCache};
use service_registry::services::health::HealthProber;
use service_registry::services::provider::{self, ServiceProvider};
use service_registry::services::registry::{PROVIDER_SERVICE, Registration};
use service_registry::services::RegistryClient;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    server::init_tracing();
    let config = Config::load()?;

    let service_url = config.service_url(ServiceRole::Provider);
    let registration = Registration::new(PROVIDER_SERVICE, service_url.clone())
        .with_version("1.0.0")
        .with_metadata("description", "Service Provider with Discovery")
        .with_tag("discovery")
        .with_tag("provider")
        .with_health_check_url(service_url);

    let client = RegistryClient::new(config.registry_client());
    let cache = Arc::new(DiscoveryCache::new(client.clone(), config.cache_ttl()));
    let prober = HealthProber::new(config.health_timeout());
    let provider = Arc::new(ServiceProvider::new(cache.clone(), config.provider.clone()));
    let discovery = Arc::new(Discovery::new(cache, prober));

    let routes = provider::api::create_router(provider)
        .merge(discovery::api::create_router(discovery.clone()));

    let cancel = CancellationToken::new();
    tokio::spawn(server::cancel_on_ctrl_c(cancel.clone()));

    // 启动服务发现定时刷新
    let tracker = TaskTracker::new();
    {
        let cancel = cancel.clone();
        let interval = config.poll_interval();
        tracker.spawn(async move { discovery.run_polling(interval, cancel).await });
    }
    tracker.close();

    let result = host::run_service(
        &config.bind_address(ServiceRole::Provider),
        registration,
        routes,
        client,
        cancel.clone(),
    )
    .await;
    cancel.cancel();
    tracker.wait().await;

    tracing::info!("Shutting down provider service");
    result?;
    Ok(())
}
