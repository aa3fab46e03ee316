use std::sync::Arc;

use service_registry::config::{Config, ServiceRole};
use service_registry::host;
use service_registry::server;
use service_registry::services::discovery::DiscoveryCache;
use service_registry::services::health::{self, HealthMonitor, HealthProber};
use service_registry::services::registry::{MONITOR_SERVICE, Registration};
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

    let service_url = config.service_url(ServiceRole::Monitor);
    let registration = Registration::new(MONITOR_SERVICE, service_url)
        .with_version("1.0.0")
        .with_tag("monitor");

    let client = RegistryClient::new(config.registry_client());
    let cache = Arc::new(DiscoveryCache::new(client.clone(), config.cache_ttl()));
    let monitor = Arc::new(HealthMonitor::new(
        cache,
        HealthProber::new(config.health_timeout()),
        config.health_interval(),
    ));

    let cancel = CancellationToken::new();
    tokio::spawn(server::cancel_on_ctrl_c(cancel.clone()));

    let tracker = TaskTracker::new();
    {
        let monitor = monitor.clone();
        let cancel = cancel.clone();
        tracker.spawn(async move { monitor.run(cancel).await });
    }
    tracker.close();

    let routes = health::monitor::create_router(monitor);
    let result = host::run_service(
        &config.bind_address(ServiceRole::Monitor),
        registration,
        routes,
        client,
        cancel.clone(),
    )
    .await;
    cancel.cancel();
    tracker.wait().await;

    tracing::info!("Shutting down monitor service");
    result?;
    Ok(())
}
