pub mod client;
pub mod discovery;
pub mod health;
pub mod provider;
pub mod registry;

pub use client::{ClientError, RegistryClient, RegistryClientConfig, RegistrySource};
pub use discovery::{Discovery, DiscoveryCache, ServiceInstance};
pub use health::{HealthMonitor, HealthProber};
pub use provider::{ServiceEvent, ServiceProvider, Subscription};
pub use registry::{Registration, RegistryStore};
