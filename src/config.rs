use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::services::client::RegistryClientConfig;
use crate::services::provider::ProviderConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
const ENV_PREFIX: &str = "REGISTRY_";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub registry: RegistryConfig,
    pub discovery: DiscoveryConfig,
    pub health: HealthConfig,
    pub provider: ProviderConfig,
}

/// 进程角色，决定监听哪个端口
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceRole {
    Registry,
    Provider,
    Monitor,
}

/// 监听配置，每个角色一个端口，多个进程可共用同一份配置文件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    /// 注册中心端口
    pub port: u16,
    pub provider_port: u16,
    pub monitor_port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            provider_port: 5001,
            monitor_port: 5003,
        }
    }
}

impl ServerConfig {
    pub fn port(&self, role: ServiceRole) -> u16 {
        match role {
            ServiceRole::Registry => self.port,
            ServiceRole::Provider => self.provider_port,
            ServiceRole::Monitor => self.monitor_port,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// 注册中心地址，不含 `/services`
    pub url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub cache_ttl_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: 30,
            poll_interval_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub timeout_secs: u64,
    pub check_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            check_interval_secs: 10,
        }
    }
}

/// 环境变量覆盖项（前缀 `REGISTRY_`）
#[derive(Debug, Default, Deserialize)]
struct EnvOverrides {
    host: Option<String>,
    port: Option<u16>,
    provider_port: Option<u16>,
    monitor_port: Option<u16>,
    url: Option<String>,
    cache_ttl_secs: Option<u64>,
    poll_interval_secs: Option<u64>,
    health_timeout_secs: Option<u64>,
    health_interval_secs: Option<u64>,
    channel_capacity: Option<usize>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid environment override: {0}")]
    Env(#[from] envy::Error),
}

impl Config {
    /// 加载顺序：`.env` -> 配置文件（不存在则用默认值）-> 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let path = std::env::var(format!("{ENV_PREFIX}CONFIG"))
            .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };

        let overrides: EnvOverrides = envy::prefixed(ENV_PREFIX).from_env()?;
        config.apply(overrides);
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_str = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&config_str)?;
        Ok(config)
    }

    fn apply(&mut self, env: EnvOverrides) {
        if let Some(host) = env.host {
            self.server.host = host;
        }
        if let Some(port) = env.port {
            self.server.port = port;
        }
        if let Some(port) = env.provider_port {
            self.server.provider_port = port;
        }
        if let Some(port) = env.monitor_port {
            self.server.monitor_port = port;
        }
        if let Some(url) = env.url {
            self.registry.url = url;
        }
        if let Some(ttl) = env.cache_ttl_secs {
            self.discovery.cache_ttl_secs = ttl;
        }
        if let Some(interval) = env.poll_interval_secs {
            self.discovery.poll_interval_secs = interval;
        }
        if let Some(timeout) = env.health_timeout_secs {
            self.health.timeout_secs = timeout;
        }
        if let Some(interval) = env.health_interval_secs {
            self.health.check_interval_secs = interval;
        }
        if let Some(capacity) = env.channel_capacity {
            self.provider.channel_capacity = capacity;
        }
    }

    pub fn bind_address(&self, role: ServiceRole) -> String {
        format!("{}:{}", self.server.host, self.server.port(role))
    }

    /// 对外公布的服务地址，通配地址换成 `localhost`
    pub fn service_url(&self, role: ServiceRole) -> String {
        let host = match self.server.host.as_str() {
            "0.0.0.0" | "::" | "" => "localhost",
            host => host,
        };
        format!("http://{}:{}", host, self.server.port(role))
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.discovery.cache_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.discovery.poll_interval_secs.max(1))
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health.timeout_secs)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health.check_interval_secs.max(1))
    }

    pub fn registry_client(&self) -> RegistryClientConfig {
        RegistryClientConfig {
            registry_url: self.registry.url.clone(),
            request_timeout: self.health_timeout(),
        }
    }
}
