use std::time::Duration;

/// 注册中心客户端配置
#[derive(Debug, Clone)]
pub struct RegistryClientConfig {
    /// 注册中心地址（不含 `/services`）
    pub registry_url: String,
    /// 请求超时时间
    pub request_timeout: Duration,
}

impl Default for RegistryClientConfig {
    fn default() -> Self {
        Self {
            registry_url: "http://localhost:3000".to_string(),
            request_timeout: Duration::from_secs(5),
        }
    }
}

impl RegistryClientConfig {
    pub fn new(registry_url: impl Into<String>) -> Self {
        Self {
            registry_url: registry_url.into(),
            ..Default::default()
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.registry_url.trim_end_matches('/'), path)
    }
}
