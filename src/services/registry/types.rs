use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// 预定义的服务名称
pub const LOG_SERVICE: &str = "LogService";
pub const LIBRARY_SERVICE: &str = "LibraryService";
pub const PROVIDER_SERVICE: &str = "ProviderService";
pub const WEB_SERVICE: &str = "WebService";
pub const MONITOR_SERVICE: &str = "MonitorService";

/// 服务注册信息
///
/// `service_name` 是注册表的 upsert 键，`service_url` 是注销时使用的身份。
/// `registered_at` 只由注册中心在接收时写入。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub service_name: String,
    pub service_url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub service_version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub health_check_url: String,
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
}

impl Registration {
    pub fn new(service_name: impl Into<String>, service_url: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_url: service_url.into(),
            ..Default::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        // 标签是集合语义，重复添加无效
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn with_health_check_url(mut self, url: impl Into<String>) -> Self {
        self.health_check_url = url.into();
        self
    }

    /// 服务注销后发给订阅者的占位注册信息：同名，`service_url` 为空
    pub fn removal_sentinel(service_name: impl Into<String>) -> Self {
        Self::new(service_name, "")
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// 健康检查的基础地址，未配置时回退到 `service_url`
    pub fn health_base_url(&self) -> &str {
        if self.health_check_url.is_empty() {
            &self.service_url
        } else {
            &self.health_check_url
        }
    }

    /// 实际探测的地址：`<base>/health`
    pub fn health_endpoint(&self) -> String {
        format!("{}/health", self.health_base_url().trim_end_matches('/'))
    }

    /// 去掉名称和地址两端的空白，与注销时对请求体的处理保持一致
    pub fn normalize(&mut self) {
        for field in [
            &mut self.service_name,
            &mut self.service_url,
            &mut self.health_check_url,
        ] {
            let trimmed = field.trim();
            if trimmed.len() != field.len() {
                *field = trimmed.to_string();
            }
        }
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if self.service_name.trim().is_empty() {
            return Err(RegistryError::Validation("serviceName must not be empty".into()));
        }
        if self.service_url.trim().is_empty() {
            return Err(RegistryError::Validation("serviceUrl must not be empty".into()));
        }
        Ok(())
    }
}

// 兼容其他语言客户端发送的 `null` 字段
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// 单次健康检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HealthCheck {
    pub healthy: bool,
    pub latency_ms: u64,
}

/// `GET /health/{name}` 的响应体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHealthReport {
    pub service_name: String,
    pub healthy: bool,
    pub latency: u64,
}

/// 注册表错误类型
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RegistryError {
    #[error("Service at {url} not found")]
    NotFound { url: String },

    #[error("Invalid registration: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_json_shape() {
        let reg = Registration::new("LogService", "http://localhost:4000")
            .with_version("1.0.0")
            .with_tag("log");

        let value = serde_json::to_value(&reg).unwrap();
        assert_eq!(value["serviceName"], "LogService");
        assert_eq!(value["serviceUrl"], "http://localhost:4000");
        assert_eq!(value["serviceVersion"], "1.0.0");
        assert_eq!(value["tags"][0], "log");
        assert!(value.get("healthCheckUrl").is_some());
        assert!(value.get("registeredAt").is_some());
    }

    #[test]
    fn test_null_collections_are_accepted() {
        let json = r#"{"serviceName":"A","serviceUrl":"http://h:1","metadata":null,"tags":null}"#;
        let reg: Registration = serde_json::from_str(json).unwrap();
        assert!(reg.metadata.is_empty());
        assert!(reg.tags.is_empty());
        assert!(reg.registered_at.is_none());
    }

    #[test]
    fn test_health_endpoint_falls_back_to_service_url() {
        let reg = Registration::new("A", "http://h:1/");
        assert_eq!(reg.health_endpoint(), "http://h:1/health");

        let reg = reg.with_health_check_url("http://h:9");
        assert_eq!(reg.health_endpoint(), "http://h:9/health");
    }

    #[test]
    fn test_validate_rejects_empty_identity() {
        assert!(Registration::new("", "http://h:1").validate().is_err());
        assert!(Registration::new("A", " ").validate().is_err());
        assert!(Registration::new("A", "http://h:1").validate().is_ok());
    }

    #[test]
    fn test_tags_are_deduplicated() {
        let reg = Registration::new("A", "http://h:1").with_tag("x").with_tag("x");
        assert_eq!(reg.tags, vec!["x".to_string()]);
    }
}
