use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{ClientError, RegistryClientConfig};
use crate::services::registry::{Registration, ServiceHealthReport};

/// 注册中心 HTTP 客户端
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http_client: Client,
    config: RegistryClientConfig,
}

impl RegistryClient {
    pub fn new(config: RegistryClientConfig) -> Self {
        Self {
            http_client: Client::new(),
            config,
        }
    }

    pub fn registry_url(&self) -> &str {
        &self.config.registry_url
    }

    /// 向注册中心注册服务（同名则覆盖）
    pub async fn register(&self, registration: &Registration) -> Result<(), ClientError> {
        let response = self
            .http_client
            .post(self.config.endpoint("/services"))
            .timeout(self.config.request_timeout)
            .json(registration)
            .send()
            .await?;

        expect_ok(&response, "register service")?;
        tracing::info!(
            service_name = %registration.service_name,
            url = %registration.service_url,
            registry = %self.config.registry_url,
            "Registered with registry"
        );
        Ok(())
    }

    /// 通知注册中心服务下线，请求体为纯文本 URL
    pub async fn deregister(&self, service_url: &str) -> Result<(), ClientError> {
        let response = self
            .http_client
            .delete(self.config.endpoint("/services"))
            .timeout(self.config.request_timeout)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(service_url.to_string())
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(service_url.to_string()));
        }
        expect_ok(&response, "deregister service")?;
        tracing::info!(url = %service_url, "Deregistered from registry");
        Ok(())
    }

    pub async fn list_services(&self) -> Result<Vec<Registration>, ClientError> {
        let response = self.get("/services").await?;
        expect_ok(&response, "list services")?;
        decode(response).await
    }

    /// 按名称查询，注册中心返回 404 时为 `NotFound`
    pub async fn find_services(&self, service_name: &str) -> Result<Vec<Registration>, ClientError> {
        let response = self.get(&format!("/services/{service_name}")).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(service_name.to_string()));
        }
        expect_ok(&response, "find service")?;
        decode(response).await
    }

    pub async fn find_by_tag(&self, tag: &str) -> Result<Vec<Registration>, ClientError> {
        let response = self.get(&format!("/services/tag/{tag}")).await?;
        expect_ok(&response, "find services by tag")?;
        decode(response).await
    }

    /// 由注册中心代为探测服务健康状态
    pub async fn remote_health(&self, service_name: &str) -> Result<ServiceHealthReport, ClientError> {
        let response = self.get(&format!("/health/{service_name}")).await?;
        if !response.status().is_success() {
            // 非 200 视为不健康，而不是错误
            return Ok(ServiceHealthReport {
                service_name: service_name.to_string(),
                healthy: false,
                latency: 0,
            });
        }
        decode(response).await
    }

    async fn get(&self, path: &str) -> Result<Response, ClientError> {
        Ok(self
            .http_client
            .get(self.config.endpoint(path))
            .timeout(self.config.request_timeout)
            .send()
            .await?)
    }
}

fn expect_ok(response: &Response, context: &'static str) -> Result<(), ClientError> {
    if response.status() == StatusCode::OK {
        Ok(())
    } else {
        Err(ClientError::UnexpectedStatus {
            status: response.status(),
            context,
        })
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode(e.to_string()))
}
