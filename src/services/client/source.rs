use std::sync::Arc;

use async_trait::async_trait;

use super::{ClientError, RegistryClient};
use crate::services::registry::Registration;

/// 发现缓存读取注册信息的来源
#[async_trait]
pub trait RegistrySource: Send + Sync + 'static {
    /// 拉取完整的注册列表
    async fn list_services(&self) -> Result<Vec<Registration>, ClientError>;

    /// 按名称查询；没有匹配时返回 `ClientError::NotFound`
    async fn find_services(&self, service_name: &str) -> Result<Vec<Registration>, ClientError>;
}

#[async_trait]
impl RegistrySource for RegistryClient {
    async fn list_services(&self) -> Result<Vec<Registration>, ClientError> {
        RegistryClient::list_services(self).await
    }

    async fn find_services(&self, service_name: &str) -> Result<Vec<Registration>, ClientError> {
        RegistryClient::find_services(self, service_name).await
    }
}

#[async_trait]
impl<T: RegistrySource> RegistrySource for Arc<T> {
    async fn list_services(&self) -> Result<Vec<Registration>, ClientError> {
        (**self).list_services().await
    }

    async fn find_services(&self, service_name: &str) -> Result<Vec<Registration>, ClientError> {
        (**self).find_services(service_name).await
    }
}
