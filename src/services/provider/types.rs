use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::services::client::ClientError;
use crate::services::registry::Registration;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// 服务提供者配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// 每个订阅通道的容量，满了之后新事件会被丢弃
    pub channel_capacity: usize,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// 服务变化事件
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceEvent {
    /// 新出现的服务，携带完整注册信息
    Added(Registration),
    /// 消失的服务，携带占位注册信息（同名，`service_url` 为空）
    Removed(Registration),
}

impl ServiceEvent {
    pub fn removed(service_name: &str) -> Self {
        ServiceEvent::Removed(Registration::removal_sentinel(service_name))
    }

    pub fn service_name(&self) -> &str {
        &self.registration().service_name
    }

    pub fn registration(&self) -> &Registration {
        match self {
            ServiceEvent::Added(reg) | ServiceEvent::Removed(reg) => reg,
        }
    }

    pub fn into_registration(self) -> Registration {
        match self {
            ServiceEvent::Added(reg) | ServiceEvent::Removed(reg) => reg,
        }
    }

    pub fn is_removal(&self) -> bool {
        matches!(self, ServiceEvent::Removed(_))
    }
}

/// 订阅句柄，持有有界通道的接收端
#[derive(Debug)]
pub struct Subscription {
    pub(crate) id: Uuid,
    pub(crate) service_name: String,
    pub(crate) receiver: mpsc::Receiver<ServiceEvent>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// 等待下一个事件；取消订阅且缓冲区读空后返回 `None`
    pub async fn recv(&mut self) -> Option<ServiceEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ServiceEvent> {
        self.receiver.try_recv().ok()
    }

    pub fn into_stream(self) -> ReceiverStream<ServiceEvent> {
        ReceiverStream::new(self.receiver)
    }
}

/// 服务提供者错误类型
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Service {0} not found")]
    NotFound(String),

    #[error("Failed to read registry: {0}")]
    Source(#[from] ClientError),
}

/// 投递统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderStats {
    /// 当前订阅者数量
    pub active_subscribers: usize,
    /// 成功放入通道的事件数
    pub events_delivered: u64,
    /// 通道已满被丢弃的事件数
    pub events_dropped: u64,
}
