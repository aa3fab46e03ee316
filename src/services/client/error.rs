use reqwest::StatusCode;

/// 注册中心客户端错误类型
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Unexpected status {status} while trying to {context}")]
    UnexpectedStatus { status: StatusCode, context: &'static str },
    #[error("Service not found: {0}")]
    NotFound(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}
