//! 客户端错误类型
//!
//! 三类错误:
//! - 传输错误 (网络中断、请求体构造失败)
//! - HTTP 错误 (非 2xx 状态码，消息取自 JSON `message` 字段或状态文本)
//! - 用户取消 (对话框关闭时中止请求，静默处理，不展示给用户)
//!
//! 错误实现了 `Clone`，以便通过 watch 通道发布操作结果。

use reqwest::StatusCode;

/// 客户端错误
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{message}")]
    Http { status: u16, message: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 批量上传中部分文件失败（每个文件的错误记录在对应任务上）
    #[error("{failed} of {total} uploads failed")]
    PartialUpload { failed: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// 根据状态码和可选的服务端消息构造 HTTP 错误
    ///
    /// 优先使用服务端消息，其次是状态文本，最后回退到 "Unknown error"。
    pub fn http(status: StatusCode, server_message: Option<String>) -> Self {
        let message = server_message
            .filter(|m| !m.is_empty())
            .or_else(|| status.canonical_reason().map(str::to_string))
            .unwrap_or_else(|| "Unknown error".to_string());
        ClientError::Http {
            status: status.as_u16(),
            message,
        }
    }

    /// 是否为用户取消
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    /// 展示给用户的消息
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return ClientError::http(status, None);
        }
        ClientError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e.to_string())
    }
}

impl From<url::ParseError> for ClientError {
    fn from(e: url::ParseError) -> Self {
        ClientError::InvalidUrl(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::InvalidInput(e.to_string())
    }
}
