//! 应用层错误定义
//!
//! 客户端统一错误分类：传输 / 服务端 / 协议 / 校验

use thiserror::Error;

use crate::application::ports::ConversationError;
use crate::domain::pipeline::PipelineError;
use crate::domain::FrameError;

/// 客户端错误
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// 网络不可达、DNS、连接中断等，重试或下一次轮询即可恢复
    #[error("Transport error: {0}")]
    Transport(String),

    /// 非 2xx 响应；message 优先取响应体中的 `detail`
    #[error("{message}")]
    Server { status: u16, message: String },

    /// 响应体格式错误、未知枚举值、流缺少响应体或提前结束
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 调用前校验失败，请求不会发送到后端
    #[error("Validation error: {0}")]
    Validation(String),
}

impl ClientError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 创建服务端错误；没有 detail 时使用通用消息
    pub fn server(status: u16, detail: Option<String>) -> Self {
        let message = detail
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Server error {}", status));
        Self::Server { status, message }
    }

    /// 是否可以通过重试恢复
    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

impl From<PipelineError> for ClientError {
    fn from(err: PipelineError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<ConversationError> for ClientError {
    fn from(err: ConversationError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_prefers_detail() {
        let err = ClientError::server(409, Some("Textbook is not awaiting verification".into()));
        assert_eq!(err.to_string(), "Textbook is not awaiting verification");

        let err = ClientError::server(502, None);
        assert_eq!(err.to_string(), "Server error 502");

        let err = ClientError::server(500, Some("  ".into()));
        assert_eq!(err.to_string(), "Server error 500");
    }

    #[test]
    fn test_only_transport_errors_are_transient() {
        assert!(ClientError::transport("connection refused").is_transient());
        assert!(!ClientError::server(500, None).is_transient());
        assert!(!ClientError::protocol("bad json").is_transient());
        assert!(!ClientError::from(PipelineError::EmptySelection).is_transient());
    }
}
