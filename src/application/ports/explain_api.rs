//! Explain API Port - AI 讲解流式接口抽象
//!
//! 打开流只负责返回原始字节流，帧解码由 StreamConsumer 完成

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use uuid::Uuid;

use crate::application::error::ClientError;
use crate::domain::pipeline::TextbookId;

/// 默认章节分类标签
pub const DEFAULT_CLASSIFICATION: &str = "EXPLAINS";

/// 响应体字节流（chunk 边界与帧边界无关）
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// 章节引用 - 发送给讲解接口的轻量指针
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    pub textbook_id: TextbookId,
    pub chapter_number: u32,
    pub classification: String,
    pub textbook_title: Option<String>,
}

impl ChapterRef {
    pub fn new(textbook_id: TextbookId, chapter_number: u32) -> Self {
        Self {
            textbook_id,
            chapter_number,
            classification: DEFAULT_CLASSIFICATION.to_string(),
            textbook_title: None,
        }
    }

    pub fn with_classification(mut self, classification: impl Into<String>) -> Self {
        self.classification = classification.into();
        self
    }

    pub fn with_textbook_title(mut self, title: impl Into<String>) -> Self {
        self.textbook_title = Some(title.into());
        self
    }
}

/// 讲解请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplainRequest {
    pub chapters: Vec<ChapterRef>,
    pub query: String,
}

impl ExplainRequest {
    pub fn new(chapters: Vec<ChapterRef>, query: impl Into<String>) -> Self {
        Self {
            chapters,
            query: query.into(),
        }
    }

    /// 没有章节或问题为空时不发起请求
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty() || self.query.trim().is_empty()
    }
}

/// 追问请求（沿用同一对话上下文）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowupRequest {
    pub conversation_id: Uuid,
    pub message: String,
}

impl FollowupRequest {
    pub fn new(conversation_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            conversation_id,
            message: message.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.message.trim().is_empty()
    }
}

/// Explain API Port
#[async_trait]
pub trait ExplainApiPort: Send + Sync {
    /// 打开讲解流；非 2xx 或缺少响应体时返回错误
    async fn open_explanation(&self, request: &ExplainRequest) -> Result<ByteStream, ClientError>;

    /// 打开追问流
    async fn open_followup(&self, request: &FollowupRequest) -> Result<ByteStream, ClientError>;
}
