//! Pipeline API Port - 教材提取流水线后端接口
//!
//! 定义流水线相关的后端调用抽象，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;

use crate::application::error::ClientError;
use crate::domain::pipeline::{ChapterId, PipelineSnapshot, SelectedChapters, TextbookId};

/// 确认章节选择的响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmAck {
    pub status: String,
    pub selected_count: usize,
}

/// 暂缓章节提取的响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractAck {
    pub status: String,
}

/// Pipeline API Port
#[async_trait]
pub trait PipelineApiPort: Send + Sync {
    /// 读取流水线状态与完整章节列表
    async fn fetch_status(&self, textbook_id: &TextbookId)
        -> Result<PipelineSnapshot, ClientError>;

    /// 提交用户确认的章节
    async fn confirm_selection(
        &self,
        textbook_id: &TextbookId,
        selection: &SelectedChapters,
    ) -> Result<ConfirmAck, ClientError>;

    /// 请求提取暂缓的章节
    async fn extract_deferred(
        &self,
        textbook_id: &TextbookId,
        chapter_ids: &[ChapterId],
    ) -> Result<ExtractAck, ClientError>;

    /// 读取提取进度（轮询使用）
    async fn extraction_progress(
        &self,
        textbook_id: &TextbookId,
    ) -> Result<PipelineSnapshot, ClientError>;
}
