//! Pipeline Context - Errors

use thiserror::Error;

use super::ChapterId;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("章节不存在: {0}")]
    UnknownChapter(ChapterId),

    #[error("章节已提取完成: {0}")]
    AlreadyExtracted(ChapterId),

    #[error("至少需要选择一个章节")]
    EmptySelection,
}
