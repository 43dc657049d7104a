//! Pipeline Context - 教材提取流水线限界上下文
//!
//! 职责:
//! - 章节实体与提取状态
//! - 教材流水线快照（后端权威状态）
//! - 相关度徽章与默认预选策略
//! - 章节确认选择

mod aggregate;
mod entities;
mod errors;
pub mod relevance;
mod selection;
mod value_objects;

pub use aggregate::PipelineSnapshot;
pub use entities::Chapter;
pub use errors::PipelineError;
pub use relevance::RelevanceBadge;
pub use selection::{ChapterSelection, SelectedChapters};
pub use value_objects::{ChapterId, ExtractionStatus, PageRange, PipelineStatus, TextbookId};
