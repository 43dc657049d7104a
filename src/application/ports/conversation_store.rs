//! Conversation Store Port - 对话记录存储
//!
//! 只在进程生命周期内保存，具体实现在 infrastructure/memory 层

use thiserror::Error;
use uuid::Uuid;

use crate::domain::conversation::{Conversation, ConversationMessage};

/// 对话存储错误
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("Conversation not found: {0}")]
    NotFound(Uuid),

    #[error("Conversation already exists: {0}")]
    AlreadyExists(Uuid),
}

/// Conversation Store Port
pub trait ConversationStorePort: Send + Sync {
    /// 创建新对话
    fn create(&self, conversation: Conversation) -> Result<Uuid, ConversationError>;

    /// 追加消息
    fn append(&self, id: Uuid, message: ConversationMessage) -> Result<(), ConversationError>;

    /// 按时间顺序获取全部消息
    fn messages(&self, id: Uuid) -> Result<Vec<ConversationMessage>, ConversationError>;

    /// 丢弃对话
    fn remove(&self, id: Uuid);
}
