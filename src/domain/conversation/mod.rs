//! Conversation Context - 讲解对话限界上下文
//!
//! 职责:
//! - 对话消息实体（user / assistant）
//! - 只追加的对话记录

mod aggregate;
mod entities;

pub use aggregate::Conversation;
pub use entities::{ConversationMessage, Role};
