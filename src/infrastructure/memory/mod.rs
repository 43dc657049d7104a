//! Memory Layer - In-Memory State Management
//!
//! 实现 ConversationStore，保存进程内的讲解对话记录

mod conversation_store;

pub use conversation_store::InMemoryConversationStore;
