//! In-Memory Conversation Store Implementation

use dashmap::DashMap;
use uuid::Uuid;

use crate::application::ports::{ConversationError, ConversationStorePort};
use crate::domain::conversation::{Conversation, ConversationMessage};

/// 内存对话存储
pub struct InMemoryConversationStore {
    conversations: DashMap<Uuid, Conversation>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            conversations: DashMap::new(),
        }
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStorePort for InMemoryConversationStore {
    fn create(&self, conversation: Conversation) -> Result<Uuid, ConversationError> {
        let id = conversation.id();
        if self.conversations.contains_key(&id) {
            return Err(ConversationError::AlreadyExists(id));
        }
        self.conversations.insert(id, conversation);
        tracing::debug!(conversation_id = %id, "Conversation created");
        Ok(id)
    }

    fn append(&self, id: Uuid, message: ConversationMessage) -> Result<(), ConversationError> {
        let mut conversation = self
            .conversations
            .get_mut(&id)
            .ok_or(ConversationError::NotFound(id))?;
        tracing::debug!(
            conversation_id = %id,
            role = message.role().as_str(),
            len = message.content().len(),
            "Message appended"
        );
        conversation.append(message);
        Ok(())
    }

    fn messages(&self, id: Uuid) -> Result<Vec<ConversationMessage>, ConversationError> {
        self.conversations
            .get(&id)
            .map(|c| c.messages().to_vec())
            .ok_or(ConversationError::NotFound(id))
    }

    fn remove(&self, id: Uuid) {
        if self.conversations.remove(&id).is_some() {
            tracing::debug!(conversation_id = %id, "Conversation removed");
        }
    }
}
