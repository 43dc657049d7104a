//! Conversation Context - Aggregate Root

use uuid::Uuid;

use super::ConversationMessage;

/// 对话聚合根
///
/// 不变量:
/// - 消息只追加，不删除、不重排
/// - 只存在于进程生命周期内
#[derive(Debug, Clone)]
pub struct Conversation {
    id: Uuid,
    messages: Vec<ConversationMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    pub fn with_id(id: Uuid) -> Self {
        Self {
            id,
            messages: Vec::new(),
        }
    }

    pub fn append(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::Role;

    #[test]
    fn test_messages_are_append_only_and_ordered() {
        let mut conversation = Conversation::new();
        assert!(conversation.messages().is_empty());

        conversation.append(ConversationMessage::user("What is the Z-transform?"));
        conversation.append(ConversationMessage::assistant("A generalisation of the DTFT."));
        conversation.append(ConversationMessage::user("Give an example"));

        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role()).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(conversation.messages()[1].content(), "A generalisation of the DTFT.");
    }
}
