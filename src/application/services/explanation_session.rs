//! Explanation Session - 讲解对话会话
//!
//! 在 StreamConsumer 之上维护对话记录：提问时追加用户消息，
//! 流正常结束后追加助手回答；出错或取消的回答不会记录。

use std::sync::Arc;

use tokio::sync::watch;
use uuid::Uuid;

use super::stream_consumer::{StreamConsumer, StreamSnapshot, StreamState};
use crate::application::error::ClientError;
use crate::application::ports::{
    ChapterRef, ConversationStorePort, ExplainApiPort, ExplainRequest, FollowupRequest,
};
use crate::domain::conversation::{Conversation, ConversationMessage};

pub struct ExplanationSession {
    conversation_id: Uuid,
    store: Arc<dyn ConversationStorePort>,
    consumer: StreamConsumer,
    /// 已记录回答的 generation，避免重复追加
    recorded_generation: Option<u64>,
}

impl ExplanationSession {
    pub fn new(
        api: Arc<dyn ExplainApiPort>,
        store: Arc<dyn ConversationStorePort>,
    ) -> Result<Self, ClientError> {
        let conversation_id = store.create(Conversation::new())?;
        tracing::debug!(conversation_id = %conversation_id, "Explanation session created");
        Ok(Self {
            conversation_id,
            store,
            consumer: StreamConsumer::new(api),
            recorded_generation: None,
        })
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn subscribe(&self) -> watch::Receiver<StreamSnapshot> {
        self.consumer.subscribe()
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        self.consumer.snapshot()
    }

    /// 针对所选章节提问
    pub fn ask(&mut self, chapters: Vec<ChapterRef>, query: &str) -> Result<(), ClientError> {
        let request = ExplainRequest::new(chapters, query);
        if !request.is_empty() {
            self.store
                .append(self.conversation_id, ConversationMessage::user(query))?;
        }
        self.consumer.explain(request);
        Ok(())
    }

    /// 追问
    pub fn follow_up(&mut self, message: &str) -> Result<(), ClientError> {
        let request = FollowupRequest::new(self.conversation_id, message);
        if !request.is_empty() {
            self.store
                .append(self.conversation_id, ConversationMessage::user(message))?;
        }
        self.consumer.followup(request);
        Ok(())
    }

    pub fn cancel(&mut self) {
        self.consumer.cancel();
    }

    /// 等待当前回答结束；正常完成时记录助手消息
    pub async fn settle(&mut self) -> Result<StreamSnapshot, ClientError> {
        let snapshot = self.consumer.finished().await;
        if snapshot.state == StreamState::Complete
            && self.recorded_generation != Some(snapshot.generation)
        {
            self.store.append(
                self.conversation_id,
                ConversationMessage::assistant(snapshot.text.clone()),
            )?;
            self.recorded_generation = Some(snapshot.generation);
        }
        Ok(snapshot)
    }

    /// 按时间顺序返回对话记录
    pub fn messages(&self) -> Result<Vec<ConversationMessage>, ClientError> {
        Ok(self.store.messages(self.conversation_id)?)
    }
}

impl Drop for ExplanationSession {
    fn drop(&mut self) {
        self.store.remove(self.conversation_id);
    }
}
