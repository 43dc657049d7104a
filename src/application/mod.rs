//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 六边形架构端口定义（PipelineApi、ExplainApi、ConversationStore）
//! - services: 流水线跟踪、讲解流消费、讲解会话
//! - error: 应用层错误定义

pub mod error;
pub mod ports;
pub mod services;

pub use error::ClientError;

pub use ports::{
    // Pipeline API
    ConfirmAck,
    ExtractAck,
    PipelineApiPort,
    // Explain API
    ByteStream,
    ChapterRef,
    ExplainApiPort,
    ExplainRequest,
    FollowupRequest,
    // Conversation store
    ConversationError,
    ConversationStorePort,
};

pub use services::{
    ExplanationSession, PipelineTracker, PipelineTrackerConfig, StreamConsumer, StreamSnapshot,
    StreamState,
};
