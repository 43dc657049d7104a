//! Application Services - 客户端用例编排
//!
//! - PipelineTracker: 流水线状态读取、章节确认与进度轮询
//! - StreamConsumer: 讲解流消费状态机
//! - ExplanationSession: 带对话记录的讲解会话

mod explanation_session;
mod pipeline_tracker;
mod stream_consumer;

pub use explanation_session::ExplanationSession;
pub use pipeline_tracker::{PipelineTracker, PipelineTrackerConfig, DEFAULT_POLL_INTERVAL};
pub use stream_consumer::{StreamConsumer, StreamSnapshot, StreamState};
