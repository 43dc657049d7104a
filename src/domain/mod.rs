//! Domain Layer - 领域层
//!
//! 包含两个限界上下文:
//! - Pipeline Context: 教材提取流水线
//! - Conversation Context: 讲解对话

pub mod conversation;
pub mod pipeline;

// 共享的 SSE 帧解码器
mod event_stream;

pub use event_stream::{FrameDecoder, FrameError, StreamFrame, DONE_SENTINEL};
