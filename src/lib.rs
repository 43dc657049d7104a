//! LazyLearn - 教材提取流水线客户端
//!
//! 架构设计: DDD + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Pipeline Context: 章节、流水线快照、相关度徽章、章节选择
//! - Conversation Context: 讲解对话记录
//! - SSE 帧解码
//!
//! 应用层 (application/):
//! - Ports: PipelineApi, ExplainApi, ConversationStore
//! - Services: PipelineTracker, StreamConsumer, ExplanationSession
//!
//! 基础设施层 (infrastructure/):
//! - Adapters: HTTP Backend Client, Fake Backend Client
//! - Memory: ConversationStore 内存实现

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod runner;

pub use config::{load_config, AppConfig};
