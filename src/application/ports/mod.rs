//! Application Ports - 出站端口定义
//!
//! 定义应用层与基础设施层的抽象接口

mod conversation_store;
mod explain_api;
mod pipeline_api;

pub use conversation_store::{ConversationError, ConversationStorePort};
pub use explain_api::{
    ByteStream, ChapterRef, ExplainApiPort, ExplainRequest, FollowupRequest,
    DEFAULT_CLASSIFICATION,
};
pub use pipeline_api::{ConfirmAck, ExtractAck, PipelineApiPort};
