//! IA 客服消息（IAAgente 表）

pub mod api;
pub mod models;

pub use api::AgentApi;
pub use models::{group_conversations, AgentMessage, ConversationSummary, NewAgentMessage};
