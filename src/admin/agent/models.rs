//! IA 客服消息模型

use crate::admin::serialization::deserialize_lenient_string;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const SENDER_USER: &str = "usuario";
pub const SENDER_AGENT: &str = "agente";

/// IAAgente 行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentMessage {
    #[serde(default)]
    pub id: Option<i64>,
    /// 通常是对方手机号，可能以数字返回
    #[serde(deserialize_with = "deserialize_lenient_string")]
    pub conversa_id: String,
    /// 发送方角色：usuario / agente
    pub remetente: String,
    #[serde(default)]
    pub conteudo: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAgentMessage {
    pub conversa_id: String,
    pub remetente: String,
    pub conteudo: String,
    pub created_at: String,
    pub status: String,
}

/// 会话列表项（取最新一条消息）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationSummary {
    pub conversa_id: String,
    pub last_message: String,
    pub last_sender: String,
    pub last_message_at: Option<String>,
    pub status: Option<String>,
}

/// 按会话去重；输入需按时间倒序，保留每个会话第一次出现的消息
pub fn group_conversations(messages: &[AgentMessage]) -> Vec<ConversationSummary> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .filter(|m| seen.insert(m.conversa_id.as_str()))
        .map(|m| ConversationSummary {
            conversa_id: m.conversa_id.clone(),
            last_message: m.conteudo.clone(),
            last_sender: m.remetente.clone(),
            last_message_at: m.created_at.clone(),
            status: m.status.clone(),
        })
        .collect()
}
