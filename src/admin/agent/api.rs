//! IA 客服消息 HTTP API

use crate::admin::agent::models::{
    group_conversations, AgentMessage, ConversationSummary, NewAgentMessage,
};
use crate::admin::rest::{Query, RestClient};
use anyhow::{anyhow, Result};
use chrono::Utc;
use serde_json::json;
use tracing::info;

#[derive(Clone)]
pub struct AgentApi {
    rest: RestClient,
    table: String,
}

impl AgentApi {
    pub fn new(rest: RestClient, table: String) -> Self {
        Self { rest, table }
    }

    /// 最近的会话（按最新消息时间倒序），`scan_limit` 为扫描的消息条数
    pub async fn list_conversations(&self, scan_limit: u64) -> Result<Vec<ConversationSummary>> {
        let messages: Vec<AgentMessage> = self
            .rest
            .select(
                &self.table,
                &Query::new()
                    .select("*")
                    .order("created_at", false)
                    .limit(scan_limit),
            )
            .await?;
        Ok(group_conversations(&messages))
    }

    /// 会话内全部消息（按时间升序）
    pub async fn list_messages(&self, conversa_id: &str) -> Result<Vec<AgentMessage>> {
        self.rest
            .select(
                &self.table,
                &Query::new()
                    .select("*")
                    .eq("conversa_id", conversa_id)
                    .order("created_at", true),
            )
            .await
    }

    pub async fn send_message(
        &self,
        conversa_id: &str,
        remetente: &str,
        conteudo: &str,
    ) -> Result<AgentMessage> {
        if conteudo.trim().is_empty() {
            return Err(anyhow!("消息内容不能为空"));
        }
        let row = NewAgentMessage {
            conversa_id: conversa_id.to_string(),
            remetente: remetente.to_string(),
            conteudo: conteudo.trim().to_string(),
            created_at: Utc::now().to_rfc3339(),
            status: "enviado".to_string(),
        };
        let created: Vec<AgentMessage> = self.rest.insert(&self.table, &[row]).await?;
        let created = created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("插入消息后未返回数据"))?;
        info!("[AgentAPI] 💬 消息已发送到会话 {}", conversa_id);
        Ok(created)
    }

    pub async fn set_status(&self, id: i64, status: &str) -> Result<AgentMessage> {
        let updated: Vec<AgentMessage> = self
            .rest
            .update(&self.table, &Query::new().eq("id", id), &json!({ "status": status }))
            .await?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("消息不存在: {}", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::agent::models::SENDER_AGENT;
    use mockito::Matcher;

    #[tokio::test]
    async fn send_message_posts_trimmed_content() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/rest/v1/IAAgente")
            .match_body(Matcher::PartialJson(json!([{
                "conversa_id": "5511912345678",
                "remetente": "agente",
                "conteudo": "Olá, posso ajudar?"
            }])))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":1,"conversa_id":"5511912345678","remetente":"agente","conteudo":"Olá, posso ajudar?","status":"enviado"}]"#,
            )
            .create_async()
            .await;

        let rest = RestClient::new(reqwest::Client::new(), server.url(), "anon".into());
        let api = AgentApi::new(rest, "IAAgente".into());
        let m = api
            .send_message("5511912345678", SENDER_AGENT, "  Olá, posso ajudar? ")
            .await
            .unwrap();
        assert_eq!(m.id, Some(1));
        assert!(api.send_message("x", SENDER_AGENT, "   ").await.is_err());
        mock.assert_async().await;
    }
}
