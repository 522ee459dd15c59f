//! 发送实例 HTTP API（GupTp 表中 `instancia` 非空的行）

use crate::admin::instance::models::{choose_instances, Instance, InstancePatch, NewInstance};
use crate::admin::rest::{Query, RestClient};
use anyhow::{anyhow, Result};
use tracing::info;

#[derive(Clone)]
pub struct InstanceApi {
    rest: RestClient,
    table: String,
    fallback_instance: String,
}

impl InstanceApi {
    pub fn new(rest: RestClient, table: String, fallback_instance: String) -> Self {
        Self {
            rest,
            table,
            fallback_instance,
        }
    }

    /// 全部实例（按 id 升序）
    pub async fn list_instances(&self) -> Result<Vec<Instance>> {
        let instances: Vec<Instance> = self
            .rest
            .select(
                &self.table,
                &Query::new()
                    .select("*")
                    .not_null("instancia")
                    .order("id", true),
            )
            .await?;
        info!("[InstanceAPI] 📋 实例 {} 个", instances.len());
        Ok(instances)
    }

    /// 为活动挑选实例（匹配 → 全部 → 兜底）
    pub async fn select_for_campaign(&self, dia: &str, periodo: &str) -> Result<Vec<Instance>> {
        let all = self.list_instances().await?;
        Ok(choose_instances(all, dia, periodo, &self.fallback_instance))
    }

    pub async fn create_instance(&self, input: &NewInstance) -> Result<Instance> {
        if input.instancia.trim().is_empty() {
            return Err(anyhow!("实例标识不能为空"));
        }
        let created: Vec<Instance> = self.rest.insert(&self.table, &[input]).await?;
        let created = created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("插入实例后未返回数据"))?;
        info!("[InstanceAPI] ✅ 实例已创建: {}", created.instancia);
        Ok(created)
    }

    pub async fn update_instance(&self, id: i64, patch: &InstancePatch) -> Result<Instance> {
        let updated: Vec<Instance> = self
            .rest
            .update(
                &self.table,
                &Query::new().eq("id", id).not_null("instancia"),
                patch,
            )
            .await?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("实例不存在: {}", id))
    }

    /// 更新连接状态
    pub async fn set_status(&self, id: i64, status: &str) -> Result<Instance> {
        let patch = InstancePatch {
            status: Some(status.to_string()),
            ..Default::default()
        };
        self.update_instance(id, &patch).await
    }

    pub async fn delete_instance(&self, id: i64) -> Result<()> {
        self.rest
            .delete(&self.table, &Query::new().eq("id", id).not_null("instancia"))
            .await?;
        info!("[InstanceAPI] 🗑️ 实例已删除: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn select_for_campaign_uses_fallback_when_table_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/GupTp")
            .match_query(Matcher::UrlEncoded(
                "instancia".into(),
                "not.is.null".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body("[]")
            .create_async()
            .await;

        let rest = RestClient::new(reqwest::Client::new(), server.url(), "anon".into());
        let api = InstanceApi::new(rest, "GupTp".into(), "padrao".into());
        let chosen = api.select_for_campaign("segunda", "manha").await.unwrap();
        assert_eq!(chosen, vec![Instance::fallback("padrao")]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn set_status_patches_connectivity() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PATCH", "/rest/v1/GupTp")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.3".into()))
            .match_body(Matcher::Json(serde_json::json!({"status": "desconectado"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":3,"instancia":"zap-3","status":"desconectado"}]"#)
            .create_async()
            .await;

        let rest = RestClient::new(reqwest::Client::new(), server.url(), "anon".into());
        let api = InstanceApi::new(rest, "GupTp".into(), "padrao".into());
        let inst = api.set_status(3, "desconectado").await.unwrap();
        assert_eq!(inst.status.as_deref(), Some("desconectado"));
        mock.assert_async().await;
    }
}
