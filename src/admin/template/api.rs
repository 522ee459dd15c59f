//! 模板集合 HTTP API
//!
//! 模板集合与发送实例共用 GupTp 表，模板行的 `instancia` 列为空。
//! 每次保存成功后触发 webhook（`"ativar"`），webhook 失败不影响保存结果。

use crate::admin::rest::{Query, RestClient};
use crate::admin::serialization::generate_group_id;
use crate::admin::template::models::{NewTemplateSet, TemplateSet, TemplateSetPatch};
use crate::admin::webhook::WebhookNotifier;
use anyhow::{anyhow, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct TemplateApi {
    rest: RestClient,
    table: String,
    notifier: Arc<WebhookNotifier>,
}

impl TemplateApi {
    pub fn new(rest: RestClient, table: String, notifier: Arc<WebhookNotifier>) -> Self {
        Self {
            rest,
            table,
            notifier,
        }
    }

    fn base_query(&self) -> Query {
        Query::new().select("*").is_null("instancia")
    }

    /// 列出模板集合（新的在前）
    pub async fn list_template_sets(&self, active_only: bool) -> Result<Vec<TemplateSet>> {
        let mut query = self.base_query();
        if active_only {
            query = query.eq("ativo", true);
        }
        let sets: Vec<TemplateSet> = self
            .rest
            .select(&self.table, &query.order("id", false))
            .await?;
        info!("[TemplateAPI] 📋 模板集合 {} 个", sets.len());
        Ok(sets)
    }

    pub async fn get_template_set(&self, grupo: &str) -> Result<Option<TemplateSet>> {
        let sets: Vec<TemplateSet> = self
            .rest
            .select(&self.table, &self.base_query().eq("grupo", grupo).limit(1))
            .await?;
        Ok(sets.into_iter().next())
    }

    /// 新建模板集合并通知 webhook
    pub async fn create_template_set(&self, input: &NewTemplateSet) -> Result<TemplateSet> {
        let texts = input.validated_texts()?;
        let row = TemplateSet {
            id: None,
            grupo: generate_group_id("conj"),
            nome: input.nome.trim().to_string(),
            template_1: texts.first().cloned(),
            template_2: texts.get(1).cloned(),
            template_3: texts.get(2).cloned(),
            data_criacao: Some(Utc::now().to_rfc3339()),
            ativo: true,
        };

        let created: Vec<TemplateSet> = self.rest.insert(&self.table, &[row]).await?;
        let created = created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("插入模板集合后未返回数据"))?;
        info!(
            "[TemplateAPI] ✅ 模板集合已创建: {} ({})",
            created.nome, created.grupo
        );

        self.after_save().await;
        Ok(created)
    }

    /// 更新模板集合并通知 webhook
    pub async fn update_template_set(
        &self,
        grupo: &str,
        patch: &TemplateSetPatch,
    ) -> Result<TemplateSet> {
        let updated: Vec<TemplateSet> = self
            .rest
            .update(
                &self.table,
                &Query::new().eq("grupo", grupo).is_null("instancia"),
                patch,
            )
            .await?;
        let updated = updated
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("模板集合不存在: {}", grupo))?;

        self.after_save().await;
        Ok(updated)
    }

    /// 启用/停用
    pub async fn set_active(&self, grupo: &str, ativo: bool) -> Result<TemplateSet> {
        let patch = TemplateSetPatch {
            ativo: Some(ativo),
            ..Default::default()
        };
        self.update_template_set(grupo, &patch).await
    }

    pub async fn delete_template_set(&self, grupo: &str) -> Result<()> {
        self.rest
            .delete(
                &self.table,
                &Query::new().eq("grupo", grupo).is_null("instancia"),
            )
            .await?;
        info!("[TemplateAPI] 🗑️ 模板集合已删除: {}", grupo);
        Ok(())
    }

    async fn after_save(&self) {
        if !self.notifier.notify_activation().await {
            warn!("[TemplateAPI] ⚠️ webhook 通知失败，已记入待发送列表（不影响保存）");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::db::create_sqlite_pool_with_migration;
    use crate::admin::webhook::{OutboxState, WebhookConfig, WebhookOutboxDao};
    use mockito::Matcher;
    use std::time::Duration;

    async fn api(
        server_url: &str,
        webhook_url: Option<String>,
        dir: &tempfile::TempDir,
    ) -> TemplateApi {
        let db_url = format!("sqlite://{}?mode=rwc", dir.path().join("t.db").display());
        let outbox = WebhookOutboxDao::new(create_sqlite_pool_with_migration(&db_url).await.unwrap());
        let notifier = WebhookNotifier::new(
            reqwest::Client::new(),
            WebhookConfig {
                proxy_url: webhook_url,
                direct_url: None,
                timeout: Duration::from_secs(2),
            },
            outbox,
        );
        let rest = RestClient::new(reqwest::Client::new(), server_url.to_string(), "anon".into());
        TemplateApi::new(rest, "GupTp".to_string(), Arc::new(notifier))
    }

    #[tokio::test]
    async fn create_inserts_row_and_fires_webhook() {
        let mut server = mockito::Server::new_async().await;
        let insert = server
            .mock("POST", "/rest/v1/GupTp")
            .match_body(Matcher::PartialJson(serde_json::json!([{
                "nome_conjunto": "Boas-vindas",
                "template_1": "Olá!",
                "template_2": "Tudo bem?",
                "template_3": null,
                "ativo": true
            }])))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":7,"grupo":"conj_1","nome_conjunto":"Boas-vindas","template_1":"Olá!","template_2":"Tudo bem?","template_3":null,"ativo":true}]"#,
            )
            .create_async()
            .await;
        let hook = server
            .mock("POST", "/hook")
            .match_body("ativar")
            .with_status(200)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let api = api(&server.url(), Some(format!("{}/hook", server.url())), &dir).await;
        let created = api
            .create_template_set(&NewTemplateSet {
                nome: " Boas-vindas ".to_string(),
                textos: vec!["Olá!".to_string(), "Tudo bem?".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(created.id, Some(7));
        assert_eq!(created.templates(), vec!["Olá!", "Tudo bem?"]);
        insert.assert_async().await;
        hook.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_failure_does_not_fail_the_save() {
        let mut server = mockito::Server::new_async().await;
        let _insert = server
            .mock("POST", "/rest/v1/GupTp")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":8,"grupo":"conj_2","nome_conjunto":"X","template_1":"A","ativo":true}]"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let api = api(
            &server.url(),
            Some("http://127.0.0.1:9/hook".to_string()),
            &dir,
        )
        .await;
        let created = api
            .create_template_set(&NewTemplateSet {
                nome: "X".to_string(),
                textos: vec!["A".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(created.id, Some(8));
        assert_eq!(
            api.notifier
                .outbox()
                .count(OutboxState::Pending)
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn list_filters_template_rows() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/rest/v1/GupTp")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("instancia".into(), "is.null".into()),
                Matcher::UrlEncoded("ativo".into(), "eq.true".into()),
                Matcher::UrlEncoded("order".into(), "id.desc".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":1,"grupo":"g","nome_conjunto":"A","template_1":"x","ativo":1}]"#)
            .create_async()
            .await;

        let dir = tempfile::tempdir().unwrap();
        let api = api(&server.url(), None, &dir).await;
        let sets = api.list_template_sets(true).await.unwrap();
        assert_eq!(sets.len(), 1);
        assert!(sets[0].ativo);
        mock.assert_async().await;
    }
}
