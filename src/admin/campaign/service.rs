//! 活动服务层：串起实例挑选、分块分配与分批写入

use crate::admin::campaign::api::CampaignApi;
use crate::admin::campaign::fanout::{build_send_rows, plan_fanout};
use crate::admin::campaign::listener::CampaignListener;
use crate::admin::campaign::models::{
    Campaign, CampaignCreationReport, CampaignStatus, NewCampaign,
};
use crate::admin::ingest::Contact;
use crate::admin::instance::InstanceApi;
use crate::admin::serialization::generate_campaign_id;
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct CampaignService {
    api: CampaignApi,
    instances: InstanceApi,
    block_size: usize,
    batch_size: usize,
}

impl CampaignService {
    pub fn new(
        api: CampaignApi,
        instances: InstanceApi,
        block_size: usize,
        batch_size: usize,
    ) -> Self {
        Self {
            api,
            instances,
            block_size,
            batch_size: batch_size.max(1),
        }
    }

    pub fn api(&self) -> &CampaignApi {
        &self.api
    }

    /// 创建活动并写入全部发送行
    ///
    /// 子批次按顺序写入；失败的批次只计数，不中断也不回滚。
    pub async fn create_campaign(
        &self,
        input: &NewCampaign,
        contacts: &[Contact],
        listener: &dyn CampaignListener,
    ) -> Result<CampaignCreationReport> {
        if input.nome.trim().is_empty() {
            return Err(anyhow!("活动名称不能为空"));
        }
        if contacts.is_empty() {
            return Err(anyhow!("活动至少需要一个联系人"));
        }

        let instances = self
            .instances
            .select_for_campaign(&input.dia, &input.periodo)
            .await
            .context("挑选发送实例失败")?;
        let plan = plan_fanout(contacts.len(), &instances, self.block_size)?;

        let campaign = Campaign {
            id: generate_campaign_id(),
            nome: input.nome.trim().to_string(),
            data_criacao: Some(Utc::now().to_rfc3339()),
            status: CampaignStatus::Pendente,
            grupo: input.grupo.clone(),
            dia: Some(input.dia.clone()),
            periodo: Some(input.periodo.clone()),
            total_contatos: Some(contacts.len() as i64),
        };
        let campaign = self
            .api
            .insert_campaign(&campaign)
            .await
            .context("创建活动失败")?;
        info!(
            "[CampaignSvc] 🚀 活动 {} 已创建，{} 个联系人分为 {} 块，实例 {} 个",
            campaign.id,
            contacts.len(),
            plan.len(),
            instances.len()
        );

        let rows = build_send_rows(&campaign.id, contacts, &plan);
        let total = rows.len();
        let mut inserted = 0usize;
        let mut failed_batches = 0usize;
        let mut failed_rows = 0usize;

        for (index, batch) in rows.chunks(self.batch_size).enumerate() {
            match self.api.insert_send_rows(batch).await {
                Ok(()) => {
                    inserted += batch.len();
                    listener.on_batch_inserted(inserted, total).await;
                }
                Err(e) => {
                    failed_batches += 1;
                    failed_rows += batch.len();
                    error!(
                        "[CampaignSvc] ❌ 第 {} 批写入失败（{} 行），继续下一批: {e:#}",
                        index + 1,
                        batch.len()
                    );
                    listener.on_batch_failed(index, format!("{e:#}")).await;
                }
            }
        }

        let report = CampaignCreationReport {
            campaign_id: campaign.id,
            total_contacts: total,
            inserted_rows: inserted,
            failed_batches,
            failed_rows,
            instances: instances.into_iter().map(|i| i.instancia).collect(),
            blocks: plan,
        };
        if report.is_complete() {
            info!("[CampaignSvc] ✅ 发送行全部写入: {} 条", inserted);
        } else {
            warn!(
                "[CampaignSvc] ⚠️ 写入完成但有 {} 批失败（{} 行）",
                failed_batches, failed_rows
            );
        }

        let report_json = serde_json::to_string(&report).context("序列化活动报告失败")?;
        listener.on_finished(report_json).await;
        Ok(report)
    }

    /// 修改活动状态（校验状态流转）
    pub async fn set_status(&self, id: &str, next: CampaignStatus) -> Result<Campaign> {
        let current = self
            .api
            .get_campaign(id)
            .await?
            .ok_or_else(|| anyhow!("活动不存在: {}", id))?;

        if current.status == next {
            info!("[CampaignSvc] 活动 {} 已是 {}，无需修改", id, next);
            return Ok(current);
        }
        if current.status.is_terminal() {
            return Err(anyhow!("活动 {} 已结束，不能再修改状态", id));
        }
        if !current.status.can_transition_to(next) {
            return Err(anyhow!(
                "活动 {} 不能从 {} 变为 {}",
                id,
                current.status,
                next
            ));
        }

        let updated = self.api.update_status(id, next).await?;
        info!("[CampaignSvc] 活动 {} 状态: {} → {}", id, current.status, next);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::campaign::listener::EmptyCampaignListener;
    use crate::admin::rest::RestClient;
    use async_trait::async_trait;
    use mockito::{Matcher, Server};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CampaignListener for Recorder {
        async fn on_batch_inserted(&self, inserted: usize, total: usize) {
            self.events
                .lock()
                .unwrap()
                .push(format!("ok {}/{}", inserted, total));
        }

        async fn on_batch_failed(&self, batch_index: usize, _error: String) {
            self.events
                .lock()
                .unwrap()
                .push(format!("fail {}", batch_index));
        }

        async fn on_finished(&self, _report_json: String) {
            self.events.lock().unwrap().push("done".to_string());
        }
    }

    fn service(url: String) -> CampaignService {
        let rest = RestClient::new(reqwest::Client::new(), url, "anon".into());
        CampaignService::new(
            CampaignApi::new(rest.clone(), "Campanhas".into(), "Disparador".into()),
            InstanceApi::new(rest, "GupTp".into(), "padrao".into()),
            4,
            3,
        )
    }

    fn contacts(n: usize) -> Vec<Contact> {
        (0..n)
            .map(|i| Contact {
                nome: format!("Contato {}", i + 1),
                whatsapp: format!("55219{:08}", i),
                cpf: "-".to_string(),
            })
            .collect()
    }

    async fn mock_setup(server: &mut Server) -> (mockito::Mock, mockito::Mock) {
        let instances = server
            .mock("GET", "/rest/v1/GupTp")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[{"id":2,"instancia":"zap-b","dia":"segunda","periodo":"manha"},
                    {"id":1,"instancia":"zap-a","dia":"segunda","periodo":"manha"}]"#,
            )
            .create_async()
            .await;
        let campaign = server
            .mock("POST", "/rest/v1/Campanhas")
            .match_body(Matcher::PartialJson(serde_json::json!([{
                "nome": "Promo",
                "status": "pendente",
                "total_contatos": 10
            }])))
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"camp-1","nome":"Promo","status":"pendente","total_contatos":10}]"#)
            .create_async()
            .await;
        (instances, campaign)
    }

    fn input() -> NewCampaign {
        NewCampaign {
            nome: "Promo".into(),
            grupo: Some("conj_1".into()),
            dia: "segunda".into(),
            periodo: "manha".into(),
        }
    }

    #[tokio::test]
    async fn creates_campaign_and_inserts_rows_in_sequential_batches() {
        let mut server = Server::new_async().await;
        let (instances, campaign) = mock_setup(&mut server).await;
        let sends = server
            .mock("POST", "/rest/v1/Disparador")
            .match_header("prefer", "return=minimal")
            .with_status(201)
            .expect(4)
            .create_async()
            .await;

        let recorder = Recorder::default();
        let report = service(server.url())
            .create_campaign(&input(), &contacts(10), &recorder)
            .await
            .unwrap();

        assert_eq!(report.campaign_id, "camp-1");
        assert_eq!(report.inserted_rows, 10);
        assert_eq!(report.failed_batches, 0);
        assert!(report.is_complete());
        assert_eq!(report.instances, vec!["zap-a", "zap-b"]);
        let owners: Vec<&str> = report.blocks.iter().map(|b| b.instancia.as_str()).collect();
        assert_eq!(owners, vec!["zap-a", "zap-b", "zap-a"]);
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["ok 3/10", "ok 6/10", "ok 9/10", "ok 10/10", "done"]
        );

        instances.assert_async().await;
        campaign.assert_async().await;
        sends.assert_async().await;
    }

    #[tokio::test]
    async fn failed_batches_are_counted_and_the_loop_continues() {
        let mut server = Server::new_async().await;
        let _setup = mock_setup(&mut server).await;
        let sends = server
            .mock("POST", "/rest/v1/Disparador")
            .with_status(500)
            .with_body(r#"{"message":"boom"}"#)
            .expect(4)
            .create_async()
            .await;

        let recorder = Recorder::default();
        let report = service(server.url())
            .create_campaign(&input(), &contacts(10), &recorder)
            .await
            .unwrap();

        assert_eq!(report.inserted_rows, 0);
        assert_eq!(report.failed_batches, 4);
        assert_eq!(report.failed_rows, 10);
        assert!(!report.is_complete());
        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["fail 0", "fail 1", "fail 2", "fail 3", "done"]
        );
        sends.assert_async().await;
    }

    #[tokio::test]
    async fn empty_contact_list_is_rejected_before_any_request() {
        let server = Server::new_async().await;
        let err = service(server.url())
            .create_campaign(&input(), &[], &EmptyCampaignListener)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("联系人"));
    }

    #[tokio::test]
    async fn concluded_campaign_cannot_be_reactivated() {
        let mut server = Server::new_async().await;
        let _get = server
            .mock("GET", "/rest/v1/Campanhas")
            .match_query(Matcher::UrlEncoded("id".into(), "eq.c1".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id":"c1","nome":"X","status":"concluida"}]"#)
            .create_async()
            .await;
        let patch = server
            .mock("PATCH", "/rest/v1/Campanhas")
            .expect(0)
            .create_async()
            .await;

        let svc = service(server.url());
        assert!(svc.set_status("c1", CampaignStatus::Ativa).await.is_err());
        let same = svc.set_status("c1", CampaignStatus::Concluida).await.unwrap();
        assert_eq!(same.status, CampaignStatus::Concluida);
        patch.assert_async().await;
    }
}
