//! 活动 HTTP API（Campanhas / Disparador 表）

use crate::admin::campaign::models::{Campaign, CampaignStatus, SendRow, SendStatusRow};
use crate::admin::rest::{Query, RestClient};
use crate::admin::types::Page;
use anyhow::{anyhow, Result};
use serde_json::json;
use tracing::{debug, info};

#[derive(Clone)]
pub struct CampaignApi {
    rest: RestClient,
    campaigns_table: String,
    sends_table: String,
}

impl CampaignApi {
    pub fn new(rest: RestClient, campaigns_table: String, sends_table: String) -> Self {
        Self {
            rest,
            campaigns_table,
            sends_table,
        }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn sends_table(&self) -> &str {
        &self.sends_table
    }

    pub fn campaigns_table(&self) -> &str {
        &self.campaigns_table
    }

    pub async fn insert_campaign(&self, campaign: &Campaign) -> Result<Campaign> {
        let created: Vec<Campaign> = self
            .rest
            .insert(&self.campaigns_table, std::slice::from_ref(campaign))
            .await?;
        created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("插入活动后未返回数据"))
    }

    /// 分页列出活动（新的在前），可按状态过滤
    pub async fn list_campaigns(
        &self,
        status: Option<CampaignStatus>,
        page: Page,
    ) -> Result<Vec<Campaign>> {
        let mut query = Query::new().select("*");
        if let Some(status) = status {
            query = query.eq("status", status);
        }
        let query = query.order("data_criacao", false).page(page);
        self.rest.select(&self.campaigns_table, &query).await
    }

    pub async fn get_campaign(&self, id: &str) -> Result<Option<Campaign>> {
        let rows: Vec<Campaign> = self
            .rest
            .select(
                &self.campaigns_table,
                &Query::new().select("*").eq("id", id).limit(1),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn update_status(&self, id: &str, status: CampaignStatus) -> Result<Campaign> {
        let updated: Vec<Campaign> = self
            .rest
            .update(
                &self.campaigns_table,
                &Query::new().eq("id", id),
                &json!({ "status": status }),
            )
            .await?;
        updated
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("活动不存在: {}", id))
    }

    /// 删除活动：先删发送行，再删活动本身
    pub async fn delete_campaign(&self, id: &str) -> Result<()> {
        self.rest
            .delete(&self.sends_table, &Query::new().eq("campanha_id", id))
            .await?;
        self.rest
            .delete(&self.campaigns_table, &Query::new().eq("id", id))
            .await?;
        info!("[CampaignAPI] 🗑️ 活动已删除: {}", id);
        Ok(())
    }

    /// 写入一批发送行
    pub async fn insert_send_rows(&self, rows: &[SendRow]) -> Result<()> {
        self.rest.insert_silent(&self.sends_table, rows).await?;
        debug!("[CampaignAPI] 写入发送行 {} 条", rows.len());
        Ok(())
    }

    /// 分页列出发送行，`pending_only` 时只返回未发送的
    pub async fn list_send_rows(
        &self,
        campaign_id: &str,
        pending_only: bool,
        page: Page,
    ) -> Result<Vec<SendRow>> {
        let mut query = Query::new().select("*").eq("campanha_id", campaign_id);
        if pending_only {
            query = query.eq("enviado", false);
        }
        self.rest
            .select(&self.sends_table, &query.order("id", true).page(page))
            .await
    }

    /// 只取统计所需列
    pub async fn list_send_status(
        &self,
        campaign_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<SendStatusRow>> {
        self.rest
            .select(
                &self.sends_table,
                &Query::new()
                    .select("instancia,enviado")
                    .eq("campanha_id", campaign_id)
                    .order("id", true)
                    .offset(offset)
                    .limit(limit),
            )
            .await
    }

    /// 标记发送行为已发送，返回更新行数
    pub async fn mark_sent(&self, row_ids: &[i64]) -> Result<usize> {
        if row_ids.is_empty() {
            return Ok(0);
        }
        let updated: Vec<SendRow> = self
            .rest
            .update(
                &self.sends_table,
                &Query::new().in_("id", row_ids),
                &json!({ "enviado": true }),
            )
            .await?;
        info!("[CampaignAPI] ✅ 标记已发送 {} 条", updated.len());
        Ok(updated.len())
    }
}
