//! 发送进度报表与首页统计

use crate::admin::campaign::{CampaignApi, CampaignStatus, SendStatusRow};
use crate::admin::rest::Query;
use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// 拉取发送行时的分页大小
const REPORT_PAGE_SIZE: u64 = 1000;

/// 单个实例的发送进度
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceProgress {
    pub total: u64,
    pub sent: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CampaignReport {
    pub campaign_id: String,
    pub total: u64,
    pub sent: u64,
    pub pending: u64,
    pub progress_percent: f64,
    pub per_instance: BTreeMap<String, InstanceProgress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSummary {
    pub campaigns_by_status: BTreeMap<String, u64>,
    pub total_campaigns: u64,
    pub total_contacts: u64,
    pub total_sent: u64,
}

/// 按发送行汇总进度（纯函数）
pub fn summarize(campaign_id: &str, rows: &[SendStatusRow]) -> CampaignReport {
    let mut per_instance: BTreeMap<String, InstanceProgress> = BTreeMap::new();
    let mut sent = 0u64;
    for row in rows {
        let key = row.instancia.clone().unwrap_or_else(|| "-".to_string());
        let entry = per_instance.entry(key).or_default();
        entry.total += 1;
        if row.enviado {
            entry.sent += 1;
            sent += 1;
        }
    }

    let total = rows.len() as u64;
    let progress_percent = if total == 0 {
        0.0
    } else {
        (sent as f64 * 10000.0 / total as f64).round() / 100.0
    };
    CampaignReport {
        campaign_id: campaign_id.to_string(),
        total,
        sent,
        pending: total - sent,
        progress_percent,
        per_instance,
    }
}

#[derive(Clone)]
pub struct ReportService {
    campaigns: CampaignApi,
}

impl ReportService {
    pub fn new(campaigns: CampaignApi) -> Self {
        Self { campaigns }
    }

    /// 单个活动的发送报表（分页拉取全部发送行）
    pub async fn campaign_report(&self, campaign_id: &str) -> Result<CampaignReport> {
        let mut rows = Vec::new();
        let mut offset = 0u64;
        loop {
            let page = self
                .campaigns
                .list_send_status(campaign_id, offset, REPORT_PAGE_SIZE)
                .await
                .with_context(|| format!("拉取活动 {} 的发送行失败", campaign_id))?;
            let fetched = page.len() as u64;
            rows.extend(page);
            debug!("[Report] 已拉取 {} 行", rows.len());
            if fetched < REPORT_PAGE_SIZE {
                break;
            }
            offset += REPORT_PAGE_SIZE;
        }

        let report = summarize(campaign_id, &rows);
        info!(
            "[Report] 📊 活动 {}: {}/{} 已发送 ({:.2}%)",
            campaign_id, report.sent, report.total, report.progress_percent
        );
        Ok(report)
    }

    /// 首页统计：各状态活动数、联系人总数、已发送总数
    pub async fn dashboard_summary(&self) -> Result<DashboardSummary> {
        let rest = self.campaigns.rest();
        let mut campaigns_by_status = BTreeMap::new();
        for status in CampaignStatus::ALL {
            let n = rest
                .count(
                    self.campaigns.campaigns_table(),
                    &Query::new().eq("status", status),
                )
                .await?;
            campaigns_by_status.insert(status.as_str().to_string(), n);
        }

        let total_campaigns = rest
            .count(self.campaigns.campaigns_table(), &Query::new())
            .await?;
        let total_contacts = rest
            .count(self.campaigns.sends_table(), &Query::new())
            .await?;
        let total_sent = rest
            .count(
                self.campaigns.sends_table(),
                &Query::new().eq("enviado", true),
            )
            .await?;

        Ok(DashboardSummary {
            campaigns_by_status,
            total_campaigns,
            total_contacts,
            total_sent,
        })
    }
}
