//! Webhook 通知发送器
//!
//! 送达顺序：同源代理（要求 2xx）→ 直连兜底（看不到响应，请求发出即视为送达）。
//! 调用前先写入 pending；成功后移入 sent，两条通道都失败则保留在 pending。
//! pending 不会自动重发，需调用 [`WebhookNotifier::sync_pending`]
//! 或显式启动 [`WebhookNotifier::spawn_drain_task`]。

use crate::admin::webhook::dao::WebhookOutboxDao;
use crate::admin::webhook::models::{
    DeliveryTransport, OutboxEntry, OutboxState, SyncReport, WebhookConfig, WebhookPayload,
};
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

pub struct WebhookNotifier {
    client: reqwest::Client,
    config: WebhookConfig,
    outbox: WebhookOutboxDao,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, config: WebhookConfig, outbox: WebhookOutboxDao) -> Self {
        Self {
            client,
            config,
            outbox,
        }
    }

    pub fn outbox(&self) -> &WebhookOutboxDao {
        &self.outbox
    }

    pub async fn list_pending(&self) -> Result<Vec<OutboxEntry>> {
        self.outbox.list(OutboxState::Pending).await
    }

    pub async fn list_sent(&self) -> Result<Vec<OutboxEntry>> {
        self.outbox.list(OutboxState::Sent).await
    }

    /// 清空已发送列表
    pub async fn clear_sent(&self) -> Result<u64> {
        self.outbox.clear_sent().await
    }

    /// 发送激活消息 `"ativar"`
    pub async fn notify_activation(&self) -> bool {
        self.notify(WebhookPayload::activation()).await
    }

    /// 发送通知；返回是否送达。失败不会抛错，调用方只需记录日志
    ///
    /// 发件箱写入失败时不尝试投递，直接返回 false；每次投递尝试都对应一条发件箱记录。
    pub async fn notify(&self, payload: WebhookPayload) -> bool {
        let entry = match self.outbox.insert_pending(&payload).await {
            Ok(entry) => entry,
            Err(e) => {
                error!("[Webhook] ❌ 写入发件箱失败，放弃本次通知: {e:#}");
                return false;
            }
        };

        match self.deliver(&payload).await {
            Ok(transport) => {
                info!("[Webhook] ✅ 通知已送达（通道: {}）", transport.as_str());
                if let Err(e) = self.outbox.mark_sent(&entry.id, transport).await {
                    error!("[Webhook] ❌ 更新发件箱失败: {e:#}");
                }
                true
            }
            Err(err) => {
                let message = format!("{err:#}");
                warn!("[Webhook] ⚠️ 通知发送失败，保留在待发送列表: {}", message);
                if let Err(e) = self.outbox.record_failure(&entry.id, &message).await {
                    error!("[Webhook] ❌ 记录发送失败信息失败: {e:#}");
                }
                false
            }
        }
    }

    /// 依次尝试代理和直连
    async fn deliver(&self, payload: &WebhookPayload) -> Result<DeliveryTransport> {
        if self.config.proxy_url.is_none() && self.config.direct_url.is_none() {
            return Err(anyhow!("未配置 webhook 地址"));
        }

        let mut errors = Vec::new();

        if let Some(url) = &self.config.proxy_url {
            match self.post_via_proxy(url, payload).await {
                Ok(()) => return Ok(DeliveryTransport::Proxy),
                Err(e) => {
                    warn!("[Webhook] ⚠️ 代理通道失败，尝试直连: {e:#}");
                    errors.push(format!("代理: {e:#}"));
                }
            }
        }

        if let Some(url) = &self.config.direct_url {
            match self.post_direct(url, payload).await {
                Ok(()) => return Ok(DeliveryTransport::Direct),
                Err(e) => {
                    warn!("[Webhook] ⚠️ 直连通道失败: {e:#}");
                    errors.push(format!("直连: {e:#}"));
                }
            }
        }

        Err(anyhow!(errors.join("; ")))
    }

    fn post(&self, url: &str, payload: &WebhookPayload) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .timeout(self.config.timeout)
            .header("Content-Type", payload.content_type())
            .body(payload.body())
    }

    async fn post_via_proxy(&self, url: &str, payload: &WebhookPayload) -> Result<()> {
        debug!("[Webhook] 📡 通过代理发送: {}", url);
        let response = self
            .post(url, payload)
            .send()
            .await
            .context("代理请求失败")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("代理返回 HTTP {}: {}", status, body));
        }
        Ok(())
    }

    /// 直连：只要请求完成就算送达，响应状态不参与判断
    async fn post_direct(&self, url: &str, payload: &WebhookPayload) -> Result<()> {
        debug!("[Webhook] 📡 直连发送: {}", url);
        let response = self
            .post(url, payload)
            .send()
            .await
            .context("直连请求失败")?;
        debug!(
            "[Webhook] 直连请求已完成（状态 {} 不作为判断依据）",
            response.status()
        );
        Ok(())
    }

    /// 手动同步：重发所有 pending 记录
    pub async fn sync_pending(&self) -> Result<SyncReport> {
        let pending = self.outbox.list(OutboxState::Pending).await?;
        let mut report = SyncReport {
            attempted: pending.len(),
            ..Default::default()
        };
        if pending.is_empty() {
            debug!("[Webhook] 没有待发送记录");
            return Ok(report);
        }

        info!("[Webhook] 🔄 开始同步待发送记录，共 {} 条", pending.len());
        for entry in pending {
            match self.deliver(&entry.payload).await {
                Ok(transport) => {
                    self.outbox.mark_sent(&entry.id, transport).await?;
                    report.delivered += 1;
                }
                Err(e) => {
                    self.outbox
                        .record_failure(&entry.id, &format!("{e:#}"))
                        .await?;
                    report.still_pending += 1;
                }
            }
        }
        info!(
            "[Webhook] ✅ 同步完成，送达 {} 条，仍待发送 {} 条",
            report.delivered, report.still_pending
        );
        Ok(report)
    }

    /// 启动后台定时同步任务（默认不启动，由调用方决定）
    pub fn spawn_drain_task(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        info!("[Webhook] ⏱️ 启动发件箱后台同步，间隔 {:?}", period);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = self.sync_pending().await {
                    error!("[Webhook] ❌ 后台同步失败: {e:#}");
                }
            }
        })
    }
}
