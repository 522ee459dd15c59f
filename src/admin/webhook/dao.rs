//! Webhook 发件箱数据访问层（DAO）
//!
//! 表结构由 `migrations/` 下的 sqlx 迁移管理。

use crate::admin::webhook::models::{DeliveryTransport, OutboxEntry, OutboxState, WebhookPayload};
use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use tracing::debug;
use uuid::Uuid;

const SELECT_COLUMNS: &str = r#"
    SELECT id, payload, content_type, state, attempts, last_error, transport,
           created_at, updated_at, sent_at
    FROM webhook_outbox
"#;

/// 发件箱 DAO（基于 sqlx）
#[derive(Clone)]
pub struct WebhookOutboxDao {
    db: Pool<Sqlite>,
}

impl WebhookOutboxDao {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    fn row_to_entry(row: &SqliteRow) -> OutboxEntry {
        let content_type: String = row.get("content_type");
        let state: String = row.get("state");
        let transport: Option<String> = row.get("transport");
        OutboxEntry {
            id: row.get("id"),
            payload: WebhookPayload::from_stored(row.get("payload"), &content_type),
            state: OutboxState::parse(&state),
            attempts: row.get("attempts"),
            last_error: row.get("last_error"),
            transport: transport.as_deref().and_then(DeliveryTransport::parse),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            sent_at: row.get("sent_at"),
        }
    }

    /// 新增一条待发送记录
    pub async fn insert_pending(&self, payload: &WebhookPayload) -> Result<OutboxEntry> {
        let now = Utc::now().timestamp_millis();
        let entry = OutboxEntry {
            id: Uuid::new_v4().to_string(),
            payload: payload.clone(),
            state: OutboxState::Pending,
            attempts: 0,
            last_error: None,
            transport: None,
            created_at: now,
            updated_at: now,
            sent_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO webhook_outbox (
                id, payload, content_type, state, attempts, created_at, updated_at
            ) VALUES (?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(payload.body())
        .bind(payload.content_type())
        .bind(OutboxState::Pending.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await
        .context("写入发件箱失败")?;

        debug!("[WebhookDAO] 新增待发送记录: {}", entry.id);
        Ok(entry)
    }

    /// 标记为已发送（移入 sent 列表）
    pub async fn mark_sent(&self, id: &str, transport: DeliveryTransport) -> Result<()> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query(
            r#"
            UPDATE webhook_outbox
            SET state = ?, transport = ?, attempts = attempts + 1,
                last_error = NULL, updated_at = ?, sent_at = ?
            WHERE id = ?
            "#,
        )
        .bind(OutboxState::Sent.as_str())
        .bind(transport.as_str())
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.db)
        .await
        .context("更新发件箱状态失败")?;

        if result.rows_affected() == 0 {
            return Err(anyhow!("发件箱中不存在记录: {}", id));
        }
        Ok(())
    }

    /// 记录一次失败尝试（保留在 pending 列表）
    pub async fn record_failure(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE webhook_outbox
            SET attempts = attempts + 1, last_error = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(error)
        .bind(Utc::now().timestamp_millis())
        .bind(id)
        .execute(&self.db)
        .await
        .context("记录发件箱失败信息失败")?;
        Ok(())
    }

    /// 按状态列出记录（按创建时间升序）
    pub async fn list(&self, state: OutboxState) -> Result<Vec<OutboxEntry>> {
        let sql = format!("{} WHERE state = ? ORDER BY created_at ASC", SELECT_COLUMNS);
        let rows = sqlx::query(&sql)
            .bind(state.as_str())
            .fetch_all(&self.db)
            .await
            .context("查询发件箱失败")?;
        Ok(rows.iter().map(Self::row_to_entry).collect())
    }

    pub async fn get(&self, id: &str) -> Result<Option<OutboxEntry>> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("查询发件箱记录失败")?;
        Ok(row.as_ref().map(Self::row_to_entry))
    }

    pub async fn count(&self, state: OutboxState) -> Result<u64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM webhook_outbox WHERE state = ?")
                .bind(state.as_str())
                .fetch_one(&self.db)
                .await
                .context("统计发件箱失败")?;
        Ok(count as u64)
    }

    /// 清空已发送列表，返回删除条数
    pub async fn clear_sent(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM webhook_outbox WHERE state = ?")
            .bind(OutboxState::Sent.as_str())
            .execute(&self.db)
            .await
            .context("清空已发送列表失败")?;
        Ok(result.rows_affected())
    }
}
