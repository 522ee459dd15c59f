//! Webhook 本地模型定义

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 模板保存后发送的激活消息
pub const ACTIVATION_MESSAGE: &str = "ativar";

/// 通知内容：纯文本或 JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "body", rename_all = "snake_case")]
pub enum WebhookPayload {
    Text(String),
    Json(serde_json::Value),
}

impl WebhookPayload {
    /// 激活消息 `"ativar"`
    pub fn activation() -> Self {
        Self::Text(ACTIVATION_MESSAGE.to_string())
    }

    pub fn body(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Text(_) => "text/plain",
            Self::Json(_) => "application/json",
        }
    }

    /// 从发件箱存储的 body + content_type 还原
    pub fn from_stored(body: String, content_type: &str) -> Self {
        if content_type == "application/json" {
            if let Ok(value) = serde_json::from_str(&body) {
                return Self::Json(value);
            }
        }
        Self::Text(body)
    }
}

/// 发件箱状态：pending = 待重试列表，sent = 已发送列表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxState {
    Pending,
    Sent,
}

impl OutboxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "sent" => Self::Sent,
            _ => Self::Pending,
        }
    }
}

/// 实际送达所用的通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryTransport {
    /// 同源代理，可以看到响应状态
    Proxy,
    /// 直连兜底，看不到响应（请求发出即视为送达）
    Direct,
}

impl DeliveryTransport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proxy => "proxy",
            Self::Direct => "direct",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "proxy" => Some(Self::Proxy),
            "direct" => Some(Self::Direct),
            _ => None,
        }
    }
}

/// 发件箱条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub payload: WebhookPayload,
    pub state: OutboxState,
    /// 已尝试次数
    pub attempts: i64,
    pub last_error: Option<String>,
    pub transport: Option<DeliveryTransport>,
    /// 毫秒时间戳
    pub created_at: i64,
    pub updated_at: i64,
    pub sent_at: Option<i64>,
}

/// 手动/后台同步发件箱的结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub delivered: usize,
    pub still_pending: usize,
}

/// Webhook 配置
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// 同源代理地址（主通道）
    pub proxy_url: Option<String>,
    /// 外部端点地址（直连兜底）
    pub direct_url: Option<String>,
    /// 单次请求超时
    pub timeout: Duration,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            direct_url: None,
            timeout: Duration::from_secs(10),
        }
    }
}
