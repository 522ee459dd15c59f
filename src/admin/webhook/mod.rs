//! Webhook 通知模块
//!
//! 保存模板集合后向外部自动化端点发送 `"ativar"`。
//! 先走同源代理，失败后直连兜底；每次尝试都记录到本地发件箱（pending / sent）。

pub mod dao;
pub mod models;
pub mod notifier;

pub use dao::WebhookOutboxDao;
pub use models::{
    DeliveryTransport, OutboxEntry, OutboxState, SyncReport, WebhookConfig, WebhookPayload,
    ACTIVATION_MESSAGE,
};
pub use notifier::WebhookNotifier;
