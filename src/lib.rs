pub mod admin;

// 重新导出常用类型和函数，方便外部使用
pub use admin::{
    campaign::{CampaignCreationReport, CampaignListener, CampaignStatus, NewCampaign},
    client::{AdminClient, ClientConfig, TableNames},
    ingest::{parse_contacts, Contact, ContactFile, IngestError},
    webhook::{WebhookNotifier, WebhookPayload},
};
