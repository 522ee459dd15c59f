//! 活动（campanha）模块
//!
//! 活动创建流程：挑选实例 → 按块分配联系人 → 生成活动 ID 并写入活动行 →
//! 分批写入 Disparador 发送行。

pub mod api;
pub mod fanout;
pub mod listener;
pub mod models;
pub mod service;

pub use api::CampaignApi;
pub use fanout::{
    build_send_rows, plan_fanout, BlockAssignment, DEFAULT_BLOCK_SIZE, DEFAULT_INSERT_BATCH_SIZE,
};
pub use listener::{CampaignListener, EmptyCampaignListener};
pub use models::{
    Campaign, CampaignCreationReport, CampaignStatus, NewCampaign, SendRow, SendStatusRow,
};
pub use service::CampaignService;
