//! 活动创建进度回调接口

use async_trait::async_trait;

/// 活动创建进度监听器
#[async_trait]
pub trait CampaignListener: Send + Sync {
    /// 一个子批次写入成功，`inserted` 为累计写入行数
    async fn on_batch_inserted(&self, inserted: usize, total: usize);

    /// 一个子批次写入失败（继续处理下一批）
    async fn on_batch_failed(&self, batch_index: usize, error: String);

    /// 创建结束，参数为结果报告的 JSON 字符串
    async fn on_finished(&self, report_json: String);
}

/// 默认空实现（无操作）
pub struct EmptyCampaignListener;

#[async_trait]
impl CampaignListener for EmptyCampaignListener {
    async fn on_batch_inserted(&self, _inserted: usize, _total: usize) {}

    async fn on_batch_failed(&self, _batch_index: usize, _error: String) {}

    async fn on_finished(&self, _report_json: String) {}
}
