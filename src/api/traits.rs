use async_trait::async_trait;
use crate::upload::UploadCandidate;
use super::errors::Result;
use super::types::{Analysis, PlantProfile, ScanRecord, TreatmentPlan};

/// 诊断服务接口 - HTTP 客户端和演示实现都实现此接口
///
/// 每个远端能力对应一个方法，失败统一返回 [`ApiError`](super::ApiError)。
/// 不做重试，也不缓存响应。
#[async_trait]
pub trait PlantApi: Send + Sync {
    /// 提交图片做病害分析
    async fn analyze(&self, candidate: &UploadCandidate) -> Result<Analysis>;

    /// 查询某个病害的治疗方案
    async fn fetch_treatment(&self, disease_name: &str) -> Result<TreatmentPlan>;

    /// 查询植物资料
    async fn fetch_plant_info(&self, plant_name: &str) -> Result<PlantProfile>;

    /// 获取扫描历史
    async fn fetch_history(&self) -> Result<Vec<ScanRecord>>;

    /// 获取单条扫描记录
    async fn fetch_scan(&self, scan_id: &str) -> Result<ScanRecord>;
}
