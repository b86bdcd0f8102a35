use std::sync::Arc;
use crate::api::{ApiError, PlantApi, Result, ScanRecord};

/// 按病害名称做大小写不敏感的子串匹配，保持原有顺序。空字符串返回全部
pub fn filter_records<'a>(records: &'a [ScanRecord], term: &str) -> Vec<&'a ScanRecord> {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return records.iter().collect();
    }

    records
        .iter()
        .filter(|record| record.disease_name.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HistoryStatus {
    #[default]
    NotLoaded,
    Loading,
    Loaded,
    /// 加载失败，记录为空
    Failed(String),
}

/// 扫描历史列表，带实时搜索过滤
///
/// The loaded collection is replaced wholesale on each load and never mutated
/// in place; the filtered view is recomputed from the current search term on
/// every call.
pub struct HistoryWorkflow {
    api: Arc<dyn PlantApi>,
    records: Vec<ScanRecord>,
    status: HistoryStatus,
    search_term: String,
}

impl HistoryWorkflow {
    pub fn new(api: Arc<dyn PlantApi>) -> Self {
        Self {
            api,
            records: Vec::new(),
            status: HistoryStatus::NotLoaded,
            search_term: String::new(),
        }
    }

    pub async fn load(&mut self) -> Result<&[ScanRecord]> {
        self.status = HistoryStatus::Loading;

        match self.api.fetch_history().await {
            Ok(records) => {
                tracing::info!(count = records.len(), "History loaded");
                self.records = records;
                self.status = HistoryStatus::Loaded;
                Ok(&self.records)
            }
            Err(err) => {
                tracing::warn!(error = %err, "Failed to load history");
                self.records = Vec::new();
                self.status = HistoryStatus::Failed(err.to_string());
                Err(err)
            }
        }
    }

    pub fn status(&self) -> &HistoryStatus {
        &self.status
    }

    pub fn records(&self) -> &[ScanRecord] {
        &self.records
    }

    pub fn filter(&self, term: &str) -> Vec<&ScanRecord> {
        filter_records(&self.records, term)
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn clear_search_term(&mut self) {
        self.search_term.clear();
    }

    /// 当前搜索词下可见的记录
    pub fn visible(&self) -> Vec<&ScanRecord> {
        self.filter(&self.search_term)
    }

    /// 获取单条记录详情
    pub async fn detail(&self, scan_id: &str) -> Result<ScanRecord> {
        self.api.fetch_scan(scan_id).await.inspect_err(|err: &ApiError| {
            tracing::warn!(%scan_id, error = %err, "Failed to load scan");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::DemoApi;

    fn names<'a>(records: &[&'a ScanRecord]) -> Vec<&'a str> {
        records.iter().map(|r| r.disease_name.as_str()).collect()
    }

    #[test]
    fn test_filter_empty_term_returns_all_in_order() {
        let records = DemoApi::sample_history();
        let filtered = filter_records(&records, "");
        assert_eq!(filtered.len(), records.len());
        assert_eq!(names(&filtered), ["Tomato Late Blight", "Rose Black Spot", "Apple Cedar Rust"]);
    }

    #[test]
    fn test_filter_substring() {
        let records = DemoApi::sample_history();
        assert_eq!(names(&filter_records(&records, "blight")), ["Tomato Late Blight"]);
        assert_eq!(names(&filter_records(&records, "TOMATO")), ["Tomato Late Blight"]);
        assert_eq!(names(&filter_records(&records, "s")), ["Rose Black Spot", "Apple Cedar Rust"]);
        assert!(filter_records(&records, "mildew").is_empty());
    }

    #[test]
    fn test_filter_whitespace_is_literal() {
        let records = DemoApi::sample_history();
        assert_eq!(names(&filter_records(&records, "k s")), ["Rose Black Spot"]);
        assert!(filter_records(&records, " ").len() == 3);
    }

    #[tokio::test]
    async fn test_search_term_view() {
        let mut history = HistoryWorkflow::new(Arc::new(DemoApi::instant()));
        assert_eq!(history.status(), &HistoryStatus::NotLoaded);

        history.load().await.unwrap();
        assert_eq!(history.status(), &HistoryStatus::Loaded);

        history.set_search_term("rust");
        assert_eq!(names(&history.visible()), ["Apple Cedar Rust"]);

        history.clear_search_term();
        assert_eq!(history.visible().len(), 3);
        assert_eq!(history.records().len(), 3);
    }

    #[tokio::test]
    async fn test_detail() {
        let history = HistoryWorkflow::new(Arc::new(DemoApi::instant()));
        assert_eq!(history.detail("3").await.unwrap().disease_name, "Apple Cedar Rust");
        assert!(history.detail("missing").await.is_err());
    }
}
