use std::sync::Arc;
use leafscan::{filter_records, ApiClient, DemoApi, HistoryStatus, HistoryWorkflow};

#[tokio::test]
async fn test_load_and_filter() {
    let mut history = HistoryWorkflow::new(Arc::new(DemoApi::instant()));
    let loaded = history.load().await.unwrap().len();
    assert_eq!(loaded, 3);

    let blight: Vec<_> = history.filter("blight").iter().map(|r| r.id.clone()).collect();
    assert_eq!(blight, vec!["1".to_string()]);

    let all: Vec<_> = history.filter("").iter().map(|r| r.disease_name.clone()).collect();
    assert_eq!(all, vec!["Tomato Late Blight", "Rose Black Spot", "Apple Cedar Rust"]);

    assert_eq!(history.filter("TOMATO").len(), 1);

    // 过滤不改变已加载的集合
    assert_eq!(history.records().len(), 3);
}

#[tokio::test]
async fn test_failed_load_is_empty_with_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/api/history")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let client = ApiClient::new(&format!("{}/api", server.url()), leafscan::api::DEFAULT_TIMEOUT).unwrap();
    let mut history = HistoryWorkflow::new(Arc::new(client));

    let err = history.load().await.unwrap_err();
    assert_eq!(err.status_code(), Some(503));
    assert!(history.records().is_empty());
    assert!(history.visible().is_empty());
    assert!(matches!(history.status(), HistoryStatus::Failed(reason) if reason.contains("maintenance")));
}

#[test]
fn test_filter_preserves_relative_order() {
    let records = DemoApi::sample_history();
    let filtered = filter_records(&records, "o");
    let ids: Vec<_> = filtered.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["1", "2"]);
}
