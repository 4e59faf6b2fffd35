mod harness;

use std::sync::Arc;

use harness::{config::ConfigBuilder, mock_engine::MockEngine, server::TestServer, storage::TestStorage};

#[tokio::test]
async fn health_reports_model_loaded() {
    let storage = TestStorage::new().with_default_speaker();
    let config = ConfigBuilder::new(&storage).build();

    let server = TestServer::start(config, Some(Arc::new(MockEngine::new()))).await.unwrap();

    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["modelLoaded"], true);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert!(body.get("detail").is_none());
}

#[tokio::test]
async fn health_without_engine_reports_not_loaded() {
    let storage = TestStorage::new();
    let config = ConfigBuilder::new(&storage).build();

    let server = TestServer::start(config, None).await.unwrap();

    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["modelLoaded"], false);
}

#[tokio::test]
async fn failed_probe_reports_not_loaded() {
    let storage = TestStorage::new().with_default_speaker();
    let config = ConfigBuilder::new(&storage).build();
    let engine = Arc::new(MockEngine::new().not_ready("gpt.pth missing"));

    let server = TestServer::start(config, Some(engine)).await.unwrap();

    let body: serde_json::Value = server
        .client()
        .get(server.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["modelLoaded"], false);
    assert!(body["detail"].as_str().unwrap().contains("gpt.pth missing"));
}

#[tokio::test]
async fn health_endpoint_disabled() {
    let storage = TestStorage::new();
    let config = ConfigBuilder::new(&storage).without_health().build();

    let server = TestServer::start(config, None).await.unwrap();

    let resp = server.client().get(server.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    let root: serde_json::Value = server.client().get(server.url("/")).send().await.unwrap().json().await.unwrap();
    assert_eq!(root["health"], serde_json::Value::Null);
}

#[tokio::test]
async fn root_describes_service() {
    let storage = TestStorage::new();
    let config = ConfigBuilder::new(&storage).build();

    let server = TestServer::start(config, None).await.unwrap();

    let resp = server.client().get(server.url("/")).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "intone");
    assert_eq!(body["health"], "/health");
    assert_eq!(body["endpoints"]["synthesize"], "POST /tts");
    assert_eq!(body["endpoints"]["audio"], "GET|HEAD /audio/{taskId}");
}
