//! Integration tests for the health endpoint and static page.

use reqwest::Client;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tooth_analyzer::config::{
    ClassifierSettings, OpenAiSettings, ServerConfig, ToothConfig, UploadSettings,
};
use tooth_analyzer::services::providers::mock::MockVisionProvider;
use tooth_analyzer::startup::Application;

struct TestApp {
    port: u16,
    _upload_dir: TempDir,
}

fn test_config(upload_dir: &TempDir) -> ToothConfig {
    ToothConfig {
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_upload_mb: 5,
        },
        openai: OpenAiSettings {
            api_key: "test-api-key".to_string(),
            model: "gpt-4o".to_string(),
            api_base: "http://localhost:1/v1".to_string(),
        },
        uploads: UploadSettings {
            dir: upload_dir.path().to_path_buf(),
        },
        classifier: ClassifierSettings {
            extraction_dir: PathBuf::from("/nonexistent/extraction"),
            rootcanal_dir: PathBuf::from("/nonexistent/rootcanal"),
        },
    }
}

/// Spawn the application on a random port with the given provider.
async fn spawn_app(provider: Arc<MockVisionProvider>) -> TestApp {
    let upload_dir = tempfile::tempdir().expect("failed to create upload dir");
    let config = test_config(&upload_dir);

    let app = Application::build_with_provider(config, provider)
        .await
        .expect("Failed to build application");

    let port = app.port();
    tokio::spawn(async move {
        let _ = app.run_until_stopped().await;
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    TestApp {
        port,
        _upload_dir: upload_dir,
    }
}

#[tokio::test]
async fn health_check_returns_ok() {
    let app = spawn_app(Arc::new(MockVisionProvider::new("healthy"))).await;
    let client = Client::new();

    let response = client
        .get(format!("http://localhost:{}/health", app.port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "tooth-analyzer");
}

#[tokio::test]
async fn health_check_reports_unconfigured_provider() {
    let app = spawn_app(Arc::new(MockVisionProvider::disabled())).await;
    let client = Client::new();

    let response = client
        .get(format!("http://localhost:{}/health", app.port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(
        response.status(),
        reqwest::StatusCode::SERVICE_UNAVAILABLE
    );

    let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(body["status"], "unhealthy");
    assert!(body["error"].as_str().unwrap().contains("not enabled"));
}

#[tokio::test]
async fn index_serves_upload_page() {
    let app = spawn_app(Arc::new(MockVisionProvider::new("healthy"))).await;
    let client = Client::new();

    let response = client
        .get(format!("http://localhost:{}/", app.port))
        .timeout(Duration::from_secs(5))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("Tooth Analyzer"));
}
