//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a scripted translation engine and an in-memory object store, so the
//! full HTTP surface can be exercised without external processes.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use pdfxlate_core::{
    storage::StorageBackend,
    testing::{MockEngine, MockStorageBackend, ScriptStep},
    ArtifactUploader, Config, DedupUploader, FileRegistry, OrchestratorConfig, ServerConfig,
    StorageConfig, TaskOrchestrator, TaskRegistry, WorkspaceConfig,
};
use pdfxlate_server::api::{create_router, WsBroadcaster};
use pdfxlate_server::state::AppState;

/// Re-export fixtures for test convenience
pub use pdfxlate_core::testing::fixtures;

/// Multipart boundary used by [`TestFixture::upload`].
const BOUNDARY: &str = "pdfxlate-test-boundary";

/// Test fixture for E2E testing with mock dependencies.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_upload() {
///     let fixture = TestFixture::new().await;
///     let response = fixture.upload("paper.pdf", &fixtures::pdf_bytes("x")).await;
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Scripted engine shared with the orchestrator
    pub engine: MockEngine,
    /// In-memory object store (only wired in when storage is enabled)
    pub storage: Arc<MockStorageBackend>,
    pub orchestrator: Arc<TaskOrchestrator>,
    /// Temporary workspace root
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub raw: Bytes,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Steps the mock engine plays for every task
    pub script: Vec<ScriptStep>,
    /// Upload artifacts to the mock object store
    pub enable_storage: bool,
    pub max_upload_bytes: u64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            script: vec![ScriptStep::progress(50.0, "Translating"), ScriptStep::finish(1.0)],
            enable_storage: false,
            max_upload_bytes: 1024 * 1024,
        }
    }
}

impl TestConfig {
    /// Engine that keeps running until cancelled.
    pub fn with_slow_engine() -> Self {
        Self {
            script: vec![
                ScriptStep::progress(10.0, "Translating"),
                ScriptStep::sleep_ms(30_000),
                ScriptStep::finish(30.0),
            ],
            ..Default::default()
        }
    }

    pub fn with_storage() -> Self {
        Self {
            enable_storage: true,
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
                static_dir: None,
            },
            workspace: WorkspaceConfig {
                root: temp_dir.path().to_path_buf(),
                max_upload_bytes: test_config.max_upload_bytes,
            },
            orchestrator: OrchestratorConfig {
                cancel_grace_ms: 500,
                ..Default::default()
            },
            storage: StorageConfig {
                auth_token: "test-secret-token".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };

        let engine = MockEngine::with_script(test_config.script);
        let storage = Arc::new(MockStorageBackend::new());
        let uploader: Arc<dyn ArtifactUploader> = if test_config.enable_storage {
            let backend: Arc<dyn StorageBackend> = storage.clone();
            Arc::new(DedupUploader::new(backend))
        } else {
            Arc::new(DedupUploader::disabled())
        };

        let files = Arc::new(FileRegistry::new(
            config.workspace.files_dir(),
            config.workspace.max_upload_bytes,
        ));
        let registry = Arc::new(TaskRegistry::new(config.workspace.tasks_dir()));
        let orchestrator = Arc::new(TaskOrchestrator::new(
            config.orchestrator.clone(),
            registry,
            Arc::new(engine.clone()),
            uploader,
        ));

        let state = Arc::new(AppState::new(
            config,
            files,
            Arc::clone(&orchestrator),
            fixtures::empty_catalog(),
            WsBroadcaster::default(),
        ));

        let router = create_router(state);

        Self {
            router,
            engine,
            storage,
            orchestrator,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body)).await
    }

    /// Send a POST request without a body.
    pub async fn post_empty(&self, path: &str) -> TestResponse {
        self.request("POST", path, None).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None).await
    }

    /// Send a POST request with raw string body (for testing malformed JSON).
    pub async fn post_raw(&self, path: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// Upload a document as the `file` field of a multipart form.
    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> TestResponse {
        self.upload_field("file", filename, bytes).await
    }

    /// Upload bytes under an arbitrary multipart field name.
    pub async fn upload_field(&self, field: &str, filename: &str, bytes: &[u8]) -> TestResponse {
        let mut body = Vec::new();
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                field, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: application/pdf\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/files")
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Upload a valid PDF and return its file id.
    pub async fn upload_pdf(&self) -> String {
        let response = self.upload("paper.pdf", &fixtures::pdf_bytes("paper")).await;
        assert_eq!(response.status, StatusCode::OK, "upload failed: {}", response.body);
        response.body["file_id"]
            .as_str()
            .expect("upload returns a file id")
            .to_string()
    }

    /// Upload a PDF and start translating it with default settings.
    pub async fn start_task(&self) -> String {
        let file_id = self.upload_pdf().await;
        let response = self
            .post("/api/v1/translate", serde_json::json!({ "file_id": file_id }))
            .await;
        assert_eq!(response.status, StatusCode::OK, "translate failed: {}", response.body);
        response.body["task_id"]
            .as_str()
            .expect("translate returns a task id")
            .to_string()
    }

    /// Poll a task until its status matches one of `statuses`.
    pub async fn wait_for_status(&self, task_id: &str, statuses: &[&str]) -> Value {
        self.wait_for_task(task_id, |task| {
            statuses.contains(&task["status"].as_str().unwrap_or_default())
        })
        .await
    }

    /// Poll the task until `condition` holds for its JSON snapshot.
    pub async fn wait_for_task<F>(&self, task_id: &str, condition: F) -> Value
    where
        F: Fn(&Value) -> bool,
    {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let response = self.get(&format!("/api/v1/tasks/{}", task_id)).await;
            assert_eq!(response.status, StatusCode::OK);
            if condition(&response.body) {
                return response.body;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("Timed out waiting for task {}: {}", task_id, response.body);
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Send a request to the test server.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let raw = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if raw.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&raw).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            raw,
        }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
