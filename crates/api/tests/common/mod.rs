#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use slides_api::bootstrap::Stores;
use slides_api::config::{BlobBackend, DispatchMode, GeneratorConfig, ServerConfig, StoreBackend};
use slides_api::router::{build_app_router, build_worker_router};
use slides_api::state::{AppState, WorkerState};
use slides_core::job::{ArtifactBundle, JobRecord};
use slides_core::progress::ProgressSink;
use slides_core::settings::{SlideSettings, Theme};
use slides_core::types::JobId;
use slides_core::upload::UploadedFile;
use slides_db::memory::MemoryBlobStore;
use slides_db::{BlobStore, JobStore};
use slides_events::JobStatusService;
use slides_generator::{ArtifactGenerator, GenerateError};
use slides_pipeline::{Dispatcher, JobProcessor, Scheduler};
use tokio::sync::Semaphore;
use tower::ServiceExt;

pub const BOUNDARY: &str = "slides-test-boundary";
pub const PDF_BYTES: &[u8] = b"%PDF-1.4 test deck";
pub const HTML_BYTES: &[u8] = b"<html><body>test deck</body></html>";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3000".to_string()],
        request_timeout_secs: 30,
        max_upload_bytes: 10 * 1024 * 1024,
        max_concurrent_jobs: 4,
        generation_timeout_secs: 300,
        handoff_timeout_secs: 10,
        job_ttl_secs: 300,
        result_ttl_secs: 3600,
        heartbeat_secs: 30,
        subscriber_buffer: 16,
        store_poll_ms: 50,
        sweep_interval_secs: 60,
        shutdown_timeout_secs: 5,
        store: StoreBackend::Memory,
        dispatch: DispatchMode::Local,
        blobs: BlobBackend::Memory,
        generator: GeneratorConfig {
            api_url: "http://127.0.0.1:9".to_string(),
            api_key: String::new(),
            model: "test-model".to_string(),
            max_input_tokens: 16_384,
            max_output_tokens: 4096,
            request_timeout_secs: 120,
            marp_command: "marp".to_string(),
            themes_dir: PathBuf::from("themes"),
        },
    }
}

// ---------------------------------------------------------------------------
// Generator double
// ---------------------------------------------------------------------------

/// Generator that reports progress, then waits for a permit before
/// returning a fixed bundle (or a failure).
pub struct ScriptedGenerator {
    gate: Semaphore,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    /// Completes immediately.
    pub fn open() -> Arc<Self> {
        Self::build(Semaphore::MAX_PERMITS, None)
    }

    /// Blocks every call until [`ScriptedGenerator::release`].
    pub fn gated() -> Arc<Self> {
        Self::build(0, None)
    }

    pub fn failing(reason: &str) -> Arc<Self> {
        Self::build(Semaphore::MAX_PERMITS, Some(reason.to_string()))
    }

    fn build(permits: usize, fail_with: Option<String>) -> Arc<Self> {
        Arc::new(Self {
            gate: Semaphore::new(permits),
            fail_with,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        _theme: Theme,
        _files: &[UploadedFile],
        _settings: &SlideSettings,
        progress: &dyn ProgressSink,
    ) -> Result<ArtifactBundle, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        progress.report("Analyzing uploaded files");
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| GenerateError::Upstream(e.to_string()))?;
        permit.forget();

        if let Some(reason) = &self.fail_with {
            return Err(GenerateError::Upstream(reason.clone()));
        }
        progress.report("Finalizing presentation");
        Ok(ArtifactBundle {
            pdf: PDF_BYTES.to_vec(),
            html: HTML_BYTES.to_vec(),
        })
    }
}

// ---------------------------------------------------------------------------
// Apps
// ---------------------------------------------------------------------------

/// The public service running jobs in-process over in-memory stores.
pub struct TestApp {
    pub router: Router,
    pub stores: Stores,
    pub processor: Arc<JobProcessor>,
}

pub fn build_test_app(generator: Arc<ScriptedGenerator>) -> TestApp {
    build_test_app_with(test_config(), generator)
}

pub fn build_test_app_with(config: ServerConfig, generator: Arc<ScriptedGenerator>) -> TestApp {
    let stores = Stores::in_memory();
    let processor = Arc::new(JobProcessor::new(
        Arc::clone(&stores.jobs),
        Arc::clone(&stores.results),
        generator,
        None,
        config.processor_config(),
    ));
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&stores.jobs),
        Scheduler::Local(Arc::clone(&processor)),
    ));
    let status = Arc::new(JobStatusService::new(
        Arc::clone(&stores.jobs),
        Arc::clone(&stores.results),
        config.subscriber_buffer,
        config.heartbeat(),
    ));

    let router = build_app_router(AppState {
        config: Arc::new(config),
        dispatcher,
        status,
        pool: None,
    });

    TestApp {
        router,
        stores,
        processor,
    }
}

/// The worker over in-memory stores and blob staging.
pub struct TestWorker {
    pub router: Router,
    pub stores: Stores,
    pub blobs: Arc<MemoryBlobStore>,
    pub processor: Arc<JobProcessor>,
}

pub fn build_test_worker(generator: Arc<ScriptedGenerator>) -> TestWorker {
    let config = test_config();
    let stores = Stores::in_memory();
    let blobs = Arc::new(MemoryBlobStore::new());
    let processor = Arc::new(JobProcessor::new(
        Arc::clone(&stores.jobs),
        Arc::clone(&stores.results),
        generator,
        Some(Arc::clone(&blobs) as Arc<dyn BlobStore>),
        config.processor_config(),
    ));

    let router = build_worker_router(WorkerState {
        config: Arc::new(config),
        processor: Arc::clone(&processor),
        pool: None,
    });

    TestWorker {
        router,
        stores,
        blobs,
        processor,
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

pub const SLIDE_REQUEST: &str =
    r#"{"theme":"default","settings":{"slideDetail":"medium","audience":"general"}}"#;

/// A multipart body from `(field, filename, bytes)` parts; text fields
/// pass `None` as filename.
pub fn multipart_body(parts: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// A valid submission with one markdown file.
pub fn markdown_submission() -> Vec<u8> {
    multipart_body(&[
        ("data", None, SLIDE_REQUEST.as_bytes()),
        ("files", Some("notes.md"), b"# Quarterly review\n\n- revenue up\n- costs down"),
    ])
}

pub async fn post_multipart(app: &Router, uri: &str, body: Vec<u8>) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn post_json(app: &Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn get_event_stream(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .uri(uri)
        .header("accept", "text/event-stream")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Submit a markdown job and return its id.
pub async fn submit(app: &Router) -> JobId {
    let response = post_multipart(app, "/api/v1/generate", markdown_submission()).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    JobId::from(json["id"].as_str().unwrap())
}

/// Poll the store until the job is terminal.
pub async fn wait_terminal(store: &dyn JobStore, id: &JobId) -> JobRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(record) = store.get(id).await.unwrap() {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach a terminal status")
}
