#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use lipsync_api::background::storage_cleanup::CleanupConfig;
use lipsync_api::config::ServerConfig;
use lipsync_api::router::build_app_router;
use lipsync_api::state::AppState;
use lipsync_cloud::{BlobStorage, StorageError};
use lipsync_core::ffmpeg::FfmpegTranscoder;
use lipsync_core::job::ApiKey;
use lipsync_core::normalize::SourceNormalizer;
use lipsync_core::paths::DataDirs;
use lipsync_events::EventBus;
use lipsync_pipeline::{GenerationOrchestrator, PipelineConfig};
use lipsync_remote::{CostEstimate, CreateGeneration, GenerationMetadata, GenerationService, RemoteError};
use lipsync_store::JobStore;
use tempfile::TempDir;
use tower::ServiceExt;

pub const OUTPUT_BYTES: &[u8] = b"fake mp4 output";

/// Remote service that completes every generation on the first status check.
#[derive(Default)]
pub struct InstantRemote {
    next_id: AtomicUsize,
    pub keys: Mutex<Vec<ApiKey>>,
}

#[async_trait]
impl GenerationService for InstantRemote {
    async fn create(&self, _request: &CreateGeneration, key: &ApiKey) -> Result<String, RemoteError> {
        self.keys.lock().unwrap().push(key.clone());
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("gen-{n}"))
    }

    async fn fetch(&self, id: &str, _key: &ApiKey) -> Result<GenerationMetadata, RemoteError> {
        Ok(GenerationMetadata {
            id: Some(id.into()),
            status: Some("COMPLETED".into()),
            output_url: Some(format!("https://cdn.test/{id}.mp4")),
            error: None,
        })
    }

    async fn download(&self, _url: &str, dest: &Path) -> Result<u64, RemoteError> {
        tokio::fs::write(dest, OUTPUT_BYTES).await?;
        Ok(OUTPUT_BYTES.len() as u64)
    }

    async fn estimate_cost(
        &self,
        _request: &CreateGeneration,
        key: &ApiKey,
    ) -> Result<Vec<CostEstimate>, RemoteError> {
        self.keys.lock().unwrap().push(key.clone());
        Ok(vec![CostEstimate {
            estimated_generation_cost: Some(0.5),
            estimated_frame_count: Some(120),
        }])
    }
}

pub struct NoStorage;

#[async_trait]
impl BlobStorage for NoStorage {
    async fn upload(&self, _path: &Path) -> Result<String, StorageError> {
        Err(StorageError::NotConfigured)
    }
}

pub struct TestApp {
    pub app: Router,
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub remote: Arc<InstantRemote>,
    pub dirs: DataDirs,
    pub documents: PathBuf,
    pub root: TempDir,
}

/// Build a test `ServerConfig` rooted at `root`.
pub fn test_config(root: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        data_dir: root.join("data"),
        documents_dir: root.join("Documents"),
        sync_api_base: "http://127.0.0.1:9/v2".to_string(),
        job_store_capacity: 100,
        ffmpeg_path: "ffmpeg".to_string(),
        cleanup: CleanupConfig::default(),
    }
}

/// Build the full application router with fakes behind the orchestrator.
///
/// Polls every 20ms so submitted jobs complete quickly.
pub async fn build_test_app() -> TestApp {
    let root = tempfile::tempdir().expect("tempdir");
    let config = test_config(root.path());
    let dirs = DataDirs::under(&config.data_dir);
    dirs.ensure().await.expect("create data dirs");

    let mut pipeline = PipelineConfig::with_dirs(&dirs, config.documents_dir.clone());
    pipeline.poll_interval = std::time::Duration::from_millis(20);
    pipeline.max_attempts = 3;

    let remote = Arc::new(InstantRemote::default());
    let orchestrator = GenerationOrchestrator::new(
        pipeline,
        Arc::new(JobStore::open(dirs.snapshot_file(), config.job_store_capacity).await),
        remote.clone(),
        Arc::new(NoStorage),
        SourceNormalizer::new(Arc::new(FfmpegTranscoder::default())),
        Arc::new(EventBus::default()),
    );

    let state = AppState {
        orchestrator: Arc::clone(&orchestrator),
        config: Arc::new(config.clone()),
    };

    TestApp {
        app: build_app_router(state, &config),
        orchestrator,
        remote,
        documents: config.documents_dir.clone(),
        dirs,
        root,
    }
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_with_key(
    app: Router,
    uri: &str,
    key: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .header("x-api-key", key)
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).expect("response body is JSON")
}

/// Poll `GET /api/v1/jobs/{id}` until the job leaves `processing`.
pub async fn wait_until_terminal(app: &Router, id: &str) -> serde_json::Value {
    for _ in 0..200 {
        let response = get(app.clone(), &format!("/api/v1/jobs/{id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        if json["data"]["status"] != "processing" {
            return json["data"].clone();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("job {id} never finished");
}
