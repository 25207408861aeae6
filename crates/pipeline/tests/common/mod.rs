//! In-memory fakes for the generation service, blob storage and transcoder,
//! plus a harness that wires them into a [`GenerationOrchestrator`].

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use lipsync_cloud::{BlobStorage, StorageError};
use lipsync_core::ffmpeg::{FfmpegError, TargetFormat, Transcoder};
use lipsync_core::job::{ApiKey, GenerationJob};
use lipsync_core::normalize::SourceNormalizer;
use lipsync_core::paths::DataDirs;
use lipsync_core::validation::SubmitRequest;
use lipsync_events::EventBus;
use lipsync_pipeline::{GenerationOrchestrator, PipelineConfig};
use lipsync_remote::{CostEstimate, CreateGeneration, GenerationMetadata, GenerationService, RemoteError};
use lipsync_store::JobStore;
use tempfile::TempDir;

pub const OUTPUT_BYTES: &[u8] = b"fake mp4 output";

// ---------------------------------------------------------------------------
// Remote service
// ---------------------------------------------------------------------------

/// One scripted answer to a status check.
#[derive(Debug, Clone)]
pub enum Scripted {
    Meta(GenerationMetadata),
    Error(String),
}

pub fn pending() -> Scripted {
    Scripted::Meta(GenerationMetadata {
        status: Some("PROCESSING".into()),
        ..Default::default()
    })
}

pub fn succeeded(id: &str) -> Scripted {
    Scripted::Meta(GenerationMetadata {
        id: Some(id.into()),
        status: Some("COMPLETED".into()),
        output_url: Some(format!("https://cdn.test/{id}.mp4")),
        error: None,
    })
}

pub fn failed(message: &str) -> Scripted {
    Scripted::Meta(GenerationMetadata {
        status: Some("FAILED".into()),
        error: Some(message.into()),
        ..Default::default()
    })
}

/// Scripted generation service. The last scripted answer for an id repeats;
/// ids with no script stay pending.
#[derive(Default)]
pub struct FakeRemote {
    scripts: Mutex<HashMap<String, VecDeque<Scripted>>>,
    fetches: Mutex<HashMap<String, usize>>,
    creates: Mutex<Vec<(CreateGeneration, ApiKey)>>,
    next_id: AtomicUsize,
    pub fail_create: AtomicBool,
    pub downloads: AtomicUsize,
    /// Added before every status answer.
    pub fetch_delay: Mutex<Duration>,
    /// Added before every download writes its file.
    pub download_delay: Mutex<Duration>,
}

impl FakeRemote {
    pub fn script(&self, id: &str, answers: impl IntoIterator<Item = Scripted>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(id.to_string(), answers.into_iter().collect());
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn creates(&self) -> Vec<(CreateGeneration, ApiKey)> {
        self.creates.lock().unwrap().clone()
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    /// Id the next successful `create` will return.
    pub fn next_id(&self) -> String {
        format!("gen-{}", self.next_id.load(Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl GenerationService for FakeRemote {
    async fn create(&self, request: &CreateGeneration, key: &ApiKey) -> Result<String, RemoteError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(RemoteError::Api {
                status: 401,
                body: "invalid api key".into(),
            });
        }
        self.creates
            .lock()
            .unwrap()
            .push((request.clone(), key.clone()));
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("gen-{n}"))
    }

    async fn fetch(&self, id: &str, _key: &ApiKey) -> Result<GenerationMetadata, RemoteError> {
        let delay = *self.fetch_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        *self.fetches.lock().unwrap().entry(id.to_string()).or_default() += 1;

        let answer = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(id) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };
        match answer.unwrap_or_else(pending) {
            Scripted::Meta(meta) => Ok(meta),
            Scripted::Error(body) => Err(RemoteError::Api { status: 500, body }),
        }
    }

    async fn download(&self, _url: &str, dest: &Path) -> Result<u64, RemoteError> {
        let delay = *self.download_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        tokio::fs::write(dest, OUTPUT_BYTES).await?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        Ok(OUTPUT_BYTES.len() as u64)
    }

    async fn estimate_cost(
        &self,
        request: &CreateGeneration,
        _key: &ApiKey,
    ) -> Result<Vec<CostEstimate>, RemoteError> {
        self.creates
            .lock()
            .unwrap()
            .push((request.clone(), ApiKey::default()));
        Ok(vec![CostEstimate {
            estimated_generation_cost: Some(1.25),
            estimated_frame_count: Some(250),
        }])
    }
}

// ---------------------------------------------------------------------------
// Blob storage
// ---------------------------------------------------------------------------

/// Records every upload with the file's content at upload time.
#[derive(Default)]
pub struct FakeStorage {
    uploads: Mutex<Vec<(PathBuf, Vec<u8>)>>,
}

impl FakeStorage {
    pub fn uploads(&self) -> Vec<(PathBuf, Vec<u8>)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl BlobStorage for FakeStorage {
    async fn upload(&self, path: &Path) -> Result<String, StorageError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| StorageError::FileNotFound(path.display().to_string()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.uploads.lock().unwrap().push((path.to_path_buf(), bytes));
        Ok(format!("https://blob.test/{name}"))
    }
}

// ---------------------------------------------------------------------------
// Transcoder
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeTranscoder {
    pub calls: Mutex<Vec<(PathBuf, TargetFormat)>>,
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn transcode(
        &self,
        src: &Path,
        target: TargetFormat,
        dest: &Path,
    ) -> Result<(), FfmpegError> {
        self.calls.lock().unwrap().push((src.to_path_buf(), target));
        tokio::fs::write(dest, b"transcoded").await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Arc<GenerationOrchestrator>,
    pub remote: Arc<FakeRemote>,
    pub storage: Arc<FakeStorage>,
    pub transcoder: Arc<FakeTranscoder>,
    pub events: Arc<EventBus>,
    pub dirs: DataDirs,
    pub documents: PathBuf,
    pub media: PathBuf,
    _root: TempDir,
}

/// Fast polling: 20ms interval, three attempts, two seconds of grace.
pub async fn harness() -> Harness {
    harness_with(100, |_| {}).await
}

pub async fn harness_with(capacity: usize, tweak: impl FnOnce(&mut PipelineConfig)) -> Harness {
    let root = tempfile::tempdir().expect("tempdir");
    let dirs = DataDirs::under(root.path().join("data"));
    dirs.ensure().await.expect("create data dirs");
    let documents = root.path().join("Documents");
    let media = root.path().join("media");
    tokio::fs::create_dir_all(&media).await.expect("create media dir");

    let mut config = PipelineConfig::with_dirs(&dirs, documents.clone());
    config.poll_interval = Duration::from_millis(20);
    config.max_attempts = 3;
    config.poll_grace = Duration::from_secs(2);
    tweak(&mut config);

    let store = Arc::new(JobStore::open(dirs.snapshot_file(), capacity).await);
    let remote = Arc::new(FakeRemote::default());
    let storage = Arc::new(FakeStorage::default());
    let transcoder = Arc::new(FakeTranscoder::default());
    let events = Arc::new(EventBus::default());

    let orchestrator = GenerationOrchestrator::new(
        config,
        store,
        remote.clone(),
        storage.clone(),
        SourceNormalizer::new(transcoder.clone()),
        events.clone(),
    );

    Harness {
        orchestrator,
        remote,
        storage,
        transcoder,
        events,
        dirs,
        documents,
        media,
        _root: root,
    }
}

impl Harness {
    /// Write `bytes` to `media/<name>` and return the absolute path.
    pub async fn media_file(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.media.join(name);
        tokio::fs::write(&path, bytes).await.expect("write media file");
        path
    }

    pub async fn wait_for_terminal(&self, id: &str) -> GenerationJob {
        wait_for_terminal(&self.orchestrator, id, Duration::from_secs(5)).await
    }
}

/// In-progress download files left in `dir`.
pub async fn part_files(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return found;
    };
    while let Some(entry) = entries.next_entry().await.expect("read dir") {
        if entry.path().extension().is_some_and(|e| e == "part") {
            found.push(entry.path());
        }
    }
    found
}

pub fn url_request() -> SubmitRequest {
    SubmitRequest {
        video_url: Some("https://cdn.test/face.mp4".into()),
        audio_url: Some("https://cdn.test/voice.wav".into()),
        api_key: ApiKey::new("sk-test-0001"),
        ..Default::default()
    }
}

pub async fn wait_for_terminal(
    orchestrator: &GenerationOrchestrator,
    id: &str,
    timeout: Duration,
) -> GenerationJob {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = orchestrator.get(id).await.expect("job exists");
        if job.status.is_terminal() {
            return job;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("job {id} still {} after {timeout:?}", job.status);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Minimal 16-bit mono AIFF at 48 kHz holding `frames` samples.
pub fn aiff_bytes(frames: u32) -> Vec<u8> {
    let data_len = frames * 2;
    let mut comm = Vec::new();
    comm.extend_from_slice(&1u16.to_be_bytes());
    comm.extend_from_slice(&frames.to_be_bytes());
    comm.extend_from_slice(&16u16.to_be_bytes());
    comm.extend_from_slice(&[0x40, 0x0E, 0xBB, 0x80, 0, 0, 0, 0, 0, 0]);

    let mut ssnd = Vec::new();
    ssnd.extend_from_slice(&0u32.to_be_bytes());
    ssnd.extend_from_slice(&0u32.to_be_bytes());
    for i in 0..frames {
        ssnd.extend_from_slice(&(i as i16 * 100).to_be_bytes());
    }
    assert_eq!(ssnd.len() as u32, data_len + 8);

    let mut body = b"AIFF".to_vec();
    body.extend_from_slice(b"COMM");
    body.extend_from_slice(&(comm.len() as u32).to_be_bytes());
    body.extend_from_slice(&comm);
    body.extend_from_slice(b"SSND");
    body.extend_from_slice(&(ssnd.len() as u32).to_be_bytes());
    body.extend_from_slice(&ssnd);

    let mut file = b"FORM".to_vec();
    file.extend_from_slice(&(body.len() as u32).to_be_bytes());
    file.extend_from_slice(&body);
    file
}
