//! Integration tests for the job store: capacity, ordering and reload.

use std::path::PathBuf;

use lipsync_core::job::{ApiKey, GenerationJob, JobErrorKind, JobStatus, MediaSource};
use lipsync_store::{JobStore, DEFAULT_CAPACITY};

fn job(id: impl Into<String>) -> GenerationJob {
    GenerationJob::new(
        id,
        MediaSource::remote("https://cdn.example/v.mp4"),
        MediaSource::remote("https://cdn.example/a.wav"),
        "lipsync-2-pro",
        Default::default(),
        ApiKey::new("sk-test-key"),
    )
}

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn inserting_501_jobs_keeps_the_newest_500_in_order() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = JobStore::open(tmp.path().join("jobs.json"), DEFAULT_CAPACITY).await;

    let mut evicted = Vec::new();
    for i in 0..501 {
        evicted.extend(store.insert(job(format!("job-{i:03}"))).await);
    }

    assert_eq!(evicted.len(), 1);
    assert_eq!(evicted[0].id, "job-000");

    let jobs = store.list().await;
    assert_eq!(jobs.len(), 500);
    assert_eq!(jobs.first().map(|j| j.id.as_str()), Some("job-001"));
    assert_eq!(jobs.last().map(|j| j.id.as_str()), Some("job-500"));
    assert!(jobs.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn oversized_snapshot_is_truncated_on_load() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("jobs.json");
    {
        let store = JobStore::open(&path, 10).await;
        for i in 0..10 {
            store.insert(job(format!("j{i}"))).await;
        }
    }

    let store = JobStore::open(&path, 4).await;
    let ids: Vec<_> = store.list().await.into_iter().map(|j| j.id).collect();
    assert_eq!(ids, ["j6", "j7", "j8", "j9"]);
}

#[tokio::test]
async fn reinserting_an_id_replaces_processing_but_keeps_terminal_records() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let store = JobStore::open(tmp.path().join("jobs.json"), DEFAULT_CAPACITY).await;

    store.insert(job("gen-1")).await;
    let mut replacement = job("gen-1");
    replacement.model = "lipsync-1.9".into();
    assert!(store.insert(replacement).await.is_empty());
    assert_eq!(store.get("gen-1").await.unwrap().model, "lipsync-1.9");

    store
        .update("gen-1", |j| j.fail(JobErrorKind::Upstream, "boom"))
        .await
        .expect("fail");
    assert!(store.insert(job("gen-1")).await.is_empty());

    let kept = store.get("gen-1").await.unwrap();
    assert_eq!(kept.status, JobStatus::Failed);
    assert_eq!(kept.error.as_deref(), Some("boom"));
    assert_eq!(store.len().await, 1);
}

// ---------------------------------------------------------------------------
// Reload
// ---------------------------------------------------------------------------

#[tokio::test]
async fn mutations_survive_a_reload() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("state").join("jobs.json");
    let output = tmp.path().join("gen-1_output.mp4");
    std::fs::write(&output, b"mp4").expect("write");

    {
        let store = JobStore::open(&path, DEFAULT_CAPACITY).await;
        store.insert(job("gen-1")).await;
        store.insert(job("gen-2")).await;
        store
            .update("gen-1", |j| j.complete(output.clone()))
            .await
            .expect("complete");
        store
            .update("gen-2", |j| j.fail(JobErrorKind::Timeout, "Timeout"))
            .await
            .expect("fail");
    }

    let reopened = JobStore::open(&path, DEFAULT_CAPACITY).await;
    let first = reopened.get("gen-1").await.expect("gen-1");
    assert_eq!(first.status, JobStatus::Completed);
    assert_eq!(first.output_location, Some(PathBuf::from(&output)));
    assert_eq!(first.credential.expose(), "sk-test-key");

    let second = reopened.get("gen-2").await.expect("gen-2");
    assert_eq!(second.status, JobStatus::Failed);
    assert_eq!(second.error.as_deref(), Some("Timeout"));
    assert!(reopened.processing().await.is_empty());
}

#[tokio::test]
async fn concurrent_updates_all_land_in_the_snapshot() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let path = tmp.path().join("jobs.json");
    let store = std::sync::Arc::new(JobStore::open(&path, DEFAULT_CAPACITY).await);
    for i in 0..20 {
        store.insert(job(format!("c{i}"))).await;
    }

    let mut handles = Vec::new();
    for i in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .update(&format!("c{i}"), |j| {
                    j.fail(JobErrorKind::Upstream, format!("failure {i}"))
                })
                .await
                .expect("update");
        }));
    }
    for handle in handles {
        handle.await.expect("join");
    }

    let reopened = JobStore::open(&path, DEFAULT_CAPACITY).await;
    let jobs = reopened.list().await;
    assert_eq!(jobs.len(), 20);
    for (i, job) in jobs.iter().enumerate() {
        assert_eq!(job.error.as_deref(), Some(format!("failure {i}").as_str()));
    }
}
