//! Integration tests for the worker's hand-off endpoint.

mod common;

use axum::http::StatusCode;
use chrono::Utc;
use common::{body_json, build_test_worker, post_json, wait_terminal, ScriptedGenerator};
use serde_json::json;
use slides_core::job::{JobRecord, JobStatus};
use slides_core::types::JobId;
use slides_db::{BlobStore, JobStore, ResultStore};

const TASK_PATH: &str = "/tasks/process-slides";

async fn staged_job(worker: &common::TestWorker, id: &str) -> serde_json::Value {
    let id = JobId::from(id);
    worker
        .stores
        .jobs
        .create(&JobRecord::queued(id.clone(), Utc::now()))
        .await
        .unwrap();
    let key = worker
        .blobs
        .put(&format!("{id}/notes.md"), b"# Staged notes".to_vec(), "text/plain")
        .await
        .unwrap();

    json!({
        "jobID": id,
        "theme": "gaia",
        "files": [{"filename": "notes.md", "type": "text/plain", "storageKey": key}],
        "settings": {"slideDetail": "detailed", "audience": "academic"}
    })
}

#[tokio::test]
async fn accepted_task_runs_to_completion_and_clears_staging() {
    let worker = build_test_worker(ScriptedGenerator::open());
    let task = staged_job(&worker, "job-1").await;

    let response = post_json(&worker.router, TASK_PATH, task).await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_json(response).await;
    assert_eq!(json["jobID"], "job-1");
    assert_eq!(json["status"], "accepted");

    let record = wait_terminal(worker.stores.jobs.as_ref(), &JobId::from("job-1")).await;
    assert_eq!(record.status, JobStatus::Completed);
    assert!(worker.stores.results.exists(&record.id).await.unwrap());

    // Staged uploads are removed once the job has finished.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(worker.blobs.is_empty().await);
}

#[tokio::test]
async fn redelivered_task_for_finished_job_is_acknowledged() {
    let generator = ScriptedGenerator::open();
    let worker = build_test_worker(generator.clone());
    let task = staged_job(&worker, "job-2").await;

    let first = post_json(&worker.router, TASK_PATH, task.clone()).await;
    assert_eq!(first.status(), StatusCode::ACCEPTED);
    wait_terminal(worker.stores.jobs.as_ref(), &JobId::from("job-2")).await;

    let again = post_json(&worker.router, TASK_PATH, task).await;
    assert_eq!(again.status(), StatusCode::OK);
    assert_eq!(body_json(again).await["status"], "finished");
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn task_for_unknown_job_is_404() {
    let worker = build_test_worker(ScriptedGenerator::open());
    let task = json!({
        "jobID": "ghost",
        "theme": "default",
        "files": [],
    });

    let response = post_json(&worker.router, TASK_PATH, task).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn malformed_task_is_rejected() {
    let worker = build_test_worker(ScriptedGenerator::open());
    let response = post_json(&worker.router, TASK_PATH, json!({"theme": "default"})).await;

    assert!(response.status().is_client_error());
}
