//! Cross-process hand-off of the generation step.
//!
//! The admitting process stages uploads in blob storage, records the job,
//! then enqueues a [`GenerationTask`] naming the staged files. A worker
//! process picks the task up and runs the job.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use slides_core::job::FileReference;
use slides_core::settings::{SlideSettings, Theme};
use slides_core::types::JobId;

/// Path on the worker that receives hand-off tasks.
pub const PROCESS_TASK_PATH: &str = "/tasks/process-slides";

/// Serialized hand-off payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationTask {
    #[serde(rename = "jobID")]
    pub job_id: JobId,
    pub theme: Theme,
    pub files: Vec<FileReference>,
    #[serde(default)]
    pub settings: SlideSettings,
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueError {
    /// The worker refused the task for lack of capacity.
    #[error("worker is busy")]
    Busy,

    #[error("{0}")]
    Failed(String),
}

/// Delivers a task to whatever will run it.
#[async_trait]
pub trait TaskQueue: Send + Sync + 'static {
    async fn enqueue(&self, task: &GenerationTask) -> Result<(), EnqueueError>;
}

/// Delivers tasks by POSTing them straight to a worker's HTTP endpoint.
pub struct HttpTaskQueue {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTaskQueue {
    /// Each hand-off call is abandoned after `timeout` and reported as a
    /// failed enqueue, so the caller can roll the admission back.
    pub fn new(worker_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, worker_url))
    }

    pub fn with_client(client: reqwest::Client, worker_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}{PROCESS_TASK_PATH}", worker_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TaskQueue for HttpTaskQueue {
    async fn enqueue(&self, task: &GenerationTask) -> Result<(), EnqueueError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(task)
            .send()
            .await
            .map_err(|e| EnqueueError::Failed(format!("worker request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EnqueueError::Busy);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(EnqueueError::Failed(format!(
            "worker returned {}: {body}",
            status.as_u16()
        )))
    }
}
