//! Read side of the job lifecycle: point lookups with lazy expiry, result
//! retrieval and live streams.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use slides_core::job::{result_path, JobRecord, JobStatus, JobUpdate, ResultRecord};
use slides_core::types::JobId;
use slides_db::{JobStore, ResultStore, StoreError};

use crate::fanout::JobFanout;
use crate::stream::{status_stream, StatusStream};

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Result not found: {0}")]
    ResultNotFound(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct JobStatusService {
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    fanout: JobFanout,
    heartbeat: Duration,
}

impl JobStatusService {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        results: Arc<dyn ResultStore>,
        subscriber_buffer: usize,
        heartbeat: Duration,
    ) -> Self {
        Self {
            fanout: JobFanout::new(Arc::clone(&jobs), subscriber_buffer),
            jobs,
            results,
            heartbeat,
        }
    }

    pub fn fanout(&self) -> &JobFanout {
        &self.fanout
    }

    /// Fetch a job, deleting it instead if its expiry has passed.
    pub async fn lookup(&self, id: &JobId) -> Result<JobRecord, StatusError> {
        let record = self
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| StatusError::JobNotFound(id.clone()))?;

        if record.is_expired(Utc::now()) {
            if let Err(e) = self.jobs.delete(id).await {
                tracing::warn!(job_id = %id, error = %e, "Failed to delete expired job");
            }
            return Err(StatusError::JobNotFound(id.clone()));
        }
        Ok(record)
    }

    /// Client projection of a record. A completed job carries its result
    /// link only while the result itself is still available.
    pub async fn project(&self, record: &JobRecord) -> JobUpdate {
        let mut update = record.to_update();
        if record.status != JobStatus::Completed {
            return update;
        }
        match self.results.exists(&record.id).await {
            Ok(true) => {
                update.result_url = Some(
                    record
                        .result_url
                        .clone()
                        .unwrap_or_else(|| result_path(&record.id)),
                );
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(job_id = %record.id, error = %e, "Failed to resolve result link");
            }
        }
        update
    }

    pub async fn get_job(&self, id: &JobId) -> Result<JobUpdate, StatusError> {
        let record = self.lookup(id).await?;
        Ok(self.project(&record).await)
    }

    /// Fetch a job's artifact directly by id, independent of the job record.
    pub async fn get_result(&self, id: &JobId) -> Result<ResultRecord, StatusError> {
        self.results
            .get(id)
            .await?
            .ok_or_else(|| StatusError::ResultNotFound(id.clone()))
    }

    /// Open a live stream for a job.
    ///
    /// Fails with [`StatusError::JobNotFound`] before anything is streamed
    /// if the job is unknown or expired.
    pub async fn stream_job(self: &Arc<Self>, id: &JobId) -> Result<StatusStream, StatusError> {
        let snapshot = self.lookup(id).await?;
        if snapshot.status.is_terminal() {
            return Ok(status_stream(Arc::clone(self), snapshot, None, self.heartbeat).await);
        }

        let subscription = match self.fanout.subscribe(id).await {
            Ok(subscription) => subscription,
            Err(StoreError::NotFound { .. }) => return Err(StatusError::JobNotFound(id.clone())),
            Err(e) => return Err(e.into()),
        };
        // Re-read after subscribing so nothing between the two is lost.
        let snapshot = self.lookup(id).await?;
        let subscription = (!snapshot.status.is_terminal()).then_some(subscription);

        Ok(status_stream(Arc::clone(self), snapshot, subscription, self.heartbeat).await)
    }
}
