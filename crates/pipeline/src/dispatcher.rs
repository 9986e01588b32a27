//! Request-time job admission.
//!
//! [`Dispatcher::add_job`] never waits on generation: it validates,
//! claims capacity, records the job as `queued` and hands it off.

use std::sync::Arc;

use chrono::Utc;
use slides_core::job::JobRecord;
use slides_core::settings::SlideRequest;
use slides_core::types::JobId;
use slides_core::upload::validate_uploads;
use slides_db::{BlobStore, JobStore};

use crate::error::AdmissionError;
use crate::processor::{discard_staged, stage_files, JobFiles, JobInput, JobProcessor};
use crate::task::{EnqueueError, GenerationTask, TaskQueue};

/// A raw upload: client filename and bytes. The content type is sniffed,
/// never taken from the client.
#[derive(Debug, Clone)]
pub struct SubmittedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// Where admitted jobs go.
pub enum Scheduler {
    /// Run on this process's processor.
    Local(Arc<JobProcessor>),
    /// Stage uploads and hand the job to a worker process.
    Remote {
        queue: Arc<dyn TaskQueue>,
        blobs: Arc<dyn BlobStore>,
    },
}

pub struct Dispatcher {
    jobs: Arc<dyn JobStore>,
    scheduler: Scheduler,
}

impl Dispatcher {
    pub fn new(jobs: Arc<dyn JobStore>, scheduler: Scheduler) -> Self {
        Self { jobs, scheduler }
    }

    /// Admit one submission.
    pub async fn add_job(
        &self,
        request: &SlideRequest,
        files: Vec<SubmittedFile>,
    ) -> Result<JobRecord, AdmissionError> {
        let options = request.validate()?;
        let files = validate_uploads(files.into_iter().map(|f| (f.filename, f.data)))?;

        match &self.scheduler {
            Scheduler::Local(processor) => {
                let reservation = processor.try_reserve().ok_or(AdmissionError::Busy)?;

                let record = JobRecord::queued(JobId::generate(), Utc::now());
                self.jobs.create(&record).await?;

                let input = JobInput {
                    id: record.id.clone(),
                    theme: options.theme,
                    settings: options.settings,
                    files: JobFiles::Inline(files),
                };
                if !processor.spawn(reservation, input) {
                    tracing::warn!(job_id = %record.id, "Job id already running, rolling back admission");
                    if let Err(e) = self.jobs.delete(&record.id).await {
                        tracing::warn!(job_id = %record.id, error = %e, "Failed to roll back job record");
                    }
                    return Err(AdmissionError::Busy);
                }
                tracing::info!(job_id = %record.id, theme = %options.theme, "Job queued");
                Ok(record)
            }

            Scheduler::Remote { queue, blobs } => {
                let id = JobId::generate();
                let staged = stage_files(blobs.as_ref(), &id, files).await?;

                let record = JobRecord::queued(id.clone(), Utc::now());
                if let Err(e) = self.jobs.create(&record).await {
                    discard_staged(blobs.as_ref(), &staged).await;
                    return Err(e.into());
                }

                let task = GenerationTask {
                    job_id: id.clone(),
                    theme: options.theme,
                    files: staged.clone(),
                    settings: options.settings,
                };
                if let Err(e) = queue.enqueue(&task).await {
                    tracing::warn!(job_id = %id, error = %e, "Hand-off refused, rolling back job");
                    if let Err(e) = self.jobs.delete(&id).await {
                        tracing::warn!(job_id = %id, error = %e, "Failed to roll back job record");
                    }
                    discard_staged(blobs.as_ref(), &staged).await;
                    return Err(match e {
                        EnqueueError::Busy => AdmissionError::Busy,
                        EnqueueError::Failed(msg) => AdmissionError::Enqueue(msg),
                    });
                }

                tracing::info!(job_id = %id, theme = %options.theme, files = staged.len(), "Job handed off");
                Ok(record)
            }
        }
    }
}
