//! Generation-time job driver.
//!
//! Drives one job `queued -> processing -> completed | failed`, writing
//! every step through to the job store. At most one task runs per job id
//! in this process; distinct jobs run in parallel up to the permit count.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use slides_core::job::{
    blob_key, failure_message, result_path, ArtifactBundle, FileReference, JobPatch, ResultRecord,
    MSG_PROCESSING,
};
use slides_core::settings::{SlideSettings, Theme};
use slides_core::types::JobId;
use slides_core::upload::UploadedFile;
use slides_db::{BlobStore, JobStore, ResultStore, StoreError};
use slides_generator::ArtifactGenerator;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::task::TaskTracker;

use crate::error::AcceptError;
use crate::progress::spawn_progress_writer;
use crate::task::GenerationTask;

/// Default number of jobs generating at once.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 4;

/// Default bound on one job's generation step.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub max_concurrent_jobs: usize,
    /// A generation step still running after this is abandoned and the
    /// job marked failed.
    pub generation_timeout: Duration,
    /// How long a terminal job record stays readable.
    pub job_ttl: chrono::Duration,
    /// How long a generated result stays downloadable.
    pub result_ttl: chrono::Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
            job_ttl: chrono::Duration::seconds(300),
            result_ttl: chrono::Duration::seconds(3600),
        }
    }
}

/// Where a job's input bytes live.
#[derive(Debug, Clone)]
pub enum JobFiles {
    Inline(Vec<UploadedFile>),
    /// Staged in blob storage; deleted once the job is terminal.
    Staged(Vec<FileReference>),
}

/// Everything needed to run one job.
#[derive(Debug, Clone)]
pub struct JobInput {
    pub id: JobId,
    pub theme: Theme,
    pub settings: SlideSettings,
    pub files: JobFiles,
}

impl From<GenerationTask> for JobInput {
    fn from(task: GenerationTask) -> Self {
        Self {
            id: task.job_id,
            theme: task.theme,
            settings: task.settings,
            files: JobFiles::Staged(task.files),
        }
    }
}

/// What the worker did with a hand-off task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAcceptance {
    /// Scheduled for processing.
    Accepted,
    /// Already being processed here; the duplicate is ignored.
    AlreadyRunning,
    /// Already terminal; the duplicate is ignored.
    AlreadyFinished,
}

/// A held admission slot. Dropping it frees the slot.
pub struct Reservation {
    _permit: OwnedSemaphorePermit,
}

/// Removes the job from the running set when the task ends.
struct RunningGuard {
    running: Arc<Mutex<HashSet<JobId>>>,
    id: JobId,
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

pub struct JobProcessor {
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    generator: Arc<dyn ArtifactGenerator>,
    blobs: Option<Arc<dyn BlobStore>>,
    permits: Arc<Semaphore>,
    running: Arc<Mutex<HashSet<JobId>>>,
    tracker: TaskTracker,
    config: ProcessorConfig,
}

impl JobProcessor {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        results: Arc<dyn ResultStore>,
        generator: Arc<dyn ArtifactGenerator>,
        blobs: Option<Arc<dyn BlobStore>>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            jobs,
            results,
            generator,
            blobs,
            permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
            running: Arc::new(Mutex::new(HashSet::new())),
            tracker: TaskTracker::new(),
            config,
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Number of jobs currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.config.max_concurrent_jobs.max(1) - self.permits.available_permits()
    }

    /// Claim an admission slot without waiting. `None` means at capacity.
    pub fn try_reserve(&self) -> Option<Reservation> {
        self.permits
            .clone()
            .try_acquire_owned()
            .ok()
            .map(|permit| Reservation { _permit: permit })
    }

    /// Mark `id` running. Returns `None` if it already is.
    fn claim(&self, id: &JobId) -> Option<RunningGuard> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if !running.insert(id.clone()) {
            return None;
        }
        Some(RunningGuard {
            running: Arc::clone(&self.running),
            id: id.clone(),
        })
    }

    pub fn is_running(&self, id: &JobId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(id)
    }

    /// Run `input` in the background under a held slot.
    ///
    /// Returns `false` without spawning if the job is already running here.
    pub fn spawn(self: &Arc<Self>, reservation: Reservation, input: JobInput) -> bool {
        let Some(guard) = self.claim(&input.id) else {
            return false;
        };

        let this = Arc::clone(self);
        self.tracker.spawn(async move {
            let _reservation = reservation;
            let _guard = guard;
            let id = input.id.clone();

            let worker = {
                let this = Arc::clone(&this);
                tokio::spawn(async move { this.process_job(input).await })
            };
            if let Err(e) = worker.await {
                tracing::error!(job_id = %id, error = %e, "Job task aborted");
                this.fail(&id, "internal error").await;
            }
        });
        true
    }

    /// Worker entry point for a hand-off task.
    ///
    /// Duplicate deliveries are absorbed: a job that is already terminal or
    /// already running here is acknowledged without being run again.
    pub async fn accept_task(
        self: &Arc<Self>,
        task: GenerationTask,
    ) -> Result<TaskAcceptance, AcceptError> {
        let record = self
            .jobs
            .get(&task.job_id)
            .await?
            .ok_or_else(|| AcceptError::NotFound(task.job_id.to_string()))?;

        if record.status.is_terminal() {
            tracing::info!(job_id = %task.job_id, status = %record.status, "Task for finished job ignored");
            return Ok(TaskAcceptance::AlreadyFinished);
        }
        if self.is_running(&task.job_id) {
            return Ok(TaskAcceptance::AlreadyRunning);
        }

        let reservation = self.try_reserve().ok_or(AcceptError::Busy)?;
        if self.spawn(reservation, task.into()) {
            Ok(TaskAcceptance::Accepted)
        } else {
            Ok(TaskAcceptance::AlreadyRunning)
        }
    }

    /// Drive one job to a terminal status. Never returns an error: every
    /// failure is recorded on the job itself.
    pub async fn process_job(&self, input: JobInput) {
        let id = input.id.clone();

        match self
            .jobs
            .update(&id, &JobPatch::processing(MSG_PROCESSING))
            .await
        {
            Ok(_) => tracing::info!(job_id = %id, theme = %input.theme, "Job processing started"),
            Err(StoreError::Conflict(_)) => {
                tracing::info!(job_id = %id, "Job already finished, skipping");
                return;
            }
            Err(StoreError::NotFound { .. }) => {
                tracing::warn!(job_id = %id, "Job record missing, skipping");
                return;
            }
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "Failed to mark job processing");
            }
        }

        let staged = match &input.files {
            JobFiles::Staged(refs) => refs.clone(),
            JobFiles::Inline(_) => Vec::new(),
        };

        let outcome = match self.load_files(input.files).await {
            Ok(files) => {
                let (sink, writer) = spawn_progress_writer(Arc::clone(&self.jobs), id.clone());
                let generated = tokio::time::timeout(
                    self.config.generation_timeout,
                    self.generator
                        .generate(input.theme, &files, &input.settings, &sink),
                )
                .await;
                drop(sink);
                writer.finish().await;
                match generated {
                    Ok(generated) => generated.map_err(|e| e.to_string()),
                    Err(_) => {
                        tracing::warn!(
                            job_id = %id,
                            timeout_secs = self.config.generation_timeout.as_secs(),
                            "Generation timed out"
                        );
                        Err("generation timed out".to_string())
                    }
                }
            }
            Err(message) => Err(message),
        };

        match outcome {
            Ok(bundle) => self.complete(&id, bundle).await,
            Err(message) => {
                tracing::warn!(job_id = %id, error = %message, "Slide generation failed");
                self.fail(&id, &message).await;
            }
        }

        self.cleanup_staged(&id, &staged).await;
    }

    async fn load_files(&self, files: JobFiles) -> Result<Vec<UploadedFile>, String> {
        let refs = match files {
            JobFiles::Inline(files) => return Ok(files),
            JobFiles::Staged(refs) => refs,
        };
        let blobs = self
            .blobs
            .as_ref()
            .ok_or_else(|| "no blob store configured for staged files".to_string())?;

        let mut loaded = Vec::with_capacity(refs.len());
        for file in refs {
            let data = blobs.get(&file.storage_key).await.map_err(|e| {
                tracing::error!(key = %file.storage_key, error = %e, "Failed to fetch staged file");
                format!("failed to read uploaded file {}", file.filename)
            })?;
            loaded.push(UploadedFile {
                filename: file.filename,
                content_type: file.content_type,
                data,
            });
        }
        Ok(loaded)
    }

    /// Persist the result, then mark the job completed. If the completion
    /// write fails the job is marked failed and the result withdrawn.
    async fn complete(&self, id: &JobId, bundle: ArtifactBundle) {
        let now = Utc::now();
        let record = ResultRecord {
            id: id.clone(),
            bundle,
            created_at: now,
            expires_at: now + self.config.result_ttl,
        };
        if let Err(e) = self.results.put(record).await {
            tracing::error!(job_id = %id, error = %e, "Failed to store result");
            self.fail(id, "failed to store generated presentation").await;
            return;
        }

        let patch = JobPatch::completed(result_path(id), now + self.config.job_ttl);
        match self.jobs.update(id, &patch).await {
            Ok(_) => tracing::info!(job_id = %id, "Job completed"),
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to record job completion");
                if let Err(e) = self.results.delete(id).await {
                    tracing::warn!(job_id = %id, error = %e, "Failed to withdraw orphaned result");
                }
                self.fail(id, "failed to record completion").await;
            }
        }
    }

    async fn fail(&self, id: &JobId, reason: &str) {
        let patch = JobPatch::failed(
            failure_message(&reason),
            Utc::now() + self.config.job_ttl,
        );
        if let Err(e) = self.jobs.update(id, &patch).await {
            tracing::error!(job_id = %id, error = %e, "Failed to record job failure");
        }
    }

    /// Best-effort removal of staged uploads.
    async fn cleanup_staged(&self, id: &JobId, staged: &[FileReference]) {
        if let (Some(blobs), false) = (&self.blobs, staged.is_empty()) {
            discard_staged(blobs.as_ref(), staged).await;
            tracing::debug!(job_id = %id, count = staged.len(), "Staged files cleaned up");
        }
    }

    /// Stop accepting tasks and wait for running jobs to finish.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

/// Stage every file of a job under `{job_id}/{index}-{filename}`.
///
/// On failure, already-staged files are removed before returning.
pub async fn stage_files(
    blobs: &dyn BlobStore,
    id: &JobId,
    files: Vec<UploadedFile>,
) -> Result<Vec<FileReference>, slides_db::BlobError> {
    let mut staged: Vec<FileReference> = Vec::with_capacity(files.len());
    for (index, file) in files.into_iter().enumerate() {
        let key = blob_key(id, index, &file.filename);
        match blobs.put(&key, file.data, &file.content_type).await {
            Ok(storage_key) => staged.push(FileReference {
                filename: file.filename,
                content_type: file.content_type,
                storage_key,
            }),
            Err(e) => {
                discard_staged(blobs, &staged).await;
                return Err(e);
            }
        }
    }
    Ok(staged)
}

/// Best-effort delete of staged files.
pub async fn discard_staged(blobs: &dyn BlobStore, staged: &[FileReference]) {
    for file in staged {
        if let Err(e) = blobs.delete(&file.storage_key).await {
            tracing::warn!(key = %file.storage_key, error = %e, "Failed to delete staged file");
        }
    }
}
