//! Job lifecycle model shared by the stores, the dispatcher and the
//! status surfaces.
//!
//! A job moves `queued -> processing -> (completed | failed)`. Terminal
//! records are immutable: [`JobRecord::apply`] rejects any further patch,
//! which is what keeps a late progress write from reopening a finished job.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status messages
// ---------------------------------------------------------------------------

pub const MSG_QUEUED: &str = "Job added to queue";
pub const MSG_PROCESSING: &str = "Processing slides";
pub const MSG_ANALYZING: &str = "Analyzing uploaded files";
pub const MSG_GENERATING_CONTENT: &str = "Generating content for slides";
pub const MSG_CREATING_PRESENTATION: &str = "Creating presentation with AI";
pub const MSG_FINALIZING: &str = "Finalizing presentation";
pub const MSG_COMPLETED: &str = "Slides generated successfully";

/// Prefix for the message stored on a failed job; the error text follows.
pub const MSG_FAILED_PREFIX: &str = "Failed to generate slides";

pub fn failure_message(error: &impl std::fmt::Display) -> String {
    format!("{MSG_FAILED_PREFIX}: {error}")
}

/// Public path at which a completed job's artifact can be fetched.
pub fn result_path(id: &JobId) -> String {
    format!("/results/{id}")
}

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        match name {
            "queued" => Ok(JobStatus::Queued),
            "processing" => Ok(JobStatus::Processing),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(CoreError::Validation(format!("unknown job status '{other}'"))),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobRecord
// ---------------------------------------------------------------------------

/// Authoritative state of one generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub message: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    /// Set once the job reaches a terminal status.
    pub expires_at: Option<Timestamp>,
    pub result_url: Option<String>,
    /// Bumped on every accepted write; consumers use it to order and
    /// de-duplicate snapshots.
    pub revision: u64,
}

impl JobRecord {
    pub fn queued(id: JobId, now: Timestamp) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            message: MSG_QUEUED.to_string(),
            created_at: now,
            updated_at: now,
            expires_at: None,
            result_url: None,
            revision: 1,
        }
    }

    /// A record is expired strictly after its expiry instant.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_some_and(|at| now > at)
    }

    /// Apply a patch in place, bumping the revision.
    ///
    /// Fails with [`CoreError::Conflict`] when the record is already terminal.
    pub fn apply(&mut self, patch: &JobPatch) -> Result<(), CoreError> {
        if self.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "job {} is already {}",
                self.id, self.status
            )));
        }

        self.status = patch.status;
        self.message = patch.message.clone();
        self.updated_at = patch.updated_at;
        if patch.expires_at.is_some() {
            self.expires_at = patch.expires_at;
        }
        if patch.result_url.is_some() {
            self.result_url = patch.result_url.clone();
        }
        self.revision += 1;
        Ok(())
    }

    /// Client-visible projection. The result link is resolved separately
    /// by the status surface, so it starts empty here.
    pub fn to_update(&self) -> JobUpdate {
        JobUpdate {
            id: self.id.clone(),
            status: self.status,
            message: self.message.clone(),
            result_url: None,
            updated_at: self.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// JobPatch
// ---------------------------------------------------------------------------

/// Field set written by a single store update.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPatch {
    pub status: JobStatus,
    pub message: String,
    pub updated_at: Timestamp,
    pub expires_at: Option<Timestamp>,
    pub result_url: Option<String>,
}

impl JobPatch {
    pub fn processing(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Processing,
            message: message.into(),
            updated_at: chrono::Utc::now(),
            expires_at: None,
            result_url: None,
        }
    }

    pub fn completed(result_url: impl Into<String>, expires_at: Timestamp) -> Self {
        Self {
            status: JobStatus::Completed,
            message: MSG_COMPLETED.to_string(),
            updated_at: chrono::Utc::now(),
            expires_at: Some(expires_at),
            result_url: Some(result_url.into()),
        }
    }

    pub fn failed(message: impl Into<String>, expires_at: Timestamp) -> Self {
        Self {
            status: JobStatus::Failed,
            message: message.into(),
            updated_at: chrono::Utc::now(),
            expires_at: Some(expires_at),
            result_url: None,
        }
    }
}

// ---------------------------------------------------------------------------
// JobUpdate
// ---------------------------------------------------------------------------

/// What clients see on the status endpoint and in each stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub id: JobId,
    pub status: JobStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_url: Option<String>,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Files and artifacts
// ---------------------------------------------------------------------------

/// Pointer to one staged upload, as carried in a hand-off payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReference {
    pub filename: String,
    #[serde(rename = "type")]
    pub content_type: String,
    pub storage_key: String,
}

/// Staging key for the `index`th uploaded file: `{job_id}/{index}-{filename}`.
///
/// The index keeps keys distinct when a submission repeats a filename.
pub fn blob_key(id: &JobId, index: usize, filename: &str) -> String {
    format!("{id}/{index}-{filename}")
}

/// Rendered outputs of one successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBundle {
    /// Fixed-layout rendering (PDF).
    pub pdf: Vec<u8>,
    /// Reflowable rendering (HTML).
    pub html: Vec<u8>,
}

/// Stored artifact of a completed job, retained until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRecord {
    pub id: JobId,
    pub bundle: ArtifactBundle,
    pub created_at: Timestamp,
    pub expires_at: Timestamp,
}

impl ResultRecord {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}
