//! PostgreSQL store backends.
//!
//! Postgres has no change feed we rely on, so `watch()` polls the row at a
//! fixed interval and yields only snapshots with a higher revision than the
//! last one seen.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use slides_core::job::{ArtifactBundle, JobPatch, JobRecord, JobStatus, ResultRecord};
use slides_core::types::{JobId, Timestamp};
use sqlx::PgPool;

use crate::error::StoreError;
use crate::store::{JobStore, JobWatch, ResultStore};

/// Column list for `slide_jobs` queries.
const JOB_COLUMNS: &str =
    "id, status, message, created_at, updated_at, expires_at, result_url, revision";

/// Column list for `slide_results` queries.
const RESULT_COLUMNS: &str = "id, pdf, html, created_at, expires_at";

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    status: String,
    message: String,
    created_at: Timestamp,
    updated_at: Timestamp,
    expires_at: Option<Timestamp>,
    result_url: Option<String>,
    revision: i64,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = StoreError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status =
            JobStatus::from_name(&row.status).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(JobRecord {
            id: JobId::from(row.id),
            status,
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
            expires_at: row.expires_at,
            result_url: row.result_url,
            revision: row.revision.max(0) as u64,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ResultRow {
    id: String,
    pdf: Vec<u8>,
    html: Vec<u8>,
    created_at: Timestamp,
    expires_at: Timestamp,
}

impl From<ResultRow> for ResultRecord {
    fn from(row: ResultRow) -> Self {
        ResultRecord {
            id: JobId::from(row.id),
            bundle: ArtifactBundle {
                pdf: row.pdf,
                html: row.html,
            },
            created_at: row.created_at,
            expires_at: row.expires_at,
        }
    }
}

async fn fetch_job(pool: &PgPool, id: &JobId) -> Result<Option<JobRecord>, StoreError> {
    let query = format!("SELECT {JOB_COLUMNS} FROM slide_jobs WHERE id = $1");
    let row = sqlx::query_as::<_, JobRow>(&query)
        .bind(id.as_str())
        .fetch_optional(pool)
        .await?;
    row.map(JobRecord::try_from).transpose()
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

pub struct PgJobStore {
    pool: PgPool,
    poll_interval: Duration,
}

impl PgJobStore {
    pub fn new(pool: PgPool, poll_interval: Duration) -> Self {
        Self {
            pool,
            poll_interval,
        }
    }
}

struct PollState {
    pool: PgPool,
    id: JobId,
    interval: Duration,
    last_revision: u64,
    first: bool,
    finished: bool,
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO slide_jobs \
             (id, status, message, created_at, updated_at, expires_at, result_url, revision) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(record.id.as_str())
        .bind(record.status.as_str())
        .bind(&record.message)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.expires_at)
        .bind(&record.result_url)
        .bind(record.revision as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AlreadyExists {
                entity: "Job",
                id: record.id.to_string(),
            });
        }
        Ok(())
    }

    async fn update(&self, id: &JobId, patch: &JobPatch) -> Result<JobRecord, StoreError> {
        let query = format!(
            "UPDATE slide_jobs \
             SET status = $2, message = $3, updated_at = $4, \
                 expires_at = COALESCE($5, expires_at), \
                 result_url = COALESCE($6, result_url), \
                 revision = revision + 1 \
             WHERE id = $1 AND status NOT IN ('completed', 'failed') \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id.as_str())
            .bind(patch.status.as_str())
            .bind(&patch.message)
            .bind(patch.updated_at)
            .bind(patch.expires_at)
            .bind(&patch.result_url)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => row.try_into(),
            None => match fetch_job(&self.pool, id).await? {
                Some(current) => Err(StoreError::Conflict(format!(
                    "job {id} is already {}",
                    current.status
                ))),
                None => Err(StoreError::NotFound {
                    entity: "Job",
                    id: id.to_string(),
                }),
            },
        }
    }

    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        fetch_job(&self.pool, id).await
    }

    async fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM slide_jobs WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn watch(&self, id: &JobId) -> Result<JobWatch, StoreError> {
        if fetch_job(&self.pool, id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            });
        }

        let state = PollState {
            pool: self.pool.clone(),
            id: id.clone(),
            interval: self.poll_interval,
            last_revision: 0,
            first: true,
            finished: false,
        };

        let stream = futures::stream::unfold(state, |mut st| async move {
            loop {
                if st.finished {
                    return None;
                }
                if !st.first {
                    tokio::time::sleep(st.interval).await;
                }
                st.first = false;

                match fetch_job(&st.pool, &st.id).await {
                    Ok(None) => return None,
                    Ok(Some(record)) if record.revision > st.last_revision => {
                        st.last_revision = record.revision;
                        st.finished = record.status.is_terminal();
                        return Some((record, st));
                    }
                    Ok(Some(_)) => {}
                    Err(e) => {
                        tracing::warn!(job_id = %st.id, error = %e, "Job watch poll failed");
                    }
                }
            }
        });
        Ok(stream.boxed())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let result =
            sqlx::query("DELETE FROM slide_jobs WHERE expires_at IS NOT NULL AND expires_at < $1")
                .bind(now)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn put(&self, record: ResultRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO slide_results (id, pdf, html, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                 pdf = EXCLUDED.pdf, html = EXCLUDED.html, \
                 created_at = EXCLUDED.created_at, expires_at = EXCLUDED.expires_at",
        )
        .bind(record.id.as_str())
        .bind(&record.bundle.pdf)
        .bind(&record.bundle.html)
        .bind(record.created_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<ResultRecord>, StoreError> {
        let query = format!("SELECT {RESULT_COLUMNS} FROM slide_results WHERE id = $1");
        let Some(row) = sqlx::query_as::<_, ResultRow>(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?
        else {
            return Ok(None);
        };

        let record = ResultRecord::from(row);
        if record.is_expired(chrono::Utc::now()) {
            self.delete(id).await?;
            return Ok(None);
        }
        Ok(Some(record))
    }

    async fn exists(&self, id: &JobId) -> Result<bool, StoreError> {
        let found: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM slide_results WHERE id = $1 AND expires_at >= NOW())",
        )
        .bind(id.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(found)
    }

    async fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM slide_results WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM slide_results WHERE expires_at < $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
