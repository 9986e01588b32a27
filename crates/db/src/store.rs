//! Persistence seams for jobs, results and staged uploads.

use async_trait::async_trait;
use futures::stream::BoxStream;
use slides_core::job::{JobPatch, JobRecord, ResultRecord};
use slides_core::types::{JobId, Timestamp};

use crate::error::{BlobError, StoreError};

/// Live sequence of job snapshots, in revision order.
///
/// The first item is the record as it stands when the watch starts. The
/// stream ends when the record is deleted; backends may also end it right
/// after yielding a terminal record.
pub type JobWatch = BoxStream<'static, JobRecord>;

/// Durable owner of job records.
#[async_trait]
pub trait JobStore: Send + Sync + 'static {
    /// Insert a new record. Fails if the id is already taken.
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError>;

    /// Apply a field update atomically and return the new record.
    ///
    /// Fails with [`StoreError::Conflict`] when the record is terminal.
    async fn update(&self, id: &JobId, patch: &JobPatch) -> Result<JobRecord, StoreError>;

    /// Raw point lookup. Expiry is not applied here.
    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, StoreError>;

    /// Remove a record. Removing an absent record is not an error.
    async fn delete(&self, id: &JobId) -> Result<(), StoreError>;

    /// Subscribe to changes of one record.
    async fn watch(&self, id: &JobId) -> Result<JobWatch, StoreError>;

    /// Remove every record whose expiry is before `now`. Returns the count.
    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError>;
}

/// Durable owner of generated artifacts.
#[async_trait]
pub trait ResultStore: Send + Sync + 'static {
    /// Store a result, replacing any previous one for the same id.
    async fn put(&self, record: ResultRecord) -> Result<(), StoreError>;

    /// Look up a result. An expired entry is removed and reported absent.
    async fn get(&self, id: &JobId) -> Result<Option<ResultRecord>, StoreError>;

    /// Whether an unexpired result exists, without loading the artifact.
    async fn exists(&self, id: &JobId) -> Result<bool, StoreError>;

    async fn delete(&self, id: &JobId) -> Result<(), StoreError>;

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError>;
}

/// Temporary storage for uploads handed to another process.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store `data` under `key` and return the key.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str)
        -> Result<String, BlobError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError>;

    async fn delete(&self, key: &str) -> Result<(), BlobError>;
}
