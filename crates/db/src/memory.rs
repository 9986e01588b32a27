//! In-process store backends.
//!
//! The job store keeps one `watch` channel per record: the channel holds
//! the current snapshot, so `watch()` is push-based and a subscriber that
//! falls behind simply sees the latest value.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use slides_core::job::{JobPatch, JobRecord, ResultRecord};
use slides_core::types::{JobId, Timestamp};
use tokio::sync::{watch, RwLock};
use tokio_stream::wrappers::WatchStream;

use crate::error::{BlobError, StoreError};
use crate::store::{BlobStore, JobStore, JobWatch, ResultStore};

const JOB: &str = "Job";

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, watch::Sender<Option<JobRecord>>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(id: &JobId) -> StoreError {
    StoreError::NotFound {
        entity: JOB,
        id: id.to_string(),
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists {
                entity: JOB,
                id: record.id.to_string(),
            });
        }
        let (tx, _rx) = watch::channel(Some(record.clone()));
        jobs.insert(record.id.clone(), tx);
        Ok(())
    }

    async fn update(&self, id: &JobId, patch: &JobPatch) -> Result<JobRecord, StoreError> {
        let jobs = self.jobs.read().await;
        let tx = jobs.get(id).ok_or_else(|| not_found(id))?;

        let mut outcome = Err(not_found(id));
        tx.send_if_modified(|slot| {
            let Some(record) = slot.as_mut() else {
                return false;
            };
            match record.apply(patch) {
                Ok(()) => {
                    outcome = Ok(record.clone());
                    true
                }
                Err(e) => {
                    outcome = Err(StoreError::Conflict(e.to_string()));
                    false
                }
            }
        });
        outcome
    }

    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        let jobs = self.jobs.read().await;
        Ok(jobs.get(id).and_then(|tx| tx.borrow().clone()))
    }

    async fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        if let Some(tx) = self.jobs.write().await.remove(id) {
            tx.send_replace(None);
        }
        Ok(())
    }

    async fn watch(&self, id: &JobId) -> Result<JobWatch, StoreError> {
        let jobs = self.jobs.read().await;
        let tx = jobs.get(id).ok_or_else(|| not_found(id))?;
        let stream = WatchStream::new(tx.subscribe())
            .take_while(|slot| futures::future::ready(slot.is_some()))
            .filter_map(futures::future::ready);
        Ok(stream.boxed())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut jobs = self.jobs.write().await;
        let expired: Vec<JobId> = jobs
            .iter()
            .filter(|(_, tx)| tx.borrow().as_ref().is_some_and(|r| r.is_expired(now)))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            if let Some(tx) = jobs.remove(id) {
                tx.send_replace(None);
            }
        }
        Ok(expired.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryResultStore {
    results: RwLock<HashMap<JobId, ResultRecord>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn put(&self, record: ResultRecord) -> Result<(), StoreError> {
        self.results.write().await.insert(record.id.clone(), record);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> Result<Option<ResultRecord>, StoreError> {
        let now = chrono::Utc::now();
        {
            let results = self.results.read().await;
            match results.get(id) {
                None => return Ok(None),
                Some(record) if !record.is_expired(now) => return Ok(Some(record.clone())),
                Some(_) => {}
            }
        }
        // A put may have replaced the expired record since the read lock
        // was released.
        let mut results = self.results.write().await;
        match results.get(id) {
            Some(record) if !record.is_expired(now) => Ok(Some(record.clone())),
            Some(_) => {
                results.remove(id);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, id: &JobId) -> Result<bool, StoreError> {
        let now = chrono::Utc::now();
        let results = self.results.read().await;
        Ok(results.get(id).is_some_and(|r| !r.is_expired(now)))
    }

    async fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        self.results.write().await.remove(id);
        Ok(())
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        let mut results = self.results.write().await;
        let before = results.len();
        results.retain(|_, r| !r.is_expired(now));
        Ok((before - results.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Blobs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BlobError> {
        self.blobs.write().await.insert(key.to_string(), data);
        Ok(key.to_string())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.blobs.write().await.remove(key);
        Ok(())
    }
}
