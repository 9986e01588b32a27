#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slides_core::job::{ArtifactBundle, JobPatch, JobRecord, JobStatus};
use slides_core::progress::ProgressSink;
use slides_core::settings::{SlideRequest, SlideSettings, Theme};
use slides_core::types::{JobId, Timestamp};
use slides_core::upload::UploadedFile;
use slides_db::memory::MemoryJobStore;
use slides_db::{JobStore, JobWatch, StoreError};
use slides_generator::{ArtifactGenerator, GenerateError};
use slides_pipeline::{EnqueueError, GenerationTask, SubmittedFile, TaskQueue};
use tokio::sync::Semaphore;

pub fn request(theme: &str) -> SlideRequest {
    SlideRequest::parse(&format!(
        r#"{{"theme":"{theme}","settings":{{"slideDetail":"minimal","audience":"general"}}}}"#
    ))
    .unwrap()
}

pub fn md_file() -> Vec<SubmittedFile> {
    vec![SubmittedFile {
        filename: "notes.md".into(),
        data: b"# Notes\n\n- one\n- two".to_vec(),
    }]
}

/// Poll the store until the job satisfies `pred`.
pub async fn wait_for(
    store: &dyn JobStore,
    id: &JobId,
    pred: impl Fn(&JobRecord) -> bool,
) -> JobRecord {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if let Some(record) = store.get(id).await.unwrap() {
                if pred(&record) {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not reach expected state in time")
}

pub async fn wait_terminal(store: &dyn JobStore, id: &JobId) -> JobRecord {
    wait_for(store, id, |r| r.status.is_terminal()).await
}

// ---------------------------------------------------------------------------
// Generators
// ---------------------------------------------------------------------------

pub enum Outcome {
    Succeed,
    Fail(fn() -> GenerateError),
    Panic,
}

/// Reports two phases, then blocks until the test opens the gate.
pub struct GatedGenerator {
    pub gate: Arc<Semaphore>,
    pub outcome: Outcome,
    pub calls: Mutex<Vec<(Theme, Vec<UploadedFile>)>>,
}

impl GatedGenerator {
    pub fn new(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            gate: Arc::new(Semaphore::new(0)),
            outcome,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// A generator that never waits.
    pub fn open(outcome: Outcome) -> Arc<Self> {
        let generator = Self::new(outcome);
        generator.gate.add_permits(1_000);
        generator
    }

    pub fn release(&self, n: usize) {
        self.gate.add_permits(n);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ArtifactGenerator for GatedGenerator {
    async fn generate(
        &self,
        theme: Theme,
        files: &[UploadedFile],
        _settings: &SlideSettings,
        progress: &dyn ProgressSink,
    ) -> Result<ArtifactBundle, GenerateError> {
        self.calls.lock().unwrap().push((theme, files.to_vec()));
        progress.report("Analyzing uploaded files");
        progress.report("Generating content for slides");

        let permit = self.gate.acquire().await.unwrap();
        permit.forget();

        match &self.outcome {
            Outcome::Succeed => Ok(ArtifactBundle {
                pdf: b"%PDF-1.7 slides".to_vec(),
                html: b"<html>slides</html>".to_vec(),
            }),
            Outcome::Fail(make) => Err(make()),
            Outcome::Panic => panic!("generator blew up"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stores and queues
// ---------------------------------------------------------------------------

/// Memory store whose completion writes always fail.
#[derive(Default)]
pub struct RejectCompletionStore {
    inner: MemoryJobStore,
}

#[async_trait]
impl JobStore for RejectCompletionStore {
    async fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.inner.create(record).await
    }

    async fn update(&self, id: &JobId, patch: &JobPatch) -> Result<JobRecord, StoreError> {
        if patch.status == JobStatus::Completed {
            return Err(StoreError::Corrupt("simulated write failure".into()));
        }
        self.inner.update(id, patch).await
    }

    async fn get(&self, id: &JobId) -> Result<Option<JobRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        self.inner.delete(id).await
    }

    async fn watch(&self, id: &JobId) -> Result<JobWatch, StoreError> {
        self.inner.watch(id).await
    }

    async fn delete_expired(&self, now: Timestamp) -> Result<u64, StoreError> {
        self.inner.delete_expired(now).await
    }
}

/// Queue that records tasks and answers with a fixed verdict.
pub struct RecordingQueue {
    pub busy: bool,
    pub tasks: Mutex<Vec<GenerationTask>>,
}

impl RecordingQueue {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            busy: false,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn busy() -> Arc<Self> {
        Arc::new(Self {
            busy: true,
            tasks: Mutex::new(Vec::new()),
        })
    }

    pub fn last(&self) -> Option<GenerationTask> {
        self.tasks.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl TaskQueue for RecordingQueue {
    async fn enqueue(&self, task: &GenerationTask) -> Result<(), EnqueueError> {
        self.tasks.lock().unwrap().push(task.clone());
        if self.busy {
            Err(EnqueueError::Busy)
        } else {
            Ok(())
        }
    }
}
