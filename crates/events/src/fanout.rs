//! Per-job fan-out of store changes to many subscribers.
//!
//! The first subscriber to a job starts one pump task that consumes the
//! store's `watch()` for that job. Each subscriber owns a bounded queue;
//! the pump delivers with `try_send`, so a subscriber that stops reading
//! only loses updates itself and never stalls the pump. The registry lock
//! is held just long enough to add, remove or enumerate subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use slides_core::job::JobRecord;
use slides_core::types::JobId;
use slides_db::{JobStore, JobWatch, StoreError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default per-subscriber queue length.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 16;

type Registry = Arc<Mutex<HashMap<JobId, Feed>>>;

struct Feed {
    /// Distinguishes this feed from a later one for the same job.
    generation: u64,
    subscribers: HashMap<u64, mpsc::Sender<JobRecord>>,
    cancel: CancellationToken,
}

fn lock(registry: &Registry) -> std::sync::MutexGuard<'_, HashMap<JobId, Feed>> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct JobFanout {
    jobs: Arc<dyn JobStore>,
    buffer: usize,
    feeds: Registry,
    next_key: AtomicU64,
}

impl JobFanout {
    pub fn new(jobs: Arc<dyn JobStore>, buffer: usize) -> Self {
        Self {
            jobs,
            buffer: buffer.max(1),
            feeds: Arc::new(Mutex::new(HashMap::new())),
            next_key: AtomicU64::new(1),
        }
    }

    /// Register a subscriber for `id`, starting the job's pump if needed.
    ///
    /// Fails if the job is unknown to the store.
    pub async fn subscribe(&self, id: &JobId) -> Result<Subscription, StoreError> {
        let watch = self.jobs.watch(id).await?;
        let (tx, rx) = mpsc::channel(self.buffer);
        let key = self.next_key.fetch_add(1, Ordering::Relaxed);

        let start = {
            let mut feeds = lock(&self.feeds);
            match feeds.get_mut(id) {
                Some(feed) => {
                    feed.subscribers.insert(key, tx);
                    None
                }
                None => {
                    let cancel = CancellationToken::new();
                    feeds.insert(
                        id.clone(),
                        Feed {
                            generation: key,
                            subscribers: HashMap::from([(key, tx)]),
                            cancel: cancel.clone(),
                        },
                    );
                    Some(cancel)
                }
            }
        };

        if let Some(cancel) = start {
            tracing::debug!(job_id = %id, "Starting job feed");
            tokio::spawn(pump(
                Arc::clone(&self.feeds),
                id.clone(),
                key,
                watch,
                cancel,
            ));
        }

        Ok(Subscription {
            job_id: id.clone(),
            key,
            rx,
            feeds: Arc::clone(&self.feeds),
        })
    }

    /// Number of live subscribers for `id`.
    pub fn subscriber_count(&self, id: &JobId) -> usize {
        lock(&self.feeds)
            .get(id)
            .map_or(0, |feed| feed.subscribers.len())
    }

    /// Number of jobs with a running pump.
    pub fn active_feeds(&self) -> usize {
        lock(&self.feeds).len()
    }
}

/// Forward store changes to every subscriber until the job is terminal,
/// the record disappears, or the last subscriber leaves.
async fn pump(
    feeds: Registry,
    job_id: JobId,
    generation: u64,
    mut watch: JobWatch,
    cancel: CancellationToken,
) {
    loop {
        let record = tokio::select! {
            _ = cancel.cancelled() => break,
            next = watch.next() => match next {
                Some(record) => record,
                None => break,
            },
        };
        let terminal = record.status.is_terminal();
        deliver(&feeds, &job_id, generation, record);
        if terminal {
            break;
        }
    }

    // Dropping the senders closes every subscriber's queue.
    let mut feeds = lock(&feeds);
    if feeds
        .get(&job_id)
        .is_some_and(|feed| feed.generation == generation)
    {
        feeds.remove(&job_id);
    }
    tracing::debug!(job_id = %job_id, "Job feed stopped");
}

fn deliver(feeds: &Registry, job_id: &JobId, generation: u64, record: JobRecord) {
    let mut feeds = lock(feeds);
    let Some(feed) = feeds
        .get_mut(job_id)
        .filter(|feed| feed.generation == generation)
    else {
        return;
    };
    feed.subscribers.retain(|key, tx| match tx.try_send(record.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::debug!(job_id = %job_id, subscriber = key, revision = record.revision, "Subscriber lagging, update dropped");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

/// One subscriber's view of a job feed. Dropping it unsubscribes.
pub struct Subscription {
    job_id: JobId,
    key: u64,
    rx: mpsc::Receiver<JobRecord>,
    feeds: Registry,
}

impl Subscription {
    /// Next delivered snapshot; `None` once the feed has stopped.
    pub async fn recv(&mut self) -> Option<JobRecord> {
        self.rx.recv().await
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut feeds = lock(&self.feeds);
        let Some(feed) = feeds.get_mut(&self.job_id) else {
            return;
        };
        feed.subscribers.remove(&self.key);
        if feed.subscribers.is_empty() {
            feed.cancel.cancel();
            feeds.remove(&self.job_id);
        }
    }
}
