//! Live status stream for one job.
//!
//! Emits the current snapshot, then one `Update` per newer revision, a
//! `Ping` after each idle heartbeat interval, and finally a `Close` right
//! after the terminal update. A job that is already terminal yields its
//! snapshot and `Close` only.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::json;
use slides_core::job::{JobRecord, JobStatus, JobUpdate};
use slides_core::job_events::{CLOSE_MESSAGE, EVENT_CLOSE, EVENT_PING, EVENT_UPDATE};
use slides_core::types::JobId;
use tokio::time::Instant;

use crate::fanout::Subscription;
use crate::status::JobStatusService;

/// Default idle interval before a keep-alive frame.
pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(30);

pub type StatusStream = BoxStream<'static, StreamEvent>;

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Update(JobUpdate),
    Ping,
    Close { id: JobId, status: JobStatus },
}

impl StreamEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::Update(_) => EVENT_UPDATE,
            StreamEvent::Ping => EVENT_PING,
            StreamEvent::Close { .. } => EVENT_CLOSE,
        }
    }

    /// SSE data payload. Pings carry none.
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            StreamEvent::Update(update) => serde_json::to_value(update).ok(),
            StreamEvent::Ping => None,
            StreamEvent::Close { id, status } => Some(json!({
                "id": id,
                "status": status,
                "message": CLOSE_MESSAGE,
            })),
        }
    }
}

enum Wake {
    Feed(Option<JobRecord>),
    Idle,
}

struct StreamState {
    service: Arc<JobStatusService>,
    subscription: Option<Subscription>,
    job_id: JobId,
    last_revision: u64,
    heartbeat: Duration,
    deadline: Instant,
    pending: VecDeque<StreamEvent>,
    finished: bool,
}

impl StreamState {
    /// Queue an update for `record` if it is newer than anything sent.
    /// Returns true when the stream should end.
    async fn push_record(&mut self, record: JobRecord) -> bool {
        if record.revision <= self.last_revision {
            return false;
        }
        self.last_revision = record.revision;
        self.deadline = Instant::now() + self.heartbeat;

        let status = record.status;
        let update = self.service.project(&record).await;
        self.pending.push_back(StreamEvent::Update(update));
        if status.is_terminal() {
            self.pending.push_back(StreamEvent::Close {
                id: record.id,
                status,
            });
            return true;
        }
        false
    }

    /// The feed stopped before we saw a terminal update: read the store
    /// once so a terminal transition is never missed.
    async fn reconcile(&mut self) {
        match self.service.lookup(&self.job_id).await {
            Ok(record) => {
                self.push_record(record).await;
            }
            Err(e) => {
                tracing::debug!(job_id = %self.job_id, error = %e, "Job gone while streaming");
            }
        }
    }
}

/// Build the stream from an already-fetched snapshot and a live
/// subscription (absent when the snapshot is terminal).
pub(crate) async fn status_stream(
    service: Arc<JobStatusService>,
    snapshot: JobRecord,
    subscription: Option<Subscription>,
    heartbeat: Duration,
) -> StatusStream {
    let mut state = StreamState {
        service,
        job_id: snapshot.id.clone(),
        subscription,
        last_revision: 0,
        heartbeat,
        deadline: Instant::now() + heartbeat,
        pending: VecDeque::new(),
        finished: false,
    };
    state.finished = state.push_record(snapshot).await;
    if state.finished {
        state.subscription = None;
    }

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.pending.pop_front() {
                return Some((event, st));
            }
            if st.finished {
                return None;
            }
            let wake = {
                let Some(subscription) = st.subscription.as_mut() else {
                    return None;
                };
                let deadline = st.deadline;
                tokio::select! {
                    next = subscription.recv() => Wake::Feed(next),
                    _ = tokio::time::sleep_until(deadline) => Wake::Idle,
                }
            };

            match wake {
                Wake::Feed(Some(record)) => {
                    if st.push_record(record).await {
                        st.finished = true;
                        st.subscription = None;
                    }
                }
                Wake::Feed(None) => {
                    st.subscription = None;
                    st.finished = true;
                    st.reconcile().await;
                }
                Wake::Idle => {
                    st.deadline = Instant::now() + st.heartbeat;
                    st.pending.push_back(StreamEvent::Ping);
                }
            }
        }
    })
    .boxed()
}
