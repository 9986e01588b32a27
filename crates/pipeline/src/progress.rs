//! Ordered progress writes.
//!
//! The generator reports phases through a synchronous [`ProgressSink`].
//! Messages are queued on an unbounded channel and applied to the job
//! store by a single writer task, so they land in call order and the
//! generator never waits on the store. The dispatcher drains the writer
//! before issuing the terminal write.

use std::sync::Arc;

use slides_core::job::JobPatch;
use slides_core::progress::ProgressSink;
use slides_core::types::JobId;
use slides_db::JobStore;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Sink half handed to the generator.
pub struct StoreProgress {
    job_id: JobId,
    tx: mpsc::UnboundedSender<String>,
}

impl ProgressSink for StoreProgress {
    fn report(&self, message: &str) {
        if self.tx.send(message.to_string()).is_err() {
            tracing::warn!(job_id = %self.job_id, update = message, "Progress writer closed, dropping update");
        }
    }
}

/// Writer half; await [`ProgressWriter::finish`] after dropping the sink.
pub struct ProgressWriter {
    handle: JoinHandle<usize>,
}

impl ProgressWriter {
    /// Wait until every queued message has been written. Returns the
    /// number of successful writes.
    pub async fn finish(self) -> usize {
        match self.handle.await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(error = %e, "Progress writer task failed");
                0
            }
        }
    }
}

/// Start a writer for one job.
pub fn spawn_progress_writer(
    jobs: Arc<dyn JobStore>,
    job_id: JobId,
) -> (StoreProgress, ProgressWriter) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let writer_id = job_id.clone();

    let handle = tokio::spawn(async move {
        let mut written = 0;
        while let Some(message) = rx.recv().await {
            match jobs.update(&writer_id, &JobPatch::processing(&message)).await {
                Ok(_) => written += 1,
                Err(e) => {
                    tracing::warn!(
                        job_id = %writer_id,
                        update = %message,
                        error = %e,
                        "Failed to write progress update",
                    );
                }
            }
        }
        written
    });

    (StoreProgress { job_id, tx }, ProgressWriter { handle })
}
