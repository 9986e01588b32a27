//! Periodic removal of expired job and result records.
//!
//! Reads already treat expired records as absent, so this only reclaims
//! space. Runs on a fixed interval using `tokio::time::interval`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use slides_db::{JobStore, ResultStore};
use tokio_util::sync::CancellationToken;

/// Counts removed by one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub jobs: u64,
    pub results: u64,
}

/// Run the sweep loop until `cancel` is triggered.
pub async fn run(
    jobs: Arc<dyn JobStore>,
    results: Arc<dyn ResultStore>,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(interval_secs = interval.as_secs(), "Expiry sweep started");

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Expiry sweep stopping");
                break;
            }
            _ = ticker.tick() => {
                let stats = sweep_once(jobs.as_ref(), results.as_ref()).await;
                if stats.jobs > 0 || stats.results > 0 {
                    tracing::info!(jobs = stats.jobs, results = stats.results, "Expiry sweep: purged records");
                } else {
                    tracing::debug!("Expiry sweep: nothing to purge");
                }
            }
        }
    }
}

/// Delete everything that has expired as of now. Failures are logged.
pub async fn sweep_once(jobs: &dyn JobStore, results: &dyn ResultStore) -> SweepStats {
    let now = Utc::now();
    let mut stats = SweepStats::default();

    match jobs.delete_expired(now).await {
        Ok(deleted) => stats.jobs = deleted,
        Err(e) => tracing::error!(error = %e, "Expiry sweep: job cleanup failed"),
    }
    match results.delete_expired(now).await {
        Ok(deleted) => stats.results = deleted,
        Err(e) => tracing::error!(error = %e, "Expiry sweep: result cleanup failed"),
    }
    stats
}

#[cfg(test)]
mod tests {
    use chrono::Duration as ChronoDuration;
    use slides_core::job::{ArtifactBundle, JobPatch, JobRecord, ResultRecord};
    use slides_core::types::JobId;
    use slides_db::memory::{MemoryJobStore, MemoryResultStore};

    use super::*;

    #[tokio::test]
    async fn removes_only_expired_records() {
        let jobs = MemoryJobStore::new();
        let results = MemoryResultStore::new();
        let now = Utc::now();

        for (id, offset) in [("old", -10), ("fresh", 300)] {
            let id = JobId::from(id);
            jobs.create(&JobRecord::queued(id.clone(), now)).await.unwrap();
            jobs.update(&id, &JobPatch::failed("x", now + ChronoDuration::seconds(offset)))
                .await
                .unwrap();
            results
                .put(ResultRecord {
                    id: id.clone(),
                    bundle: ArtifactBundle {
                        pdf: vec![1],
                        html: vec![2],
                    },
                    created_at: now,
                    expires_at: now + ChronoDuration::seconds(offset),
                })
                .await
                .unwrap();
        }
        let queued = JobId::from("queued");
        jobs.create(&JobRecord::queued(queued.clone(), now)).await.unwrap();

        let stats = sweep_once(&jobs, &results).await;
        assert_eq!(stats, SweepStats { jobs: 1, results: 1 });

        assert!(jobs.get(&JobId::from("old")).await.unwrap().is_none());
        assert!(jobs.get(&JobId::from("fresh")).await.unwrap().is_some());
        assert!(jobs.get(&queued).await.unwrap().is_some());
        assert!(results.exists(&JobId::from("fresh")).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel() {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::new(MemoryJobStore::new()),
            Arc::new(MemoryResultStore::new()),
            Duration::from_secs(60),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_secs(125)).await;
        cancel.cancel();
        handle.await.unwrap();
    }
}
