//! Postgres backend tests. Require `DATABASE_URL`; run with `--ignored`.

use std::time::Duration;

use assert_matches::assert_matches;
use chrono::Utc;
use futures::StreamExt;
use slides_core::job::{ArtifactBundle, JobPatch, JobRecord, JobStatus, ResultRecord};
use slides_core::types::JobId;
use slides_db::postgres::{PgJobStore, PgResultStore};
use slides_db::{JobStore, ResultStore, StoreError};
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn job_lifecycle_round_trip(pool: PgPool) {
    let store = PgJobStore::new(pool, Duration::from_millis(20));
    let id = JobId::generate();
    store
        .create(&JobRecord::queued(id.clone(), Utc::now()))
        .await
        .unwrap();

    let updated = store
        .update(&id, &JobPatch::processing("Processing slides"))
        .await
        .unwrap();
    assert_eq!(updated.status, JobStatus::Processing);
    assert_eq!(updated.revision, 2);

    let done = store
        .update(
            &id,
            &JobPatch::completed(format!("/results/{id}"), Utc::now()),
        )
        .await
        .unwrap();
    assert!(done.expires_at.is_some());

    assert_matches!(
        store.update(&id, &JobPatch::processing("late")).await,
        Err(StoreError::Conflict(_))
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn watch_polls_until_terminal(pool: PgPool) {
    let store = PgJobStore::new(pool, Duration::from_millis(20));
    let id = JobId::generate();
    store
        .create(&JobRecord::queued(id.clone(), Utc::now()))
        .await
        .unwrap();

    let mut watch = store.watch(&id).await.unwrap();
    assert_eq!(watch.next().await.unwrap().status, JobStatus::Queued);

    store
        .update(&id, &JobPatch::failed("boom", Utc::now()))
        .await
        .unwrap();
    assert_eq!(watch.next().await.unwrap().status, JobStatus::Failed);
    assert!(watch.next().await.is_none());
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn result_put_is_upsert(pool: PgPool) {
    let store = PgResultStore::new(pool);
    let id = JobId::generate();
    let record = |pdf: &[u8]| ResultRecord {
        id: id.clone(),
        bundle: ArtifactBundle {
            pdf: pdf.to_vec(),
            html: b"<html>".to_vec(),
        },
        created_at: Utc::now(),
        expires_at: Utc::now() + chrono::Duration::hours(1),
    };

    store.put(record(b"one")).await.unwrap();
    store.put(record(b"two")).await.unwrap();
    let got = store.get(&id).await.unwrap().unwrap();
    assert_eq!(got.bundle.pdf, b"two");
}
