//! ClickHouse session store against a real server.
//!
//! Requires Docker (or `REINDEX_TEST_CLICKHOUSE_URL`); run with
//! `cargo test -p integration-tests -- --ignored`.

use chrono::Utc;
use engine_core::{split_into_jobs, EventType, IndexingSession, IndexingStatus};
use integration_tests::containers::TestClickHouse;
use reindex_store::{ClickHouseClient, ClickHouseSessionStore, SessionFilter, SessionStore};
use std::sync::Arc;
use std::time::Duration;

async fn store() -> (TestClickHouse, ClickHouseSessionStore) {
    let ch = TestClickHouse::start().await;
    let client = Arc::new(ClickHouseClient::new(ch.config.clone()).expect("client"));
    client.ensure_schema().await.expect("schema");
    client
        .inner()
        .query("TRUNCATE TABLE IF EXISTS indexing_sessions")
        .execute()
        .await
        .expect("truncate");
    (ch, ClickHouseSessionStore::new(client))
}

fn session(start: i64, end: i64) -> IndexingSession {
    IndexingSession::new(
        start,
        end,
        vec![EventType::SwapEvents, EventType::LiquidityEvents],
        split_into_jobs(start, end),
        Utc::now(),
    )
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_session_lifecycle_roundtrip() {
    let (_ch, store) = store().await;
    assert!(store.ping().await);

    let created = store
        .create(session(1_000_000, 1_000_000 + 8 * 86_400))
        .await
        .unwrap();
    assert_eq!(created.version, 1);

    let active = store
        .find_one(&SessionFilter::active())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(active.name, created.name);
    assert_eq!(active.jobs, created.jobs);
    assert_eq!(active.event_types, created.event_types);

    let by_id = store
        .find_one(&SessionFilter::by_key(created.id.to_string()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_id.name, created.name);

    let mut next = created.clone();
    next.status = IndexingStatus::InProgress;
    next.jobs[0].status = IndexingStatus::Completed;
    let updated = store
        .find_one_and_update(&SessionFilter::revision_of(&created), &next)
        .await
        .unwrap();
    assert_eq!(updated.version, 2);

    let stored = store
        .find_one(&SessionFilter::by_key(created.name.clone()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.status, IndexingStatus::InProgress);
    assert_eq!(stored.jobs[0].status, IndexingStatus::Completed);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_stale_write_and_conflict() {
    let (_ch, store) = store().await;

    let created = store.create(session(10, 20)).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let err = store.create(session(10, 20)).await.unwrap_err();
    assert!(err.is_conflict());

    let mut next = created.clone();
    next.status = IndexingStatus::InProgress;
    store
        .find_one_and_update(&SessionFilter::revision_of(&created), &next)
        .await
        .unwrap();

    // Writing from the outdated revision again is rejected
    let err = store
        .find_one_and_update(&SessionFilter::revision_of(&created), &next)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), Some("SESSION_004"));

    let listed = store.list(10).await.unwrap();
    assert_eq!(listed.len(), 1);
}
