//! Tests for the session admin endpoints.

use axum::http::StatusCode;
use axum_test::TestServer;
use engine_core::IndexingStatus;
use integration_tests::{fixtures, setup::TestContext};
use std::time::Duration;
use worker::TickOutcome;

fn server(ctx: &TestContext) -> TestServer {
    TestServer::new(ctx.router.clone()).expect("Failed to create test server")
}

fn eight_day_body() -> serde_json::Value {
    fixtures::create_body(
        fixtures::START,
        fixtures::START + 8 * fixtures::DAY,
        &["SWAP_EVENTS"],
    )
}

#[tokio::test]
async fn test_create_session() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server.post("/indexing-sessions").json(&eight_day_body()).await;
    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "PENDING");
    assert!(body["name"]
        .as_str()
        .unwrap()
        .starts_with("indexing-session-"));
    assert_eq!(body["eventTypes"], serde_json::json!(["SWAP_EVENTS"]));

    let jobs = body["jobs"].as_array().unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0]["startTimestamp"], fixtures::START);
    assert_eq!(jobs[0]["endTimestamp"], fixtures::START + fixtures::WEEK);
    assert_eq!(jobs[1]["startTimestamp"], fixtures::START + fixtures::WEEK + 1);
    assert_eq!(jobs[1]["order"], 1);
    assert_eq!(jobs[1]["status"], "PENDING");
}

#[tokio::test]
async fn test_create_conflicts_while_active() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    server
        .post("/indexing-sessions")
        .json(&eight_day_body())
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.post("/indexing-sessions").json(&eight_day_body()).await;
    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "SESSION_001");
    assert_eq!(ctx.store.len(), 1);
}

#[tokio::test]
async fn test_create_rejects_invalid_requests() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let invalid = [
        fixtures::create_body(500, 500, &["SWAP_EVENTS"]),
        fixtures::create_body(500, 100, &["SWAP_EVENTS"]),
        fixtures::create_body(0, 100, &["SWAP_EVENTS"]),
        fixtures::create_body(1, 100, &[]),
        fixtures::create_body(1, 100, &["MINT_EVENTS"]),
        serde_json::json!({ "eventTypes": ["SWAP_EVENTS"] }),
    ];

    for body in invalid {
        let response = server.post("/indexing-sessions").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["code"], "VALID_001", "body: {}", body);
    }
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_create_rejects_end_in_the_future() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let now = chrono::Utc::now().timestamp();

    // Unix seconds overflow, then a millisecond timestamp
    for end in [i64::MAX, now * 1_000] {
        let response = server
            .post("/indexing-sessions")
            .json(&fixtures::create_body(1, end, &["SWAP_EVENTS"]))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let error: serde_json::Value = response.json();
        assert_eq!(error["code"], "VALID_001", "end: {}", end);
    }
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_create_defaults_end_to_now() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let now = chrono::Utc::now().timestamp();

    let response = server
        .post("/indexing-sessions")
        .json(&serde_json::json!({
            "start": now - fixtures::DAY,
            "eventTypes": ["BURN_EVENTS", "SWAP_EVENTS"],
        }))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: serde_json::Value = response.json();
    let end = body["endTimestamp"].as_i64().unwrap();
    assert!(end >= now && end <= now + 5);
    assert_eq!(
        body["eventTypes"],
        serde_json::json!(["SWAP_EVENTS", "BURN_EVENTS"])
    );
}

#[tokio::test]
async fn test_get_by_name_and_id() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let created = ctx.create_session(fixtures::one_job_window()).await;

    for key in [created.name.clone(), created.id.to_string()] {
        let response = server.get(&format!("/indexing-sessions/{}", key)).await;
        response.assert_status_ok();
        let body: serde_json::Value = response.json();
        assert_eq!(body["name"], created.name.as_str());
    }

    let response = server.get("/indexing-sessions/indexing-session-0").await;
    response.assert_status(StatusCode::NOT_FOUND);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "SESSION_003");
}

#[tokio::test]
async fn test_list_newest_first() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let first = ctx.create_session(fixtures::one_job_window()).await;
    ctx.scheduler.tick().await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = ctx.create_session(fixtures::one_job_window()).await;

    let response = server.get("/indexing-sessions").await;
    response.assert_status_ok();
    let body: Vec<serde_json::Value> = response.json();
    assert_eq!(body.len(), 2);
    assert_eq!(body[0]["name"], second.name.as_str());
    assert_eq!(body[1]["name"], first.name.as_str());
    assert_eq!(body[1]["status"], "COMPLETED");

    let response = server.get("/indexing-sessions?limit=1").await;
    let body: Vec<serde_json::Value> = response.json();
    assert_eq!(body.len(), 1);
    assert_eq!(body[0]["name"], second.name.as_str());
}

#[tokio::test]
async fn test_abort_flow() {
    let ctx = TestContext::new();
    let server = server(&ctx);
    let created = ctx.create_session(fixtures::eight_day_window()).await;

    let response = server
        .post(&format!("/indexing-sessions/{}/abort", created.id))
        .await;
    response.assert_status(StatusCode::ACCEPTED);
    let body: serde_json::Value = response.json();
    assert_eq!(body["name"], created.name.as_str());
    assert_eq!(body["abortRequested"], true);
    assert!(ctx.abort.is_requested(&created.name).await);

    // Applied on the next tick
    assert_eq!(ctx.scheduler.tick().await, TickOutcome::Aborted);
    assert_eq!(
        ctx.session(&created.name).await.status,
        IndexingStatus::Aborted
    );
    assert_eq!(ctx.indexer.call_count(), 0);

    let response = server
        .post(&format!("/indexing-sessions/{}/abort", created.name))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    let body: serde_json::Value = response.json();
    assert_eq!(body["code"], "SESSION_002");
}

#[tokio::test]
async fn test_abort_unknown_session() {
    let ctx = TestContext::new();
    let server = server(&ctx);

    let response = server.post("/indexing-sessions/missing/abort").await;
    response.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_token_required_when_configured() {
    let ctx = TestContext::with_admin_token("s3cret");
    let server = server(&ctx);

    let response = server.post("/indexing-sessions").json(&eight_day_body()).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .get("/indexing-sessions")
        .add_header("Authorization", "Bearer wrong")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/indexing-sessions")
        .add_header("Authorization", "Bearer s3cret")
        .json(&eight_day_body())
        .await;
    response.assert_status(StatusCode::CREATED);

    // Health probes stay open
    server.get("/health/live").await.assert_status_ok();
}
