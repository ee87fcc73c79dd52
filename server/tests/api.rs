//! Router-level integration tests via `tower::ServiceExt::oneshot`, per
//! SPEC_FULL.md's test-tooling section — no real TCP listener, the whole
//! `Router` built by `dispatch_server::build_router` exercised in-process.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use dispatch_core::{DispatchConfig, DispatchService};
use dispatch_server::{build_router, AppState};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> axum::Router {
    let mut cfg = DispatchConfig::default();
    cfg.disable_budget_checks = true;
    build_router(AppState::new(DispatchService::new(cfg)))
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, session: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-session-id", session)
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn create_multipart_task(app: &axum::Router, session: &str, items: &Value) -> Value {
    let boundary = "X-BOUNDARY-1";
    let items_json = items.to_string();
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"name\"\r\n\r\njob-1\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"costPerBucket\"\r\n\r\n2\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"maxBillableBuckets\"\r\n\r\n5\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"data\"; filename=\"items.json\"\r\n\
         Content-Type: application/json\r\n\r\n{items_json}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"code\"; filename=\"archive.zip\"\r\n\
         Content-Type: application/octet-stream\r\n\r\nfake-archive-bytes\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/api/tasks")
        .header("content-type", format!("multipart/form-data; boundary={boundary}"))
        .header("x-session-id", session)
        .body(Body::from(body))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    json_body(response).await
}

#[tokio::test]
async fn me_creates_a_session_scoped_user_on_first_touch() {
    let app = app();
    let request = Request::builder()
        .uri("/api/me")
        .header("x-session-id", "alice")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["user"]["id"], "alice");
    assert_eq!(body["walletTransactionsTotal"], 0);
}

#[tokio::test]
async fn wallet_deposit_is_forbidden_outside_sandbox_mode() {
    let app = app();
    let request = json_request("POST", "/api/wallet/deposit", "alice", json!({ "amount": "10" }));
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn create_task_then_list_round_trips_through_the_router() {
    let app = app();
    let items = json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    let created = create_multipart_task(&app, "customer", &items).await;
    let task_id = created["task"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["task"]["status"], "queued");

    let request = Request::builder().uri("/api/tasks").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let tasks = body["tasks"].as_array().unwrap();
    assert!(tasks.iter().any(|t| t["id"] == task_id));
}

#[tokio::test]
async fn claim_then_next_chunk_then_record_chunk_issues_a_payout() {
    let app = app();
    let items = json!([1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    let created = create_multipart_task(&app, "customer", &items).await;
    let task_id = created["task"]["id"].as_str().unwrap().to_string();

    // Settlement needs the customer's wallet entity to exist; `/api/me` is
    // what lazily creates it (dev-mode seeded user), matching how a real
    // customer session would have touched the wallet before uploading a task.
    let me_request = Request::builder().uri("/api/me").header("x-session-id", "customer").body(Body::empty()).unwrap();
    app.clone().oneshot(me_request).await.unwrap();

    let claim_request = Request::builder()
        .method("POST")
        .uri(format!("/api/tasks/{task_id}/claim"))
        .header("x-session-id", "worker-1")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(claim_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let claimed = json_body(response).await;
    assert_eq!(claimed["task"]["status"], "processing");

    let next_chunk_request = json_request(
        "POST",
        "/api/worker/next-chunk",
        "worker-1",
        json!({ "taskId": task_id, "workerId": "worker-1" }),
    );
    let response = app.clone().oneshot(next_chunk_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let granted = json_body(response).await;
    assert_eq!(granted["ok"], true);
    let bucket_index = granted["bucketIndex"].as_u64().unwrap();
    let range_start = granted["rangeStart"].as_u64().unwrap();
    let range_end = granted["rangeEnd"].as_u64().unwrap();

    let record_chunk_request = json_request(
        "POST",
        "/api/worker/record-chunk",
        "worker-1",
        json!({
            "taskId": task_id,
            "bucketIndex": bucket_index,
            "workerId": "worker-1",
            "status": "completed",
            "range": { "start": range_start, "end": range_end },
            "itemResults": [],
        }),
    );
    let response = app.clone().oneshot(record_chunk_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let recorded = json_body(response).await;
    assert_eq!(recorded["ok"], true);
    // Budget checks are disabled in this test's config, so the customer's
    // zero seeded balance doesn't block the grant; settlement still debits
    // it (into the negative) since settlement has no balance precondition
    // of its own, only the allocator's (disabled) pre-grant check does.
    assert!(recorded.get("payout").is_some());

    let results_request = Request::builder()
        .uri(format!("/api/tasks/{task_id}/results"))
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(results_request).await.unwrap();
    let body = json_body(response).await;
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["status"], "completed");
    assert_eq!(results[0]["payoutIssued"], true);
}

#[tokio::test]
async fn revoke_declines_next_chunk_with_the_wire_reason() {
    let app = app();
    let items = json!([1, 2]);
    let created = create_multipart_task(&app, "customer", &items).await;
    let task_id = created["task"]["id"].as_str().unwrap().to_string();

    let claim_request = Request::builder()
        .method("POST")
        .uri(format!("/api/tasks/{task_id}/claim"))
        .header("x-session-id", "worker-1")
        .body(Body::empty())
        .unwrap();
    app.clone().oneshot(claim_request).await.unwrap();

    let revoke_request = Request::builder()
        .method("POST")
        .uri(format!("/api/tasks/{task_id}/revoke"))
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(revoke_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let next_chunk_request = json_request(
        "POST",
        "/api/worker/next-chunk",
        "worker-1",
        json!({ "taskId": task_id, "workerId": "worker-1" }),
    );
    let response = app.oneshot(next_chunk_request).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["ok"], false);
    assert_eq!(body["message"], "revoked");
}

#[tokio::test]
async fn heartbeat_then_online_reports_liveness() {
    let app = app();
    let heartbeat_request = json_request("POST", "/api/worker/heartbeat", "worker-1", json!({ "workerId": "worker-1" }));
    let response = app.clone().oneshot(heartbeat_request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let online_request = Request::builder().uri("/api/worker/online/worker-1").body(Body::empty()).unwrap();
    let response = app.oneshot(online_request).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["online"], true);
    assert!(body["ageMs"].as_i64().unwrap() >= 0);
}

#[tokio::test]
async fn deleting_an_unknown_task_is_not_found() {
    let app = app();
    let request = Request::builder()
        .method("DELETE")
        .uri("/api/tasks/does-not-exist")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
