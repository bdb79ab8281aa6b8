//! HTTP routes, driven in-process through the router.

mod common;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{init_tracing, test_config};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;
use transfer_service::startup::{AppState, router};
use transfer_service::store::InMemoryLedgerStore;

fn app() -> Router {
    init_tracing();
    let state = AppState::new(test_config(), Arc::new(InMemoryLedgerStore::new()))
        .expect("Failed to build app state");
    router(state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, body)
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn create_account(app: &Router, number: &str, balance: &str) -> Value {
    let (status, body) = send(
        app,
        post(
            "/api/accounts",
            json!({ "account_number": number, "initial_balance": balance }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body
}

#[tokio::test]
async fn health_endpoints_respond() {
    let app = app();

    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "transfer-service-test");

    let (status, body) = send(&app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn account_crud_round_trip() {
    let app = app();

    let created = create_account(&app, "ACC-001", "100.00").await;
    assert_eq!(created["account_number"], "ACC-001");
    assert_eq!(created["balance"], "100.00");
    let id = created["id"].as_i64().unwrap();

    let (status, fetched) = send(&app, get(&format!("/api/accounts/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let (status, listed) = send(&app, get("/api/accounts")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, entries) = send(&app, get(&format!("/api/accounts/{}/transactions", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entries[0]["kind"], "deposit");
    assert_eq!(entries[0]["reference"], format!("INIT-{}", id));
}

#[tokio::test]
async fn initial_balance_is_optional() {
    let app = app();

    let (status, body) = send(
        &app,
        post("/api/accounts", json!({ "account_number": "ACC-001" })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["balance"], "0.00");
}

#[tokio::test]
async fn duplicate_account_is_a_conflict() {
    let app = app();
    create_account(&app, "ACC-001", "0").await;

    let (status, body) = send(
        &app,
        post("/api/accounts", json!({ "account_number": "ACC-001" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "duplicate_account_number");
}

#[tokio::test]
async fn transfer_round_trip() {
    let app = app();
    create_account(&app, "A", "100").await;
    create_account(&app, "B", "0").await;

    let (status, transfer) = send(
        &app,
        post(
            "/api/transfers",
            json!({
                "from_account_number": "A",
                "to_account_number": "B",
                "amount": "40",
                "description": "rent"
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", transfer);
    assert_eq!(transfer["amount"], "40.00");
    assert_eq!(transfer["description"], "rent");
    assert_eq!(transfer["from_account"]["balance"], "60.00");
    assert_eq!(transfer["to_account"]["balance"], "40.00");
    assert_eq!(transfer["entries"].as_array().unwrap().len(), 2);

    let id = transfer["id"].as_i64().unwrap();
    assert_eq!(transfer["reference"], format!("TRF-{}", id));

    let (status, found) = send(&app, get(&format!("/api/transfers/{}", id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["reference"], transfer["reference"]);
    assert_eq!(found["entries"], transfer["entries"]);
}

#[tokio::test]
async fn transfer_failures_map_to_statuses() {
    let app = app();
    create_account(&app, "A", "10").await;
    create_account(&app, "B", "0").await;

    let cases = [
        (json!({"from_account_number": "A", "to_account_number": "B", "amount": "40"}),
            StatusCode::UNPROCESSABLE_ENTITY, "insufficient_funds"),
        (json!({"from_account_number": "A", "to_account_number": "A", "amount": "1"}),
            StatusCode::BAD_REQUEST, "same_account"),
        (json!({"from_account_number": "A", "to_account_number": "nobody", "amount": "1"}),
            StatusCode::NOT_FOUND, "account_not_found"),
        (json!({"from_account_number": "A", "to_account_number": "B", "amount": "-5"}),
            StatusCode::BAD_REQUEST, "invalid_amount"),
        (json!({"from_account_number": "A", "to_account_number": "B", "amount": 0}),
            StatusCode::BAD_REQUEST, "invalid_amount"),
    ];

    for (payload, expected_status, expected_kind) in cases {
        let (status, body) = send(&app, post("/api/transfers", payload)).await;
        assert_eq!(status, expected_status, "{}", body);
        assert_eq!(body["kind"], expected_kind);
        assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    }
}

#[tokio::test]
async fn deposits_and_withdrawals() {
    let app = app();
    let account = create_account(&app, "A", "10").await;
    let id = account["id"].as_i64().unwrap();

    let (status, entry) = send(
        &app,
        post(
            &format!("/api/accounts/{}/deposits", id),
            json!({ "amount": "5.25", "description": "top up" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["kind"], "deposit");
    assert_eq!(entry["amount"], "5.25");

    let (status, entry) = send(
        &app,
        post(
            &format!("/api/accounts/{}/withdrawals", id),
            json!({ "amount": "15.25" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(entry["amount"], "-15.25");
    assert_eq!(entry["description"], "Withdrawal");

    let (status, body) = send(
        &app,
        post(
            &format!("/api/accounts/{}/withdrawals", id),
            json!({ "amount": "0.01" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "insufficient_funds");
}

#[tokio::test]
async fn unknown_resources_are_not_found() {
    let app = app();

    let (status, body) = send(&app, get("/api/accounts/77")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");

    let (status, _) = send(&app, get("/api/accounts/77/transactions")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/api/transfers/77")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn malformed_requests_are_rejected_by_extractors() {
    let app = app();

    let (status, _) = send(&app, get("/api/accounts/not-a-number")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, post("/api/transfers", json!({ "amount": "1" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn request_id_is_propagated() {
    let app = app();

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "req-123");

    let response = app.clone().oneshot(get("/health")).await.unwrap();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn metrics_reflect_traffic() {
    let app = app();
    create_account(&app, "A", "100").await;
    create_account(&app, "B", "0").await;
    send(
        &app,
        post(
            "/api/transfers",
            json!({"from_account_number": "A", "to_account_number": "B", "amount": "40"}),
        ),
    )
    .await;

    let (status, body) = send(&app, get("/metrics")).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("ledger_transfers_total{status=\"success\"} 1"));
    assert!(text.contains("ledger_accounts_created_total 2"));
    assert!(text.contains("ledger_account_balance{account_number=\"A\"} 60"));
    assert!(text.contains("path=\"/api/transfers\""));
}

#[tokio::test]
async fn unrouted_paths_share_one_metrics_label() {
    let app = app();

    let (status, _) = send(&app, get("/wp-admin/setup.php")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&app, get("/metrics")).await;
    let text = body.as_str().unwrap();
    assert!(text.contains("path=\"unmatched\",status=\"404\""));
    assert!(!text.contains("wp-admin"));
}
