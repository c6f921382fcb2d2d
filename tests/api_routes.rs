//! REST routes driven through the router without binding a socket.

mod common;

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use common::{memory_repository, transfer, tx, FakeIndexer, FakeOracle, ORACLE, REPORTER};
use oracle_ledger_sync::api::router;
use oracle_ledger_sync::app_state::AppState;
use oracle_ledger_sync::feed;
use oracle_ledger_sync::registry;
use oracle_ledger_sync::sync::SyncEngine;

async fn app() -> Router {
    let repo = memory_repository().await;
    let oracle = Arc::new(FakeOracle::at(200));
    let feed = feed::channel();
    let (handle, _task) = registry::spawn(Arc::new(repo.clone()), oracle.clone(), Some(feed.clone()))
        .await
        .expect("registry");

    let indexer = FakeIndexer::new(
        vec![tx(105), tx(120)],
        vec![transfer(120, ORACLE, "2")],
    );
    let store = Arc::new(repo.clone());
    let engine = SyncEngine::new(
        Arc::new(indexer),
        oracle.clone(),
        store.clone(),
        store,
        common::settings(100),
    )
    .with_registry(handle.clone())
    .with_feed(feed.clone());

    let state = AppState::new(repo, Arc::new(engine), handle, oracle, feed);
    router(state, 10_000, &["*".to_string()])
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            request = request.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(request.body(body).expect("request"))
        .await
        .expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_sync_then_read_ledger() {
    let app = app().await;

    let (status, report) = call(&app, Method::POST, &format!("/api/v1/sync/{REPORTER}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["cursor_after"], 121);
    assert_eq!(report["transactions"], 2);

    let (status, ledger) = call(&app, Method::GET, &format!("/api/v1/ledger/{REPORTER}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ledger["records"].as_array().map(Vec::len), Some(2));
    assert_eq!(ledger["records"][0]["block_number"], 120);
    assert_eq!(ledger["summary"]["total_reward"], 2.0);

    let (status, recent) = call(&app, Method::GET, "/api/v1/earnings/recent?limit=5", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recent["records"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_invalid_address_is_bad_request() {
    let app = app().await;

    let (status, body) = call(&app, Method::POST, "/api/v1/sync/0x1234", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = call(&app, Method::GET, "/api/v1/ledger/nope", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reporter_update_and_listing() {
    let app = app().await;

    let (status, entry) = call(
        &app,
        Method::PUT,
        &format!("/api/v1/reporters/{REPORTER}"),
        Some(serde_json::json!({ "is_working": false, "label": "node-1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["is_working"], false);
    assert_eq!(entry["label"], "node-1");

    let (status, listing) = call(&app, Method::GET, "/api/v1/reporters", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["reporters"][REPORTER]["label"], "node-1");
    assert!(listing["now"].is_i64());
    // Not a listed staker
    assert!(listing["reporters"][REPORTER]["stake"].is_null());
    assert!(listing["reporters"][REPORTER]["cooldown_secs"].is_null());
    assert_eq!(listing["reporters"][REPORTER]["eligible"], false);

    let (status, _) = call(
        &app,
        Method::PUT,
        &format!("/api/v1/reporters/{REPORTER}"),
        Some(serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_and_market() {
    let app = app().await;

    let (status, health) = call(&app, Method::GET, "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["head_block"], 200);

    let (status, market) = call(&app, Method::GET, "/api/v1/market", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(market["prices"]["eth_usd"], 2_000.0);
    assert_eq!(market["gas_price_gwei"], 20.0);
    assert_eq!(market["last_submission"], 1_699_999_000);
    assert!(market["available_reward"].as_f64().is_some_and(|trb| trb > 0.0));
    assert!(market["estimated_earning"].is_f64());
}

#[tokio::test]
async fn test_openapi_served() {
    let app = app().await;

    let (status, doc) = call(&app, Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/sync/{address}"].is_object());
}
