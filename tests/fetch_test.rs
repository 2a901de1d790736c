//! Integration tests for the export API client against a mock server

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use story_export::{
    fetch_records, Config, Error, ExportClient, ExportId, FetchOptions, NoopObserver,
    RequestError, RunLog,
};
use tokio::net::TcpListener;

/// 2019-07-15T00:00:00Z
const T0: i64 = 1_563_148_800;
const HOUR: i64 = 3600;

#[derive(Default)]
struct MockExports {
    /// Hourly exports starting at `T0`
    count: i64,
    failing_id: Option<String>,
    list_status: Option<StatusCode>,
    authorizations: Mutex<Vec<String>>,
    list_starts: Mutex<Vec<i64>>,
    gets: Mutex<Vec<String>>,
}

type Shared = Arc<MockExports>;

fn record_authorization(state: &MockExports, headers: &HeaderMap) {
    let value = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state.authorizations.lock().unwrap().push(value);
}

async fn list(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record_authorization(&state, &headers);
    if let Some(status) = state.list_status {
        return (status, "denied").into_response();
    }

    let start: i64 = params
        .get("start")
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();
    state.list_starts.lock().unwrap().push(start);

    let exports: Vec<_> = (0..state.count)
        .map(|i| (i, T0 + i * HOUR))
        .filter(|(_, from)| *from >= start)
        .take(20)
        .map(|(i, from)| json!({"Id": 1000 + i, "Start": from, "Stop": from + HOUR}))
        .collect();
    Json(json!({ "exports": exports })).into_response()
}

async fn export(
    State(state): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    record_authorization(&state, &headers);
    let id = params.get("id").cloned().unwrap_or_default();
    state.gets.lock().unwrap().push(id.clone());

    if state.failing_id.as_deref() == Some(id.as_str()) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "export unavailable").into_response();
    }

    Json(json!([
        {"IndvId": 1, "EventType": "load", "ExportId": id, "PageUrl": "https://app.example.com/home"},
        {"IndvId": 1, "EventType": "click", "ExportId": id}
    ]))
    .into_response()
}

async fn serve(state: MockExports) -> (SocketAddr, Shared) {
    let state = Arc::new(state);
    let app = Router::new()
        .route("/api/v1/export/list", get(list))
        .route("/api/v1/export/get", get(export))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind mock server");
    let addr = listener.local_addr().expect("Failed to read address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Mock server failed");
    });

    (addr, state)
}

fn client_for(addr: SocketAddr) -> ExportClient {
    let config = Config {
        base_url: format!("http://{addr}/api/v1/"),
        ..Config::default()
    }
    .with_api_key("secret-key");
    ExportClient::new(&config).expect("Failed to build client")
}

#[tokio::test]
async fn test_fetch_paginates_and_sends_auth() {
    let (addr, state) = serve(MockExports {
        count: 23,
        ..MockExports::default()
    })
    .await;
    let client = client_for(addr);
    let log = RunLog::new();

    let records = fetch_records(&client, &FetchOptions::default(), T0, None, &log)
        .await
        .expect("Fetch failed");

    assert_eq!(records.len(), 46);
    assert_eq!(records[0].extra["ExportId"], json!("1000"));
    assert_eq!(records[45].extra["ExportId"], json!("1022"));

    // second page starts at the Stop of the twentieth export
    assert_eq!(*state.list_starts.lock().unwrap(), vec![T0, T0 + 20 * HOUR]);
    assert_eq!(state.gets.lock().unwrap().len(), 23);
    assert!(state
        .authorizations
        .lock()
        .unwrap()
        .iter()
        .all(|auth| auth == "Basic secret-key"));

    let stats = log.stats();
    assert_eq!(stats.pages_listed, 2);
    assert_eq!(stats.exports_fetched, 23);
    assert_eq!(stats.records_fetched, 46);
}

#[tokio::test]
async fn test_fetch_stops_past_end() {
    let (addr, state) = serve(MockExports {
        count: 60,
        ..MockExports::default()
    })
    .await;
    let client = client_for(addr);

    let records = fetch_records(
        &client,
        &FetchOptions::default(),
        T0,
        Some(T0 + 10 * HOUR),
        &NoopObserver,
    )
    .await
    .expect("Fetch failed");

    // the first page is kept whole, no second page is requested
    assert_eq!(records.len(), 40);
    assert_eq!(state.list_starts.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_listing_makes_no_body_calls() {
    let (addr, state) = serve(MockExports::default()).await;
    let client = client_for(addr);

    let records = fetch_records(&client, &FetchOptions::default(), T0, None, &NoopObserver)
        .await
        .expect("Fetch failed");

    assert!(records.is_empty());
    assert!(state.gets.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failing_export_aborts_with_id() {
    let (addr, _state) = serve(MockExports {
        count: 5,
        failing_id: Some("1003".to_string()),
        ..MockExports::default()
    })
    .await;
    let client = client_for(addr);

    let err = fetch_records(&client, &FetchOptions::default(), T0, None, &NoopObserver)
        .await
        .expect_err("Fetch should fail");

    assert!(err.is_retrieval());
    match err {
        Error::Export { id, source } => {
            assert_eq!(id, ExportId::new("1003"));
            assert_eq!(
                source,
                RequestError::Status {
                    status: 500,
                    body: "export unavailable".to_string()
                }
            );
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_unauthorized_listing_is_list_error() {
    let (addr, state) = serve(MockExports {
        count: 5,
        list_status: Some(StatusCode::UNAUTHORIZED),
        ..MockExports::default()
    })
    .await;
    let client = client_for(addr);

    let err = fetch_records(&client, &FetchOptions::default(), T0, None, &NoopObserver)
        .await
        .expect_err("Fetch should fail");

    assert!(matches!(
        err,
        Error::List {
            cursor: T0,
            source: RequestError::Status { status: 401, .. }
        }
    ));
    assert!(state.gets.lock().unwrap().is_empty());
}
