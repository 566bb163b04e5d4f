//! Handler tests driven through `tower::ServiceExt::oneshot`.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use srql_backends::memory::{MemoryGraphStore, MemoryTimeSeriesStore};
use srql_backends::{GraphStore, TimeSeriesStore};
use srql_catalog::SharedCatalog;
use srql_common::config::AppConfig;
use srql_common::models::{ErrorEnvelope, Row, Value};
use srql_runtime::QueryEngine;
use srql_server::api::create_api_router;
use std::sync::Arc;
use tower::ServiceExt;

fn test_router(ts: &Arc<MemoryTimeSeriesStore>) -> axum::Router {
    let graph = Arc::new(MemoryGraphStore::new());
    let engine = Arc::new(QueryEngine::new(
        SharedCatalog::with_builtin(),
        Arc::clone(ts) as Arc<dyn TimeSeriesStore>,
        graph as Arc<dyn GraphStore>,
        &AppConfig::default(),
    ));
    create_api_router(engine)
}

fn query_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/query")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_query_returns_rows_as_a_json_array() {
    let ts = Arc::new(MemoryTimeSeriesStore::new());
    ts.push_rows(vec![Row::from_pairs(vec![
        ("device_id".to_string(), Value::Str("d1".to_string())),
        ("value".to_string(), Value::Float(42.5)),
    ])]);
    let app = test_router(&ts);

    let response = app
        .oneshot(query_request(
            r#"{"query": "STREAM metrics WHERE metric_name = 'cpu'"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let rows: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(rows, serde_json::json!([{"device_id": "d1", "value": 42.5}]));
}

#[tokio::test]
async fn test_semantic_error_is_a_400_with_envelope() {
    let ts = Arc::new(MemoryTimeSeriesStore::new());
    let app = test_router(&ts);

    let response = app
        .oneshot(query_request(
            r#"{"query": "STREAM metrics WHERE bogus_field = 1"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope.error.kind, "semantic");
    assert_eq!(envelope.error.code, "SRQL-2002");
    assert!(envelope.error.message.contains("bogus_field"));
}

#[tokio::test]
async fn test_backend_failure_is_a_502() {
    let ts = Arc::new(MemoryTimeSeriesStore::new());
    // Both the first attempt and the retry fail.
    ts.push_error(srql_error::ErrorCode::StoreUnavailable, "connection refused");
    ts.push_error(srql_error::ErrorCode::StoreUnavailable, "connection refused");
    let app = test_router(&ts);

    let response = app
        .oneshot(query_request(
            r#"{"query": "STREAM metrics WHERE metric_name = 'cpu'"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope.error.kind, "backend");
    assert_eq!(envelope.error.code, "SRQL-4001");
}

#[tokio::test]
async fn test_parse_error_carries_a_position() {
    let ts = Arc::new(MemoryTimeSeriesStore::new());
    let app = test_router(&ts);

    let response = app
        .oneshot(query_request(r#"{"query": "STREAM metrics WHERE"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(envelope.error.kind, "parse");
    assert!(envelope.error.position.is_some());
}
