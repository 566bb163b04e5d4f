//! HTTP graph client tests against a mock server.

use serde_json::json;
use srql_backends::http_graph::HttpGraphStore;
use srql_backends::{GraphStatement, GraphStore};
use srql_common::models::{BackendRecord, Value};
use srql_error::ErrorCode;
use std::collections::BTreeMap;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn statement(text: &str) -> GraphStatement {
    let mut bind_vars = BTreeMap::new();
    bind_vars.insert("p1".to_string(), Value::Str("dc-east".to_string()));
    GraphStatement::new(text, bind_vars)
}

#[tokio::test]
async fn test_rows_decoded_in_document_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .and(body_partial_json(json!({"bindVars": {"p1": "dc-east"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                {"id": "d1", "hostname": "sw-01", "up": true},
                {"id": "d2", "hostname": "sw-02", "up": false}
            ]
        })))
        .mount(&server)
        .await;

    let store = HttpGraphStore::new(server.uri());
    let records = store
        .query(&statement("FOR doc IN devices RETURN doc"))
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    match &records[0] {
        BackendRecord::Row(row) => {
            assert_eq!(row.get("hostname"), Some(&Value::Str("sw-01".into())));
            assert_eq!(row.get("up"), Some(&Value::Bool(true)));
        }
        other => panic!("expected a row, got {other:?}"),
    }
}

#[tokio::test]
async fn test_paths_decoded_from_vertex_edge_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{
                "vertices": [{"id": "d1"}, {"id": "d2"}, {"id": "d3"}],
                "edges": [{"link_type": "fiber"}, {"link_type": "copper"}]
            }]
        })))
        .mount(&server)
        .await;

    let store = HttpGraphStore::new(server.uri());
    let records = store.query(&statement("...")).await.unwrap();

    match &records[0] {
        BackendRecord::Path(path) => {
            assert_eq!(path.vertices.len(), 3);
            assert_eq!(path.hop_count(), 2);
        }
        other => panic!("expected a path, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_maps_to_statement_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(400).set_body_string("syntax error near FOR"))
        .mount(&server)
        .await;

    let store = HttpGraphStore::new(server.uri());
    let err = store.query(&statement("...")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::StatementRejected);
    assert!(!err.code.is_retryable());
}

#[tokio::test]
async fn test_server_error_maps_to_store_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let store = HttpGraphStore::new(server.uri());
    let err = store.query(&statement("...")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::StoreUnavailable);
    assert!(err.code.is_retryable());
}

#[tokio::test]
async fn test_malformed_body_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/query"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let store = HttpGraphStore::new(server.uri());
    let err = store.query(&statement("...")).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::MalformedResult);
}
