//! HTTP catalog client tests against a mock server.

use srql_catalog::{builtin_snapshot, CatalogService, HttpCatalogService};
use srql_error::ErrorCode;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_fetch_parses_catalog_document() {
    let server = MockServer::start().await;
    let mut snapshot = builtin_snapshot();
    snapshot.version = 7;

    Mock::given(method("GET"))
        .and(path("/catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&snapshot))
        .mount(&server)
        .await;

    let service = HttpCatalogService::new(format!("{}/catalog", server.uri()));
    let fetched = service.fetch().await.unwrap();
    assert_eq!(fetched.version, 7);
    assert!(fetched.entity("metrics").is_some());
}

#[tokio::test]
async fn test_fetch_maps_http_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let service = HttpCatalogService::new(format!("{}/catalog", server.uri()));
    let err = service.fetch().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CatalogUnavailable);
}

#[tokio::test]
async fn test_fetch_rejects_malformed_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/catalog"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"nope\": true}"))
        .mount(&server)
        .await;

    let service = HttpCatalogService::new(format!("{}/catalog", server.uri()));
    let err = service.fetch().await.unwrap_err();
    assert_eq!(err.code, ErrorCode::CatalogUnavailable);
    assert!(err.hint.is_some());
}
