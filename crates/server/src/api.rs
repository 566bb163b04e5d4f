//! The JSON query API.
//!
//! `POST /api/query` runs a query through the engine and returns the
//! rows as a JSON array. Errors come back as the structured envelope
//! with the HTTP status derived from the originating pipeline stage.

use crate::{ACTIVE_QUERIES, QUERY_COUNT, QUERY_FAILURES};
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use srql_common::models::{ErrorBody, ErrorEnvelope, QueryRequest};
use srql_error::{ErrorCategory, SrqlError};
use srql_runtime::QueryEngine;
use std::sync::Arc;

/// Response header carrying degraded-mode warnings alongside the rows.
pub const WARNING_HEADER: &str = "srql-warning";

pub fn create_api_router(engine: Arc<QueryEngine>) -> Router {
    Router::new()
        .route("/query", post(execute_query))
        .with_state(engine)
}

async fn execute_query(
    State(engine): State<Arc<QueryEngine>>,
    Json(payload): Json<QueryRequest>,
) -> Response {
    QUERY_COUNT.inc();
    ACTIVE_QUERIES.inc();
    let result = engine.execute(&payload).await;
    ACTIVE_QUERIES.dec();

    match result {
        Ok(outcome) => {
            let mut response = Json(outcome.rows).into_response();
            if !outcome.warnings.is_empty() {
                if let Ok(value) = HeaderValue::from_str(&outcome.warnings.join("; ")) {
                    response
                        .headers_mut()
                        .insert(HeaderName::from_static(WARNING_HEADER), value);
                }
            }
            response
        }
        Err(err) => {
            QUERY_FAILURES.inc();
            error_response(err)
        }
    }
}

pub fn error_response(err: SrqlError) -> Response {
    let status = status_for(err.category());
    let envelope = ErrorEnvelope {
        error: ErrorBody {
            kind: err.category().as_str().to_string(),
            code: err.code.as_str(),
            message: err.message.clone(),
            position: err.position(),
            hint: err.hint.clone(),
        },
    };
    (status, Json(envelope)).into_response()
}

fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Parse | ErrorCategory::Semantic | ErrorCategory::Planning => {
            StatusCode::BAD_REQUEST
        }
        ErrorCategory::Backend => StatusCode::BAD_GATEWAY,
        ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::Config | ErrorCategory::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
