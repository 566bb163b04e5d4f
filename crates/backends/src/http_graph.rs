//! Thin HTTP graph-store client.
//!
//! Speaks a small JSON protocol: `POST <base>/query` with the statement
//! text and bind variables, answered by a `results` array. Items that
//! carry `vertices`/`edges` arrays decode as paths; everything else is a
//! plain row.

use crate::{GraphStatement, GraphStore, DEFAULT_MAX_DEPTH};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use srql_common::models::{BackendRecord, GraphPath, Row};
use srql_error::{ErrorCode, ErrorContext, Result, SrqlError};
use std::collections::BTreeMap;

pub struct HttpGraphStore {
    client: reqwest::Client,
    base_url: String,
    max_depth: u32,
}

#[derive(Serialize)]
struct QueryEnvelope<'a> {
    query: &'a str,
    #[serde(rename = "bindVars")]
    bind_vars: &'a BTreeMap<String, srql_common::models::Value>,
}

#[derive(Deserialize)]
struct ResultEnvelope {
    results: Vec<serde_json::Value>,
}

impl HttpGraphStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpGraphStore {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Override the advertised traversal depth bound.
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    fn decode_record(item: &serde_json::Value) -> Result<BackendRecord> {
        let obj = item.as_object().ok_or_else(|| {
            malformed(format!("expected a JSON object, got {item}"))
        })?;

        if obj.contains_key("vertices") && obj.contains_key("edges") {
            let vertices = decode_row_array(obj.get("vertices"))?;
            let edges = decode_row_array(obj.get("edges"))?;
            return Ok(BackendRecord::Path(GraphPath { vertices, edges }));
        }
        Ok(BackendRecord::Row(Row::from_json_object(obj)))
    }
}

fn decode_row_array(value: Option<&serde_json::Value>) -> Result<Vec<Row>> {
    let items = value
        .and_then(|v| v.as_array())
        .ok_or_else(|| malformed("path vertices/edges must be arrays".to_string()))?;
    items
        .iter()
        .map(|item| {
            item.as_object()
                .map(Row::from_json_object)
                .ok_or_else(|| malformed(format!("path element is not an object: {item}")))
        })
        .collect()
}

#[async_trait]
impl GraphStore for HttpGraphStore {
    async fn query(&self, statement: &GraphStatement) -> Result<Vec<BackendRecord>> {
        let url = format!("{}/query", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&QueryEnvelope {
                query: &statement.text,
                bind_vars: &statement.bind_vars,
            })
            .send()
            .await
            .map_err(|e| {
                SrqlError::new(
                    ErrorCode::StoreUnavailable,
                    format!("Graph store unavailable: {e}"),
                )
                .with_context(ErrorContext::Backend {
                    backend: "graph".to_string(),
                    detail: e.to_string(),
                })
            })?;

        let status = response.status();
        if status.is_client_error() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SrqlError::new(
                ErrorCode::StatementRejected,
                format!("Graph store rejected the statement ({status}): {detail}"),
            )
            .with_context(ErrorContext::Backend {
                backend: "graph".to_string(),
                detail,
            }));
        }
        if !status.is_success() {
            return Err(SrqlError::new(
                ErrorCode::StoreUnavailable,
                format!("Graph store returned {status}"),
            ));
        }

        let envelope: ResultEnvelope = response
            .json()
            .await
            .map_err(|e| malformed(format!("invalid response body: {e}")))?;

        envelope.results.iter().map(Self::decode_record).collect()
    }

    fn max_depth(&self) -> u32 {
        self.max_depth
    }
}

fn malformed(detail: String) -> SrqlError {
    SrqlError::new(
        ErrorCode::MalformedResult,
        format!("Graph store response malformed: {detail}"),
    )
    .with_context(ErrorContext::Backend {
        backend: "graph".to_string(),
        detail,
    })
}
