//! # srql-backends
//!
//! Store collaborator traits and the statement types the code generators
//! emit. The engine only ever talks to stores through these traits; the
//! concrete clients here are deliberately thin.

pub mod http_graph;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use srql_common::models::{BackendRecord, Row, Value};
use srql_error::Result;
use std::collections::BTreeMap;

/// Default traversal depth bound when neither the query nor the store
/// declares one.
pub const DEFAULT_MAX_DEPTH: u32 = 6;

/// A parameterized time-series statement. Literals are always carried in
/// `params`, never interpolated into `sql`.
#[derive(Debug, Clone, PartialEq)]
pub struct TsStatement {
    pub sql: String,
    pub params: Vec<Value>,
    /// Index into `params` of the correlating-key array. The planner
    /// leaves an empty list there; the executor fills it per batch.
    pub key_slot: Option<usize>,
}

impl TsStatement {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        TsStatement {
            sql: sql.into(),
            params,
            key_slot: None,
        }
    }

    /// The same statement with the key-slot parameter bound to `keys`.
    pub fn with_keys(&self, keys: Vec<String>) -> TsStatement {
        let mut bound = self.clone();
        if let Some(slot) = bound.key_slot {
            if let Some(param) = bound.params.get_mut(slot) {
                *param = Value::StrList(keys);
            }
        }
        bound
    }
}

/// A graph query with named bind variables.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStatement {
    pub text: String,
    pub bind_vars: BTreeMap<String, Value>,
}

impl GraphStatement {
    pub fn new(text: impl Into<String>, bind_vars: BTreeMap<String, Value>) -> Self {
        GraphStatement {
            text: text.into(),
            bind_vars,
        }
    }
}

#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    async fn query(&self, statement: &TsStatement) -> Result<Vec<Row>>;
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn query(&self, statement: &GraphStatement) -> Result<Vec<BackendRecord>>;

    /// Deepest traversal this store will execute.
    fn max_depth(&self) -> u32 {
        DEFAULT_MAX_DEPTH
    }
}
