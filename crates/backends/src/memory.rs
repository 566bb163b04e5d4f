//! In-memory recording stores for tests.
//!
//! These capture every executed statement and replay canned responses
//! in order, so tests can assert on the generated statements and on
//! merge behavior without a live store.

use crate::{GraphStatement, GraphStore, TimeSeriesStore, TsStatement, DEFAULT_MAX_DEPTH};
use async_trait::async_trait;
use srql_common::models::{BackendRecord, Row};
use srql_error::{ErrorCode, Result, SrqlError};
use std::collections::VecDeque;
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryTimeSeriesStore {
    executed: Mutex<Vec<TsStatement>>,
    responses: Mutex<VecDeque<Result<Vec<Row>>>>,
}

impl MemoryTimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_rows(&self, rows: Vec<Row>) {
        self.lock_responses().push_back(Ok(rows));
    }

    pub fn push_error(&self, code: ErrorCode, message: &str) {
        self.lock_responses()
            .push_back(Err(SrqlError::new(code, message)));
    }

    pub fn executed(&self) -> Vec<TsStatement> {
        match self.executed.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<Vec<Row>>>> {
        match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl TimeSeriesStore for MemoryTimeSeriesStore {
    async fn query(&self, statement: &TsStatement) -> Result<Vec<Row>> {
        match self.executed.lock() {
            Ok(mut guard) => guard.push(statement.clone()),
            Err(poisoned) => poisoned.into_inner().push(statement.clone()),
        }
        // With no canned response queued, return an empty result set.
        self.lock_responses().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Default)]
pub struct MemoryGraphStore {
    executed: Mutex<Vec<GraphStatement>>,
    responses: Mutex<VecDeque<Result<Vec<BackendRecord>>>>,
    max_depth: Option<u32>,
}

impl MemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = Some(max_depth);
        self
    }

    pub fn push_records(&self, records: Vec<BackendRecord>) {
        self.lock_responses().push_back(Ok(records));
    }

    pub fn push_error(&self, code: ErrorCode, message: &str) {
        self.lock_responses()
            .push_back(Err(SrqlError::new(code, message)));
    }

    pub fn executed(&self) -> Vec<GraphStatement> {
        match self.executed.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn lock_responses(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<Vec<BackendRecord>>>> {
        match self.responses.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl GraphStore for MemoryGraphStore {
    async fn query(&self, statement: &GraphStatement) -> Result<Vec<BackendRecord>> {
        match self.executed.lock() {
            Ok(mut guard) => guard.push(statement.clone()),
            Err(poisoned) => poisoned.into_inner().push(statement.clone()),
        }
        self.lock_responses().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    fn max_depth(&self) -> u32 {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srql_common::models::Value;

    #[tokio::test]
    async fn test_replays_responses_in_order() {
        let store = MemoryTimeSeriesStore::new();
        store.push_rows(vec![Row::from_pairs(vec![(
            "device_id".into(),
            Value::Str("d1".into()),
        )])]);
        store.push_error(ErrorCode::StoreUnavailable, "connection refused");

        let statement = TsStatement::new("SELECT 1", Vec::new());
        assert_eq!(store.query(&statement).await.unwrap().len(), 1);
        assert_eq!(
            store.query(&statement).await.unwrap_err().code,
            ErrorCode::StoreUnavailable
        );
        // Queue exhausted: empty result, not an error.
        assert!(store.query(&statement).await.unwrap().is_empty());
        assert_eq!(store.executed().len(), 3);
    }
}
