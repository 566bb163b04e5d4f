//! Plan execution against the store collaborators.
//!
//! Single-step plans run one statement and flatten its records. Join
//! plans run the key-producing step, extract and dedupe the correlating
//! keys, feed them to the key-consuming step in cap-sized batches, and
//! hand both row sets to the merger.

use crate::merge::{flatten_records, merge_rows};
use srql_backends::{GraphStore, TimeSeriesStore};
use srql_common::config::RetrySettings;
use srql_common::models::{BackendRecord, Row};
use srql_common::retry::retry_async;
use srql_error::{ErrorCode, Result, SrqlError};
use srql_query::{ExecutionPlan, GraphStep, PlanStep, TimeSeriesStep};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::warn;

/// Per-request knobs the engine resolves before execution.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Maximum correlating keys bound to a single statement. Larger key
    /// sets are executed in batches of this size, never rejected.
    pub key_cap: usize,
    /// Return accumulated rows with a warning when a batch fails.
    pub degraded: bool,
    /// Bound on path hop columns when flattening traversal results.
    pub max_hops: u32,
}

/// Rows plus any degradation warnings accumulated along the way.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOutcome {
    pub rows: Vec<Row>,
    pub warnings: Vec<String>,
}

pub struct Executor {
    timeseries: Arc<dyn TimeSeriesStore>,
    graph: Arc<dyn GraphStore>,
    retry: RetrySettings,
}

impl Executor {
    pub fn new(
        timeseries: Arc<dyn TimeSeriesStore>,
        graph: Arc<dyn GraphStore>,
        retry: RetrySettings,
    ) -> Self {
        Executor {
            timeseries,
            graph,
            retry,
        }
    }

    pub async fn execute(
        &self,
        plan: &ExecutionPlan,
        options: &ExecutionOptions,
    ) -> Result<ExecutionOutcome> {
        if plan.is_single_step() {
            let rows = self.run_step(&plan.steps[0], None, options).await?;
            return Ok(ExecutionOutcome {
                rows,
                warnings: Vec::new(),
            });
        }
        self.execute_join(plan, options).await
    }

    async fn execute_join(
        &self,
        plan: &ExecutionPlan,
        options: &ExecutionOptions,
    ) -> Result<ExecutionOutcome> {
        let [producer, consumer, PlanStep::Merge(merge)] = plan.steps.as_slice() else {
            return Err(SrqlError::new(
                ErrorCode::Internal,
                format!("malformed plan: {} steps", plan.steps.len()),
            ));
        };

        let first_rows = self.run_step(producer, None, options).await?;
        let keys = extract_keys(&first_rows, step_key_field(producer)?);
        if keys.is_empty() {
            return Ok(ExecutionOutcome::default());
        }

        let key_cap = options.key_cap.max(1);
        let mut warnings = Vec::new();
        if keys.len() > key_cap {
            let batches = keys.len().div_ceil(key_cap);
            warn!(
                target: "queries",
                keys = keys.len(),
                cap = key_cap,
                batches,
                "key set exceeds cap, executing in batches"
            );
            warnings.push(format!(
                "{} correlating keys exceed the cap of {}; executed in {} batches",
                keys.len(),
                key_cap,
                batches
            ));
        }

        let mut second_rows = Vec::new();
        for batch in keys.chunks(key_cap) {
            match self.run_step(consumer, Some(batch.to_vec()), options).await {
                Ok(rows) => second_rows.extend(rows),
                Err(err) if options.degraded => {
                    warn!(
                        target: "queries",
                        error = %err,
                        "batch failed, returning partial results"
                    );
                    warnings.push(format!("partial results: a key batch failed: {err}"));
                    break;
                }
                Err(err) => return Err(err),
            }
        }

        let rows = merge_rows(first_rows, second_rows, merge);
        Ok(ExecutionOutcome { rows, warnings })
    }

    async fn run_step(
        &self,
        step: &PlanStep,
        keys: Option<Vec<String>>,
        options: &ExecutionOptions,
    ) -> Result<Vec<Row>> {
        match step {
            PlanStep::Graph(graph) => self.run_graph(graph, keys, options).await,
            PlanStep::TimeSeries(ts) => self.run_timeseries(ts, keys).await,
            PlanStep::Merge(_) => Err(SrqlError::new(
                ErrorCode::Internal,
                "merge step has no statement to run",
            )),
        }
    }

    async fn run_graph(
        &self,
        step: &GraphStep,
        keys: Option<Vec<String>>,
        options: &ExecutionOptions,
    ) -> Result<Vec<Row>> {
        let mut statement = step.statement.clone();
        if let (Some(slot), Some(keys)) = (&step.key_slot, keys) {
            statement
                .bind_vars
                .insert(slot.clone(), srql_common::models::Value::StrList(keys));
        }
        let records: Vec<BackendRecord> = retry_async(
            "graph_query",
            self.retry.clone(),
            |err: &SrqlError| err.code.is_retryable(),
            || self.graph.query(&statement),
        )
        .await?;
        let hop_bound = options.max_hops.min(self.graph.max_depth());
        Ok(flatten_records(records, hop_bound))
    }

    async fn run_timeseries(
        &self,
        step: &TimeSeriesStep,
        keys: Option<Vec<String>>,
    ) -> Result<Vec<Row>> {
        let statement = match keys {
            Some(keys) => step.statement.with_keys(keys),
            None => step.statement.clone(),
        };
        retry_async(
            "timeseries_query",
            self.retry.clone(),
            |err: &SrqlError| err.code.is_retryable(),
            || self.timeseries.query(&statement),
        )
        .await
    }
}

fn step_key_field(step: &PlanStep) -> Result<&str> {
    let field = match step {
        PlanStep::Graph(g) => g.key_field.as_deref(),
        PlanStep::TimeSeries(t) => t.key_field.as_deref(),
        PlanStep::Merge(_) => None,
    };
    field.ok_or_else(|| {
        SrqlError::new(
            ErrorCode::Internal,
            "key-producing step is missing its key field",
        )
    })
}

/// Distinct key values in first-seen order.
fn extract_keys(rows: &[Row], key_field: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keys = Vec::new();
    for row in rows {
        if let Some(value) = row.get(key_field) {
            let key = value.render();
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
    }
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use srql_common::models::Value;

    #[test]
    fn test_extract_keys_dedupes_in_order() {
        let rows: Vec<Row> = ["d2", "d1", "d2", "d3"]
            .iter()
            .map(|id| {
                Row::from_pairs(vec![("device_id".to_string(), Value::Str(id.to_string()))])
            })
            .collect();
        assert_eq!(extract_keys(&rows, "device_id"), vec!["d2", "d1", "d3"]);
    }

    #[test]
    fn test_extract_keys_skips_missing_column() {
        let rows = vec![Row::new()];
        assert!(extract_keys(&rows, "device_id").is_empty());
    }
}
