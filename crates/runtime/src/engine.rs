//! The query engine.
//!
//! Drives a query through parse, bind, plan, execute, and merge, with a
//! normalized-text plan cache in front of the compile stages, a
//! semaphore bounding in-flight queries, and a deadline around the whole
//! pipeline. One structured record per query goes to the `queries` log
//! target.

use crate::executor::{ExecutionOptions, ExecutionOutcome, Executor};
use moka::sync::Cache;
use srql_backends::{GraphStore, TimeSeriesStore};
use srql_catalog::SharedCatalog;
use srql_common::config::{AppConfig, QueryLimits};
use srql_common::models::{QueryRequest, Row};
use srql_common::scrubber::scrub_query;
use srql_error::{ErrorCode, ErrorContext, Result, SrqlError};
use srql_lang::printer::normalize;
use srql_query::{Binder, ExecutionPlan, Planner, PlannerOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Pipeline stage names used in the per-query log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Parsed,
    Bound,
    Planned,
    Executing,
    Merged,
    Completed,
    Failed,
}

impl QueryState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryState::Parsed => "parsed",
            QueryState::Bound => "bound",
            QueryState::Planned => "planned",
            QueryState::Executing => "executing",
            QueryState::Merged => "merged",
            QueryState::Completed => "completed",
            QueryState::Failed => "failed",
        }
    }
}

/// The engine's answer for one request.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub rows: Vec<Row>,
    pub warnings: Vec<String>,
    pub cache_hit: bool,
    pub elapsed: Duration,
}

pub struct QueryEngine {
    catalog: SharedCatalog,
    executor: Executor,
    planner: Planner,
    limits: QueryLimits,
    plan_cache: Cache<String, Arc<ExecutionPlan>>,
    in_flight: Arc<Semaphore>,
}

impl QueryEngine {
    pub fn new(
        catalog: SharedCatalog,
        timeseries: Arc<dyn TimeSeriesStore>,
        graph: Arc<dyn GraphStore>,
        config: &AppConfig,
    ) -> Self {
        let limits = config.query_limits.clone();
        let planner = Planner::new(PlannerOptions {
            max_hops: limits.max_hops,
            store_max_depth: graph.max_depth(),
            realtime_threshold_seconds: limits.realtime_threshold_seconds,
        });
        let plan_cache = Cache::builder()
            .max_capacity(config.plan_cache.capacity)
            .time_to_live(Duration::from_secs(config.plan_cache.ttl_seconds))
            .build();
        let in_flight = Arc::new(Semaphore::new(limits.max_in_flight));
        QueryEngine {
            catalog,
            executor: Executor::new(timeseries, graph, config.retry),
            planner,
            limits,
            plan_cache,
            in_flight,
        }
    }

    /// Compile a query to its cached plan. The cache key is the canonical
    /// printing, so formatting variants of the same query share a plan.
    pub fn compile(&self, query: &str) -> Result<(Arc<ExecutionPlan>, bool)> {
        let fingerprint = normalize(query)?;
        if let Some(plan) = self.plan_cache.get(&fingerprint) {
            return Ok((plan, true));
        }
        let parsed = srql_lang::parser::parse(query)?;
        let bound = Binder::new(self.catalog.snapshot()).bind(&parsed)?;
        let plan = Arc::new(self.planner.plan(&bound, fingerprint.clone())?);
        self.plan_cache.insert(fingerprint, Arc::clone(&plan));
        Ok((plan, false))
    }

    /// Run one request end to end under its deadline.
    pub async fn execute(&self, request: &QueryRequest) -> Result<QueryOutcome> {
        let timeout_seconds = request
            .timeout_seconds
            .unwrap_or(self.limits.timeout_seconds);
        let deadline = Duration::from_secs(timeout_seconds);
        let started = Instant::now();

        // Expiry drops the inner future, cancelling in-flight store calls.
        let result = match tokio::time::timeout(deadline, self.execute_inner(request)).await {
            Ok(result) => result,
            Err(_) => Err(SrqlError::new(
                ErrorCode::QueryTimeout,
                format!("query timed out after {timeout_seconds} seconds"),
            )
            .with_context(ErrorContext::Timeout { timeout_seconds })),
        };
        let elapsed = started.elapsed();

        match result {
            Ok((outcome, cache_hit)) => {
                info!(
                    target: "queries",
                    query = %scrub_query(&request.query),
                    state = QueryState::Completed.as_str(),
                    rows = outcome.rows.len(),
                    warnings = outcome.warnings.len(),
                    cache_hit,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "query completed"
                );
                Ok(QueryOutcome {
                    rows: outcome.rows,
                    warnings: outcome.warnings,
                    cache_hit,
                    elapsed,
                })
            }
            Err(err) => {
                warn!(
                    target: "queries",
                    query = %scrub_query(&request.query),
                    state = QueryState::Failed.as_str(),
                    stage = err.category().as_str(),
                    code = %err.code,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "query failed"
                );
                Err(err)
            }
        }
    }

    async fn execute_inner(
        &self,
        request: &QueryRequest,
    ) -> Result<(ExecutionOutcome, bool)> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|_| SrqlError::new(ErrorCode::Internal, "query engine is shutting down"))?;

        let (plan, cache_hit) = self.compile(&request.query)?;
        let options = ExecutionOptions {
            key_cap: request.key_cap.unwrap_or(self.limits.key_cap),
            degraded: request.degraded,
            max_hops: self.limits.max_hops,
        };

        let mut outcome = self.executor.execute(&plan, &options).await?;
        let cap = request.limit.unwrap_or(self.limits.default_limit) as usize;
        if outcome.rows.len() > cap {
            outcome.rows.truncate(cap);
        }
        Ok((outcome, cache_hit))
    }

    /// Number of plans currently cached. Exposed for the metrics endpoint.
    pub fn cached_plans(&self) -> u64 {
        self.plan_cache.entry_count()
    }
}
