//! The planner: bound queries become immutable step sequences.
//!
//! Single-backend queries compile to one pushed-down step. Joins compile
//! to a key-producing step, a key-consuming step, and a merge step; for
//! cross-backend joins the graph side always runs first (assumed
//! smaller), and a merge step is always appended.

use crate::bind::{BoundJoin, BoundPath, BoundQuery, BoundStream};
use crate::codegen::graph::{generate_graph, generate_path, GraphQuerySpec};
use crate::codegen::timeseries::generate_timeseries;
use crate::plan::{ExecutionPlan, GraphStep, MergeStep, PlanStep, TimeSeriesStep};
use srql_catalog::BackendKind;
use srql_error::Result;
use srql_lang::Expr;

#[derive(Debug, Clone)]
pub struct PlannerOptions {
    /// Default and ceiling for path traversal depth.
    pub max_hops: u32,
    /// Depth bound advertised by the graph store.
    pub store_max_depth: u32,
    /// Queries bounded within this many seconds read the raw relation.
    pub realtime_threshold_seconds: u64,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        PlannerOptions {
            max_hops: srql_common::config::DEFAULT_MAX_HOPS,
            store_max_depth: srql_backends::DEFAULT_MAX_DEPTH,
            realtime_threshold_seconds: srql_common::config::DEFAULT_REALTIME_THRESHOLD_SECONDS,
        }
    }
}

pub struct Planner {
    options: PlannerOptions,
}

/// One side of a join, reduced to what its scan needs.
struct JoinSide<'a> {
    entity: &'a srql_catalog::EntitySchema,
    filter: Option<&'a Expr>,
    key: &'a str,
}

impl Planner {
    pub fn new(options: PlannerOptions) -> Self {
        Planner { options }
    }

    /// `fingerprint` is the canonical query text; it becomes the plan's
    /// cache identity.
    pub fn plan(&self, bound: &BoundQuery, fingerprint: String) -> Result<ExecutionPlan> {
        let steps = match bound {
            BoundQuery::Stream(query) => match &query.join {
                Some(join) => self.plan_join(query, join)?,
                None => vec![self.plan_single(query)?],
            },
            BoundQuery::Path(path) => vec![self.plan_path(path)?],
        };
        tracing::debug!(
            steps = steps.len(),
            kinds = ?steps.iter().map(PlanStep::kind).collect::<Vec<_>>(),
            "Planned query"
        );
        Ok(ExecutionPlan { fingerprint, steps })
    }

    fn plan_single(&self, query: &BoundStream) -> Result<PlanStep> {
        match query.entity.backend {
            BackendKind::TimeSeries => {
                let statement = generate_timeseries(
                    query,
                    None,
                    true,
                    self.options.realtime_threshold_seconds,
                )?;
                Ok(PlanStep::TimeSeries(TimeSeriesStep {
                    entity: query.entity.name.clone(),
                    statement,
                    key_field: None,
                }))
            }
            BackendKind::Graph => {
                let spec = GraphQuerySpec {
                    entity: &query.entity,
                    filter: query.local_filter.as_ref(),
                    order_by: &query.order_by,
                    limit: query.limit,
                    push_order_limit: true,
                    key_filter: None,
                };
                let (statement, _) = generate_graph(&spec)?;
                Ok(PlanStep::Graph(GraphStep {
                    entity: query.entity.name.clone(),
                    statement,
                    key_field: None,
                    key_slot: None,
                }))
            }
        }
    }

    fn plan_join(&self, query: &BoundStream, join: &BoundJoin) -> Result<Vec<PlanStep>> {
        let primary = JoinSide {
            entity: &query.entity,
            filter: query.local_filter.as_ref(),
            key: &join.local_key,
        };
        let joined = JoinSide {
            entity: &join.entity,
            filter: query.remote_filter.as_ref(),
            key: &join.remote_key,
        };

        // The graph side leads a cross-backend join; otherwise the joined
        // entity is treated as the lookup side.
        let primary_first =
            join.cross_backend && query.entity.backend == BackendKind::Graph;
        let (first, second) = if primary_first {
            (&primary, &joined)
        } else {
            (&joined, &primary)
        };

        let first_step = self.plan_side(query, first, None, true)?;
        let second_step = self.plan_side(query, second, Some(second.key), false)?;

        let merge = MergeStep {
            first_key: first.key.to_string(),
            second_key: second.key.to_string(),
            base_is_first: primary_first,
            order_by: query.order_by.clone(),
            limit: query.limit,
        };

        Ok(vec![first_step, second_step, PlanStep::Merge(merge)])
    }

    /// Generate one side of a join. The primary side keeps the query's
    /// aggregation clauses; the lookup side is a bare filtered scan.
    fn plan_side(
        &self,
        query: &BoundStream,
        side: &JoinSide<'_>,
        key_filter: Option<&str>,
        produces_keys: bool,
    ) -> Result<PlanStep> {
        let is_primary = side.entity.name == query.entity.name;
        match side.entity.backend {
            BackendKind::TimeSeries => {
                let scan = if is_primary {
                    BoundStream {
                        join: None,
                        remote_filter: None,
                        order_by: Vec::new(),
                        limit: None,
                        ..query.clone()
                    }
                } else {
                    BoundStream {
                        entity: side.entity.clone(),
                        join: None,
                        local_filter: side.filter.cloned(),
                        remote_filter: None,
                        group_by: Vec::new(),
                        window: None,
                        having: None,
                        order_by: Vec::new(),
                        limit: None,
                    }
                };
                let statement = generate_timeseries(
                    &scan,
                    key_filter,
                    false,
                    self.options.realtime_threshold_seconds,
                )?;
                Ok(PlanStep::TimeSeries(TimeSeriesStep {
                    entity: side.entity.name.clone(),
                    statement,
                    key_field: produces_keys.then(|| side.key.to_string()),
                }))
            }
            BackendKind::Graph => {
                let spec = GraphQuerySpec {
                    entity: side.entity,
                    filter: side.filter,
                    order_by: &[],
                    limit: None,
                    push_order_limit: false,
                    key_filter,
                };
                let (statement, key_slot) = generate_graph(&spec)?;
                Ok(PlanStep::Graph(GraphStep {
                    entity: side.entity.name.clone(),
                    statement,
                    key_field: produces_keys.then(|| side.key.to_string()),
                    key_slot,
                }))
            }
        }
    }

    fn plan_path(&self, path: &BoundPath) -> Result<PlanStep> {
        let depth = path
            .max_hops
            .unwrap_or(self.options.max_hops)
            .min(self.options.store_max_depth);
        let statement = generate_path(path, depth)?;
        Ok(PlanStep::Graph(GraphStep {
            entity: path.entity.name.clone(),
            statement,
            key_field: None,
            key_slot: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::Binder;
    use srql_catalog::builtin_snapshot;
    use srql_common::models::Value;
    use srql_lang::{normalize, parse};
    use std::sync::Arc;

    fn plan(input: &str) -> ExecutionPlan {
        let query = parse(input).unwrap();
        let bound = Binder::new(Arc::new(builtin_snapshot()))
            .bind(&query)
            .unwrap();
        Planner::new(PlannerOptions::default())
            .plan(&bound, normalize(input).unwrap())
            .unwrap()
    }

    #[test]
    fn test_single_backend_single_step() {
        let plan = plan("STREAM devices WHERE site = 'dc-east' LIMIT 10");
        assert!(plan.is_single_step());
        assert!(matches!(plan.steps[0], PlanStep::Graph(_)));
    }

    #[test]
    fn test_cross_backend_graph_runs_first() {
        let plan = plan(
            "STREAM metrics JOIN devices ON device_id = devices.id \
             WHERE metric_name = 'cpu' AND devices.site = 'dc-east' LIMIT 10",
        );
        assert_eq!(plan.steps.len(), 3);

        let graph = match &plan.steps[0] {
            PlanStep::Graph(g) => g,
            other => panic!("expected graph first, got {other:?}"),
        };
        assert_eq!(graph.entity, "devices");
        assert_eq!(graph.key_field.as_deref(), Some("id"));
        assert!(graph.key_slot.is_none());
        assert!(graph.statement.text.contains("doc.site == @p1"));
        // Lookup side never takes the pushdown.
        assert!(!graph.statement.text.contains("LIMIT"));

        let ts = match &plan.steps[1] {
            PlanStep::TimeSeries(t) => t,
            other => panic!("expected timeseries second, got {other:?}"),
        };
        assert!(ts.statement.sql.contains("device_id = ANY("));
        assert!(ts.statement.key_slot.is_some());
        assert!(!ts.statement.sql.contains("LIMIT"));

        let merge = plan.merge_step().unwrap();
        assert_eq!(merge.first_key, "id");
        assert_eq!(merge.second_key, "device_id");
        assert!(!merge.base_is_first);
        assert_eq!(merge.limit, Some(10));
    }

    #[test]
    fn test_graph_primary_cross_join_leads() {
        let plan = plan(
            "STREAM devices JOIN metrics ON id = metrics.device_id \
             WHERE site = 'dc-east'",
        );
        let graph = match &plan.steps[0] {
            PlanStep::Graph(g) => g,
            other => panic!("expected graph first, got {other:?}"),
        };
        assert_eq!(graph.entity, "devices");
        assert!(plan.merge_step().unwrap().base_is_first);
    }

    #[test]
    fn test_same_backend_join_lookup_side_first() {
        let plan = plan(
            "STREAM metrics JOIN logs ON metrics.device_id = logs.device_id \
             WHERE metric_name = 'cpu' AND logs.severity = 'error'",
        );
        assert_eq!(plan.steps.len(), 3);
        let first = match &plan.steps[0] {
            PlanStep::TimeSeries(t) => t,
            other => panic!("expected timeseries first, got {other:?}"),
        };
        assert_eq!(first.entity, "logs");
        assert_eq!(first.key_field.as_deref(), Some("device_id"));
    }

    #[test]
    fn test_aggregation_stays_on_primary_side() {
        let plan = plan(
            "STREAM metrics JOIN devices ON device_id = devices.id \
             WHERE devices.site = 'dc-east' GROUP BY device_id WINDOW 5m",
        );
        let ts = match &plan.steps[1] {
            PlanStep::TimeSeries(t) => t,
            other => panic!("expected timeseries second, got {other:?}"),
        };
        assert!(ts.statement.sql.contains("time_bucket"));
        assert!(ts.statement.sql.contains("avg(value) AS avg_value")
            || ts.statement.sql.contains("avg(avg_value) AS avg_value"));
    }

    #[test]
    fn test_path_depth_bounds() {
        let bounded = plan("SHOW PATH FROM device 'a' TO device 'b' WITHIN 3 HOPS");
        match &bounded.steps[0] {
            PlanStep::Graph(g) => {
                assert_eq!(g.statement.bind_vars["depth"], Value::Int(3))
            }
            other => panic!("expected graph step, got {other:?}"),
        }

        // Unbounded queries fall back to the configured default.
        let default = plan("SHOW PATH FROM device 'a' TO device 'b'");
        match &default.steps[0] {
            PlanStep::Graph(g) => {
                assert_eq!(g.statement.bind_vars["depth"], Value::Int(6))
            }
            other => panic!("expected graph step, got {other:?}"),
        }

        // The store's advertised bound caps the request.
        let query = parse("SHOW PATH FROM device 'a' TO device 'b' WITHIN 40 HOPS").unwrap();
        let bound = Binder::new(Arc::new(builtin_snapshot()))
            .bind(&query)
            .unwrap();
        let capped = Planner::new(PlannerOptions {
            store_max_depth: 4,
            ..PlannerOptions::default()
        })
        .plan(&bound, "q".to_string())
        .unwrap();
        match &capped.steps[0] {
            PlanStep::Graph(g) => {
                assert_eq!(g.statement.bind_vars["depth"], Value::Int(4))
            }
            other => panic!("expected graph step, got {other:?}"),
        }
    }
}
