//! Immutable execution plans.
//!
//! A plan is a short sequence of steps in dependency order. Cross-backend
//! joins always produce a key-producing step, a key-consuming step, and a
//! merge step; single-backend queries compile to one step. Plans are
//! `Arc`-shared and cached, never mutated after planning.

use srql_backends::{GraphStatement, TsStatement};

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionPlan {
    /// Canonical query text, also the plan-cache key.
    pub fingerprint: String,
    pub steps: Vec<PlanStep>,
}

impl ExecutionPlan {
    pub fn merge_step(&self) -> Option<&MergeStep> {
        self.steps.iter().find_map(|step| match step {
            PlanStep::Merge(m) => Some(m),
            _ => None,
        })
    }

    pub fn is_single_step(&self) -> bool {
        self.steps.len() == 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Graph(GraphStep),
    TimeSeries(TimeSeriesStep),
    Merge(MergeStep),
}

impl PlanStep {
    pub fn kind(&self) -> &'static str {
        match self {
            PlanStep::Graph(_) => "graph",
            PlanStep::TimeSeries(_) => "timeseries",
            PlanStep::Merge(_) => "merge",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphStep {
    pub entity: String,
    pub statement: GraphStatement,
    /// Column whose values become the correlating key set.
    pub key_field: Option<String>,
    /// Bind variable the executor fills with the key set.
    pub key_slot: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesStep {
    pub entity: String,
    /// `statement.key_slot` marks the parameter the executor fills with
    /// the correlating key array.
    pub statement: TsStatement,
    /// Column whose values become the correlating key set.
    pub key_field: Option<String>,
}

/// Keyed in-memory join of the two preceding steps.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeStep {
    /// Join column in the first (key-producing) step's rows.
    pub first_key: String,
    /// Join column in the second (key-consuming) step's rows.
    pub second_key: String,
    /// Whether output rows are based on the first step's rows. The base
    /// side is the FROM entity; the other side only enriches.
    pub base_is_first: bool,
    pub order_by: Vec<(String, bool)>,
    pub limit: Option<u64>,
}
