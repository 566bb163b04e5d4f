//! # srql-query
//!
//! The middle of the pipeline: binder (AST + catalog snapshot →
//! `BoundQuery`), planner (`BoundQuery` → `ExecutionPlan`), and the
//! per-backend code generators. Everything here is pure; execution
//! lives in `srql-runtime`.

pub mod bind;
pub mod codegen;
pub mod plan;
pub mod planner;

pub use bind::{Binder, BoundJoin, BoundPath, BoundQuery, BoundStream};
pub use plan::{ExecutionPlan, GraphStep, MergeStep, PlanStep, TimeSeriesStep};
pub use planner::{Planner, PlannerOptions};
