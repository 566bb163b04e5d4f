//! # srql-runtime
//!
//! The execution side of SRQL: the query engine (plan cache, in-flight
//! budget, deadline), the step executor with chunked correlated
//! execution, the result merger, and the `--explain` plan renderer.

pub mod engine;
pub mod executor;
pub mod explain;
pub mod merge;

pub use engine::{QueryEngine, QueryOutcome, QueryState};
pub use executor::{ExecutionOptions, ExecutionOutcome, Executor};
pub use explain::explain_plan;
