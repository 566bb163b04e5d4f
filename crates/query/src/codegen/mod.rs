//! Backend code generators.

pub mod graph;
pub mod sanitize;
pub mod timeseries;
