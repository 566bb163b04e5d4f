//! # srql-catalog
//!
//! The schema catalog: which entities exist, which store family each one
//! lives in, and what fields it exposes. Snapshots are immutable and
//! `Arc`-shared; a background refresher swaps them in without blocking
//! queries.

pub mod refresh;
pub mod registry;
pub mod snapshot;

pub use refresh::{
    spawn_refresher, CatalogService, HttpCatalogService, SharedCatalog, StaticCatalogService,
};
pub use registry::builtin_snapshot;
pub use snapshot::{BackendKind, CatalogSnapshot, EntitySchema, FieldSchema, FieldType};
