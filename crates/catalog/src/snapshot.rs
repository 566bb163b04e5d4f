//! Immutable catalog snapshots.
//!
//! A snapshot is built once, shared behind an `Arc`, and never mutated.
//! Each query clones the `Arc` at bind time, so a catalog refresh can
//! never change the schema mid-query.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which store family an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    TimeSeries,
    Graph,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::TimeSeries => "timeseries",
            BackendKind::Graph => "graph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Str,
    Int,
    Float,
    Bool,
    Timestamp,
}

impl FieldType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Float)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Schema for one queryable entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntitySchema {
    pub name: String,
    pub backend: BackendKind,
    pub fields: Vec<FieldSchema>,

    /// Timestamp column used for windowing; stream entities only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_field: Option<String>,

    /// Column that correlates with graph entity ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_field: Option<String>,

    /// Physical relation holding raw rows.
    pub relation: String,

    /// Pre-aggregated relation, when the store maintains one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate_relation: Option<String>,

    /// Numeric fields from which derived aggregate columns are produced.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub value_fields: Vec<String>,

    /// Edge collection for graph traversals, topology entities only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_collection: Option<String>,
}

impl EntitySchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    /// Derived aggregate column names available under GROUP BY/WINDOW:
    /// `avg_<f>`, `min_<f>`, `max_<f>` per value field, plus
    /// `sample_count`.
    pub fn derived_columns(&self) -> Vec<(String, FieldType)> {
        let mut columns = Vec::new();
        for value_field in &self.value_fields {
            columns.push((format!("avg_{value_field}"), FieldType::Float));
            columns.push((format!("min_{value_field}"), FieldType::Float));
            columns.push((format!("max_{value_field}"), FieldType::Float));
        }
        columns.push(("sample_count".to_string(), FieldType::Int));
        columns
    }

    pub fn derived_column(&self, name: &str) -> Option<FieldType> {
        self.derived_columns()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t)
    }
}

/// An immutable view of every entity the engine can query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub version: u64,
    entities: BTreeMap<String, EntitySchema>,
}

impl CatalogSnapshot {
    pub fn new(version: u64, entities: Vec<EntitySchema>) -> Self {
        CatalogSnapshot {
            version,
            entities: entities.into_iter().map(|e| (e.name.clone(), e)).collect(),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    /// Resolve an entity name, falling back to the naive plural so that
    /// `SHOW PATH FROM device ...` finds the `devices` entity.
    pub fn resolve_entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities
            .get(name)
            .or_else(|| self.entities.get(&format!("{name}s")))
    }

    pub fn entity_names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::builtin_snapshot;

    #[test]
    fn test_resolve_singular_fallback() {
        let snapshot = builtin_snapshot();
        assert_eq!(snapshot.resolve_entity("device").unwrap().name, "devices");
        assert_eq!(snapshot.resolve_entity("devices").unwrap().name, "devices");
        assert!(snapshot.resolve_entity("gadget").is_none());
    }

    #[test]
    fn test_derived_columns() {
        let snapshot = builtin_snapshot();
        let metrics = snapshot.entity("metrics").unwrap();
        let names: Vec<String> = metrics
            .derived_columns()
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, ["avg_value", "min_value", "max_value", "sample_count"]);
        assert_eq!(metrics.derived_column("avg_value"), Some(FieldType::Float));
        assert_eq!(metrics.derived_column("sample_count"), Some(FieldType::Int));
        assert_eq!(metrics.derived_column("avg_bogus"), None);
    }

    #[test]
    fn test_snapshot_serde_roundtrip() {
        let snapshot = builtin_snapshot();
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: CatalogSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), snapshot.len());
        assert_eq!(
            back.entity("netflow").unwrap().aggregate_relation,
            Some("netflow_agg_1m".to_string())
        );
    }
}
