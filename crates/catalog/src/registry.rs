//! Built-in entity registry.
//!
//! The registry is data-driven: adding an entity means adding a row
//! here, not a code branch in the binder or the code generators.

use crate::snapshot::{BackendKind, CatalogSnapshot, EntitySchema, FieldSchema, FieldType};

fn field(name: &str, field_type: FieldType) -> FieldSchema {
    FieldSchema {
        name: name.to_string(),
        field_type,
    }
}

fn graph_entity(name: &str, fields: Vec<FieldSchema>) -> EntitySchema {
    EntitySchema {
        name: name.to_string(),
        backend: BackendKind::Graph,
        fields,
        time_field: None,
        key_field: Some("id".to_string()),
        relation: name.to_string(),
        aggregate_relation: None,
        value_fields: Vec::new(),
        edge_collection: None,
    }
}

fn stream_entity(
    name: &str,
    fields: Vec<FieldSchema>,
    aggregate_relation: Option<&str>,
    value_fields: &[&str],
) -> EntitySchema {
    EntitySchema {
        name: name.to_string(),
        backend: BackendKind::TimeSeries,
        fields,
        time_field: Some("timestamp".to_string()),
        key_field: Some("device_id".to_string()),
        relation: name.to_string(),
        aggregate_relation: aggregate_relation.map(str::to_string),
        value_fields: value_fields.iter().map(|f| f.to_string()).collect(),
        edge_collection: None,
    }
}

/// The default ServiceRadar schema.
pub fn builtin_snapshot() -> CatalogSnapshot {
    use FieldType::{Bool, Float, Int, Str, Timestamp};

    let mut topology = graph_entity(
        "topology",
        vec![
            field("id", Str),
            field("source_device", Str),
            field("target_device", Str),
            field("link_type", Str),
            field("capacity_bps", Int),
        ],
    );
    topology.edge_collection = Some("topology_edges".to_string());

    CatalogSnapshot::new(
        1,
        vec![
            graph_entity(
                "devices",
                vec![
                    field("id", Str),
                    field("hostname", Str),
                    field("site", Str),
                    field("vendor", Str),
                    field("os_version", Str),
                    field("up", Bool),
                    field("last_seen", Timestamp),
                ],
            ),
            graph_entity(
                "interfaces",
                vec![
                    field("id", Str),
                    field("device_id", Str),
                    field("name", Str),
                    field("ifindex", Int),
                    field("speed_bps", Int),
                    field("admin_status", Str),
                ],
            ),
            graph_entity(
                "services",
                vec![
                    field("id", Str),
                    field("device_id", Str),
                    field("name", Str),
                    field("port", Int),
                    field("state", Str),
                ],
            ),
            topology,
            stream_entity(
                "metrics",
                vec![
                    field("device_id", Str),
                    field("metric_name", Str),
                    field("value", Float),
                    field("timestamp", Timestamp),
                ],
                Some("metrics_agg_1m"),
                &["value"],
            ),
            stream_entity(
                "logs",
                vec![
                    field("device_id", Str),
                    field("severity", Str),
                    field("facility", Str),
                    field("message", Str),
                    field("timestamp", Timestamp),
                ],
                None,
                &[],
            ),
            stream_entity(
                "events",
                vec![
                    field("device_id", Str),
                    field("event_type", Str),
                    field("source", Str),
                    field("detail", Str),
                    field("timestamp", Timestamp),
                ],
                None,
                &[],
            ),
            stream_entity(
                "netflow",
                vec![
                    field("device_id", Str),
                    field("src_addr", Str),
                    field("dst_addr", Str),
                    field("protocol", Str),
                    field("bytes", Int),
                    field("packets", Int),
                    field("timestamp", Timestamp),
                ],
                Some("netflow_agg_1m"),
                &["bytes", "packets"],
            ),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_entities_present() {
        let snapshot = builtin_snapshot();
        for name in [
            "devices",
            "interfaces",
            "services",
            "topology",
            "metrics",
            "logs",
            "events",
            "netflow",
        ] {
            assert!(snapshot.entity(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn test_backend_affinity() {
        let snapshot = builtin_snapshot();
        assert_eq!(snapshot.entity("devices").unwrap().backend, BackendKind::Graph);
        assert_eq!(
            snapshot.entity("metrics").unwrap().backend,
            BackendKind::TimeSeries
        );
    }

    #[test]
    fn test_topology_declares_edge_collection() {
        let snapshot = builtin_snapshot();
        assert_eq!(
            snapshot.entity("topology").unwrap().edge_collection.as_deref(),
            Some("topology_edges")
        );
    }

    #[test]
    fn test_stream_entities_declare_time_and_key() {
        let snapshot = builtin_snapshot();
        let netflow = snapshot.entity("netflow").unwrap();
        assert_eq!(netflow.time_field.as_deref(), Some("timestamp"));
        assert_eq!(netflow.key_field.as_deref(), Some("device_id"));
        assert_eq!(netflow.value_fields, ["bytes", "packets"]);
    }
}
