//! The result merger.
//!
//! Backend-native records stay tagged until they get here. Paths flatten
//! to `hop_<i>` columns plus `path_length`; cross-backend joins become a
//! keyed in-memory join; ORDER BY and LIMIT that could not be pushed
//! down are applied after merging.

use srql_common::models::{BackendRecord, Row, Value};
use srql_query::MergeStep;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Flatten backend records into uniform rows. Path hop columns are
/// bounded by `max_hops` vertices past the start.
pub fn flatten_records(records: Vec<BackendRecord>, max_hops: u32) -> Vec<Row> {
    records
        .into_iter()
        .map(|record| match record {
            BackendRecord::Row(row) => row,
            BackendRecord::Path(path) => {
                let mut row = Row::new();
                let bound = (max_hops as usize).saturating_add(1);
                for (i, vertex) in path.vertices.iter().take(bound).enumerate() {
                    let label = vertex
                        .get("id")
                        .or_else(|| vertex.get("hostname"))
                        .cloned()
                        .unwrap_or(Value::Null);
                    row.push(format!("hop_{i}"), label);
                }
                row.push("path_length", Value::Int(path.hop_count() as i64));
                row
            }
        })
        .collect()
}

/// Keyed inner join of the two step outputs. Output rows are based on
/// the FROM-entity side; the lookup side only contributes columns that
/// do not collide.
pub fn merge_rows(first: Vec<Row>, second: Vec<Row>, step: &MergeStep) -> Vec<Row> {
    let (base, base_key, lookup, lookup_key) = if step.base_is_first {
        (first, &step.first_key, second, &step.second_key)
    } else {
        (second, &step.second_key, first, &step.first_key)
    };

    let mut by_key: HashMap<String, Vec<&Row>> = HashMap::new();
    for row in &lookup {
        if let Some(key) = row.get(lookup_key) {
            by_key.entry(key.render()).or_default().push(row);
        }
    }

    let mut merged = Vec::new();
    for row in &base {
        let Some(key) = row.get(base_key) else { continue };
        let Some(matches) = by_key.get(&key.render()) else {
            continue;
        };
        for lookup_row in matches {
            let mut out = row.clone();
            for (column, value) in lookup_row.iter() {
                if out.get(column).is_none() {
                    out.push(column.clone(), value.clone());
                }
            }
            merged.push(out);
        }
    }

    sort_and_limit(&mut merged, &step.order_by, step.limit);
    merged
}

/// Stable multi-key sort; nulls and incomparable values sort last.
pub fn sort_and_limit(rows: &mut Vec<Row>, order_by: &[(String, bool)], limit: Option<u64>) {
    if !order_by.is_empty() {
        rows.sort_by(|a, b| {
            for (column, descending) in order_by {
                let ordering = compare_column(a.get(column), b.get(column));
                let ordering = if *descending {
                    ordering.reverse()
                } else {
                    ordering
                };
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            Ordering::Equal
        });
    }
    if let Some(limit) = limit {
        rows.truncate(limit as usize);
    }
}

fn compare_column(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    // Absent columns and nulls both sort after present values.
    let a = a.filter(|v| !matches!(v, Value::Null));
    let b = b.filter(|v| !matches!(v, Value::Null));
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srql_common::models::GraphPath;

    fn row(pairs: &[(&str, Value)]) -> Row {
        Row::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn merge_step(order_by: Vec<(String, bool)>, limit: Option<u64>) -> MergeStep {
        MergeStep {
            first_key: "id".to_string(),
            second_key: "device_id".to_string(),
            base_is_first: false,
            order_by,
            limit,
        }
    }

    #[test]
    fn test_inner_join_enriches_base_rows() {
        let graph = vec![
            row(&[("id", Value::Str("d1".into())), ("site", Value::Str("dc-east".into()))]),
            row(&[("id", Value::Str("d2".into())), ("site", Value::Str("dc-west".into()))]),
        ];
        let ts = vec![
            row(&[("device_id", Value::Str("d1".into())), ("avg_value", Value::Float(91.0))]),
            row(&[("device_id", Value::Str("d3".into())), ("avg_value", Value::Float(15.0))]),
        ];

        let merged = merge_rows(graph, ts, &merge_step(Vec::new(), None));
        // d3 has no graph match and is dropped.
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].get("device_id").unwrap().render(), "d1");
        assert_eq!(merged[0].get("site").unwrap().render(), "dc-east");
        assert_eq!(merged[0].get("avg_value"), Some(&Value::Float(91.0)));
    }

    #[test]
    fn test_collision_keeps_base_column() {
        let graph = vec![row(&[
            ("id", Value::Str("d1".into())),
            ("name", Value::Str("graph-name".into())),
        ])];
        let ts = vec![row(&[
            ("device_id", Value::Str("d1".into())),
            ("name", Value::Str("ts-name".into())),
        ])];

        let merged = merge_rows(graph, ts, &merge_step(Vec::new(), None));
        assert_eq!(merged[0].get("name").unwrap().render(), "ts-name");
    }

    #[test]
    fn test_post_merge_order_and_limit() {
        let graph = vec![
            row(&[("id", Value::Str("d1".into()))]),
            row(&[("id", Value::Str("d2".into()))]),
            row(&[("id", Value::Str("d3".into()))]),
        ];
        let ts = vec![
            row(&[("device_id", Value::Str("d1".into())), ("avg_value", Value::Float(10.0))]),
            row(&[("device_id", Value::Str("d2".into())), ("avg_value", Value::Float(30.0))]),
            row(&[("device_id", Value::Str("d3".into())), ("avg_value", Value::Float(20.0))]),
        ];

        let merged = merge_rows(
            graph,
            ts,
            &merge_step(vec![("avg_value".to_string(), true)], Some(2)),
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].get("device_id").unwrap().render(), "d2");
        assert_eq!(merged[1].get("device_id").unwrap().render(), "d3");
    }

    #[test]
    fn test_path_flattening_bounded() {
        let vertices: Vec<Row> = (0..8)
            .map(|i| row(&[("id", Value::Str(format!("d{i}")))]))
            .collect();
        let edges: Vec<Row> = (0..7).map(|_| Row::new()).collect();
        let records = vec![BackendRecord::Path(GraphPath { vertices, edges })];

        let rows = flatten_records(records, 4);
        let columns: Vec<&str> = rows[0].columns().collect();
        // Start vertex plus at most four hops, then the true length.
        assert_eq!(
            columns,
            ["hop_0", "hop_1", "hop_2", "hop_3", "hop_4", "path_length"]
        );
        assert_eq!(rows[0].get("path_length"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_sort_places_missing_values_last() {
        let mut rows = vec![
            row(&[("v", Value::Null)]),
            row(&[("v", Value::Int(2))]),
            row(&[("v", Value::Int(1))]),
        ];
        sort_and_limit(&mut rows, &[("v".to_string(), false)], None);
        assert_eq!(rows[0].get("v"), Some(&Value::Int(1)));
        assert_eq!(rows[2].get("v"), Some(&Value::Null));
    }
}
