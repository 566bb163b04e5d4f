//! SQL generation for the time-series store.
//!
//! Every literal is bound as a `$n` parameter; only catalog-validated
//! identifiers reach the statement text. Windowed queries group on
//! `time_bucket` buckets (TUMBLE), a union of slide offsets (HOP), or
//! gap-based session ids derived with `lag(...) OVER` (SESSION).

use crate::bind::BoundStream;
use crate::codegen::sanitize::safe_identifier;
use srql_backends::TsStatement;
use srql_catalog::EntitySchema;
use srql_common::models::Value;
use srql_error::{ErrorCode, Result, SrqlError};
use srql_lang::{Expr, Literal, WindowMode};

/// Which physical relation the statement reads, which also decides how
/// derived aggregates are spelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Raw,
    Aggregate,
}

struct ParamList {
    values: Vec<Value>,
    key_slot: Option<usize>,
}

impl ParamList {
    fn new() -> Self {
        ParamList {
            values: Vec::new(),
            key_slot: None,
        }
    }

    fn push(&mut self, value: Value) -> String {
        self.values.push(value);
        format!("${}", self.values.len())
    }

    fn push_key_slot(&mut self) -> String {
        let placeholder = self.push(Value::StrList(Vec::new()));
        self.key_slot = Some(self.values.len() - 1);
        placeholder
    }
}

/// Generate the statement for a bound stream query against the
/// time-series store.
///
/// `key_filter` names the correlation column when this is the
/// key-consuming step of a join; the key array itself is bound by the
/// executor. `push_order_limit` is set only for single-step plans.
pub fn generate_timeseries(
    query: &BoundStream,
    key_filter: Option<&str>,
    push_order_limit: bool,
    realtime_threshold_seconds: u64,
) -> Result<TsStatement> {
    let entity = &query.entity;
    let mut params = ParamList::new();

    let source = choose_source(query, realtime_threshold_seconds);
    let relation = match source {
        Source::Raw => entity.relation.clone(),
        Source::Aggregate => entity
            .aggregate_relation
            .clone()
            .unwrap_or_else(|| entity.relation.clone()),
    };
    safe_identifier(&relation)?;

    let time_column = match source {
        Source::Raw => entity.time_field.clone(),
        Source::Aggregate => Some("bucket".to_string()),
    };

    let mut where_clauses = Vec::new();
    if let Some(filter) = &query.local_filter {
        where_clauses.push(render_expr(
            filter,
            entity,
            time_column.as_deref(),
            source,
            &mut params,
        )?);
    }
    if let Some(key_field) = key_filter {
        safe_identifier(key_field)?;
        let placeholder = params.push_key_slot();
        where_clauses.push(format!("{key_field} = ANY({placeholder})"));
    }
    let where_sql = if where_clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_clauses.join(" AND "))
    };

    let mut sql = if query.is_aggregate() {
        generate_aggregate(query, &relation, &where_sql, time_column.as_deref(), source, &mut params)?
    } else {
        format!("SELECT * FROM {relation}{where_sql}")
    };

    if push_order_limit {
        if !query.order_by.is_empty() {
            let keys: Result<Vec<String>> = query
                .order_by
                .iter()
                .map(|(column, descending)| {
                    safe_identifier(column)?;
                    Ok(format!(
                        "{column}{}",
                        if *descending { " DESC" } else { " ASC" }
                    ))
                })
                .collect();
            sql.push_str(&format!(" ORDER BY {}", keys?.join(", ")));
        }
        if let Some(limit) = query.limit {
            let placeholder = params.push(Value::Int(limit as i64));
            sql.push_str(&format!(" LIMIT {placeholder}"));
        }
    }

    let mut statement = TsStatement::new(sql, params.values);
    statement.key_slot = params.key_slot;
    Ok(statement)
}

/// Raw within the real-time threshold, pre-aggregated otherwise. Session
/// windows always read raw rows because sessionization needs the
/// original timestamps.
fn choose_source(query: &BoundStream, realtime_threshold_seconds: u64) -> Source {
    if !query.is_aggregate() || query.entity.aggregate_relation.is_none() {
        return Source::Raw;
    }
    if matches!(
        query.window.as_ref().map(|w| &w.mode),
        Some(WindowMode::Session { .. })
    ) {
        return Source::Raw;
    }
    match query.oldest_time_bound_seconds() {
        Some(bound) if bound <= realtime_threshold_seconds => Source::Raw,
        // No time bound means the query can reach arbitrarily far back.
        _ => Source::Aggregate,
    }
}

fn generate_aggregate(
    query: &BoundStream,
    relation: &str,
    where_sql: &str,
    time_column: Option<&str>,
    source: Source,
    params: &mut ParamList,
) -> Result<String> {
    let entity = &query.entity;
    for key in &query.group_by {
        safe_identifier(key)?;
    }
    let group_keys = query.group_by.join(", ");
    let aggregates = derived_select_list(entity, source);

    let having_sql = match &query.having {
        Some(having) => format!(
            " HAVING {}",
            render_aggregate_expr(having, entity, source, params)?
        ),
        None => String::new(),
    };

    let Some(window) = &query.window else {
        // GROUP BY without WINDOW: plain grouped aggregation.
        let select = join_nonempty(&[group_keys.clone(), aggregates]);
        return Ok(format!(
            "SELECT {select} FROM {relation}{where_sql} GROUP BY {group_keys}{having_sql}"
        ));
    };

    let time = time_column.ok_or_else(|| {
        SrqlError::new(
            ErrorCode::InvalidWindowOnGraph,
            format!("Entity '{}' has no time field to window over", entity.name),
        )
    })?;
    safe_identifier(time)?;

    match &window.mode {
        WindowMode::Tumble => {
            let size = params.push(Value::Int(window.size_seconds as i64));
            let select = join_nonempty(&[
                group_keys.clone(),
                format!("time_bucket(make_interval(secs => {size}), {time}) AS bucket"),
                aggregates,
            ]);
            let group = join_nonempty(&[group_keys, "bucket".to_string()]);
            Ok(format!(
                "WITH src AS (SELECT * FROM {relation}{where_sql}) \
                 SELECT {select} FROM src GROUP BY {group}{having_sql}"
            ))
        }
        WindowMode::Hop { slide_seconds } => {
            let slide = (*slide_seconds).max(1);
            let branches = window.size_seconds.div_ceil(slide);
            let mut selects = Vec::new();
            for branch in 0..branches {
                let offset_seconds = (branch * slide) as i64;
                let size = params.push(Value::Int(window.size_seconds as i64));
                let offset = params.push(Value::Int(offset_seconds));
                let bucket = format!(
                    "time_bucket(make_interval(secs => {size}), {time} - make_interval(secs => {offset})) \
                     + make_interval(secs => {offset}) AS bucket"
                );
                let select = join_nonempty(&[group_keys.clone(), bucket, aggregates.clone()]);
                let group = join_nonempty(&[group_keys.clone(), "bucket".to_string()]);
                selects.push(format!(
                    "SELECT {select} FROM src GROUP BY {group}{having_sql}"
                ));
            }
            Ok(format!(
                "WITH src AS (SELECT * FROM {relation}{where_sql}) {}",
                selects.join(" UNION ALL ")
            ))
        }
        WindowMode::Session { gap_seconds } => {
            let gap = params.push(Value::Int(*gap_seconds as i64));
            let partition = if query.group_by.is_empty() {
                String::new()
            } else {
                format!("PARTITION BY {group_keys} ")
            };
            let select = join_nonempty(&[
                group_keys.clone(),
                format!("min({time}) AS session_start"),
                format!("max({time}) AS session_end"),
                aggregates,
            ]);
            let group = join_nonempty(&[group_keys, "session_id".to_string()]);
            Ok(format!(
                "WITH src AS (SELECT * FROM {relation}{where_sql}), \
                 gaps AS (SELECT *, CASE WHEN {time} - lag({time}) OVER ({partition}ORDER BY {time}) \
                 > make_interval(secs => {gap}) THEN 1 ELSE 0 END AS new_session FROM src), \
                 sessions AS (SELECT *, sum(new_session) OVER ({partition}ORDER BY {time} \
                 ROWS UNBOUNDED PRECEDING) AS session_id FROM gaps) \
                 SELECT {select} FROM sessions GROUP BY {group}{having_sql}"
            ))
        }
    }
}

/// Derived aggregate output columns. Against the pre-aggregated relation
/// the partial aggregates are combined instead of recomputed.
fn derived_select_list(entity: &EntitySchema, source: Source) -> String {
    let mut columns = Vec::new();
    for value_field in &entity.value_fields {
        match source {
            Source::Raw => {
                columns.push(format!("avg({value_field}) AS avg_{value_field}"));
                columns.push(format!("min({value_field}) AS min_{value_field}"));
                columns.push(format!("max({value_field}) AS max_{value_field}"));
            }
            Source::Aggregate => {
                columns.push(format!("avg(avg_{value_field}) AS avg_{value_field}"));
                columns.push(format!("min(min_{value_field}) AS min_{value_field}"));
                columns.push(format!("max(max_{value_field}) AS max_{value_field}"));
            }
        }
    }
    columns.push(match source {
        Source::Raw => "count(*) AS sample_count".to_string(),
        Source::Aggregate => "sum(sample_count) AS sample_count".to_string(),
    });
    columns.join(", ")
}

/// Spell a derived column as its aggregate expression (aliases are not
/// visible to HAVING).
fn aggregate_expr(entity: &EntitySchema, column: &str, source: Source) -> Option<String> {
    if column == "sample_count" {
        return Some(match source {
            Source::Raw => "count(*)".to_string(),
            Source::Aggregate => "sum(sample_count)".to_string(),
        });
    }
    for value_field in &entity.value_fields {
        for agg in ["avg", "min", "max"] {
            if column == format!("{agg}_{value_field}") {
                return Some(match source {
                    Source::Raw => format!("{agg}({value_field})"),
                    Source::Aggregate => format!("{agg}({agg}_{value_field})"),
                });
            }
        }
    }
    None
}

fn render_aggregate_expr(
    expr: &Expr,
    entity: &EntitySchema,
    source: Source,
    params: &mut ParamList,
) -> Result<String> {
    let render_column = |name: &str| -> Result<String> {
        safe_identifier(name)?;
        Ok(aggregate_expr(entity, name, source).unwrap_or_else(|| name.to_string()))
    };
    render_with(expr, &render_column, None, params)
}

fn render_expr(
    expr: &Expr,
    entity: &EntitySchema,
    time_column: Option<&str>,
    source: Source,
    params: &mut ParamList,
) -> Result<String> {
    // Time-field predicates on the aggregate relation address the bucket
    // column under its own name.
    let raw_time = entity.time_field.clone();
    let render_column = move |name: &str| -> Result<String> {
        safe_identifier(name)?;
        if source == Source::Aggregate && raw_time.as_deref() == Some(name) {
            Ok("bucket".to_string())
        } else {
            Ok(name.to_string())
        }
    };
    render_with(expr, &render_column, time_column, params)
}

fn render_with(
    expr: &Expr,
    render_column: &dyn Fn(&str) -> Result<String>,
    time_column: Option<&str>,
    params: &mut ParamList,
) -> Result<String> {
    match expr {
        Expr::Compare { field, op, value } => {
            let column = render_column(&field.name)?;
            let rhs = render_literal(value, is_time(&column, time_column), params);
            Ok(format!("{column} {} {rhs}", op.as_str()))
        }
        Expr::Contains { field, value } => {
            let column = render_column(&field.name)?;
            let needle = params.push(literal_value(value));
            Ok(format!("strpos({column}, {needle}) > 0"))
        }
        Expr::Like { field, value } => {
            let column = render_column(&field.name)?;
            let pattern = params.push(literal_value(value));
            Ok(format!("{column} LIKE {pattern}"))
        }
        Expr::In { field, values } => {
            let column = render_column(&field.name)?;
            if values.iter().all(|v| matches!(v, Literal::Str(_))) {
                let items = values
                    .iter()
                    .filter_map(|v| match v {
                        Literal::Str(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect();
                let list = params.push(Value::StrList(items));
                Ok(format!("{column} = ANY({list})"))
            } else {
                let placeholders: Vec<String> = values
                    .iter()
                    .map(|v| params.push(literal_value(v)))
                    .collect();
                Ok(format!("{column} IN ({})", placeholders.join(", ")))
            }
        }
        Expr::Between { field, low, high } => {
            let column = render_column(&field.name)?;
            let relative = is_time(&column, time_column);
            let low_sql = render_literal(low, relative, params);
            let high_sql = render_literal(high, relative, params);
            Ok(format!("{column} BETWEEN {low_sql} AND {high_sql}"))
        }
        Expr::And(left, right) => Ok(format!(
            "({} AND {})",
            render_with(left, render_column, time_column, params)?,
            render_with(right, render_column, time_column, params)?
        )),
        Expr::Or(left, right) => Ok(format!(
            "({} OR {})",
            render_with(left, render_column, time_column, params)?,
            render_with(right, render_column, time_column, params)?
        )),
        Expr::Not(inner) => Ok(format!(
            "NOT ({})",
            render_with(inner, render_column, time_column, params)?
        )),
    }
}

fn is_time(column: &str, time_column: Option<&str>) -> bool {
    time_column == Some(column) || (time_column.is_some() && column == "bucket")
}

/// Durations against the time column mean "relative to now"; timestamp
/// strings get an explicit cast.
fn render_literal(literal: &Literal, time_context: bool, params: &mut ParamList) -> String {
    match literal {
        Literal::Duration(seconds) if time_context => {
            let placeholder = params.push(Value::Int(*seconds as i64));
            format!("now() - make_interval(secs => {placeholder})")
        }
        Literal::Str(s) if time_context => {
            let placeholder = params.push(Value::Str(s.clone()));
            format!("{placeholder}::timestamptz")
        }
        other => params.push(literal_value(other)),
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Duration(seconds) => Value::Int(*seconds as i64),
    }
}

fn join_nonempty(parts: &[String]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::{Binder, BoundQuery};
    use srql_catalog::builtin_snapshot;
    use srql_lang::parse;
    use std::sync::Arc;

    fn bound(input: &str) -> BoundStream {
        let query = parse(input).unwrap();
        match Binder::new(Arc::new(builtin_snapshot())).bind(&query).unwrap() {
            BoundQuery::Stream(q) => q,
            other => panic!("expected stream, got {other:?}"),
        }
    }

    fn generate(input: &str) -> TsStatement {
        generate_timeseries(&bound(input), None, true, 3600).unwrap()
    }

    #[test]
    fn test_literals_become_parameters() {
        let stmt = generate("STREAM metrics WHERE metric_name = 'cpu' AND value > 80.5 LIMIT 10");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM metrics WHERE (metric_name = $1 AND value > $2) LIMIT $3"
        );
        assert_eq!(
            stmt.params,
            vec![
                Value::Str("cpu".into()),
                Value::Float(80.5),
                Value::Int(10)
            ]
        );
        assert!(!stmt.sql.contains("cpu"));
    }

    #[test]
    fn test_duration_becomes_relative_bound() {
        let stmt = generate("STREAM metrics WHERE timestamp > 15m");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM metrics WHERE timestamp > now() - make_interval(secs => $1)"
        );
        assert_eq!(stmt.params, vec![Value::Int(900)]);
    }

    #[test]
    fn test_string_in_list_binds_one_array() {
        let stmt = generate("STREAM metrics WHERE metric_name IN ('cpu', 'mem', 'disk')");
        assert_eq!(
            stmt.sql,
            "SELECT * FROM metrics WHERE metric_name = ANY($1)"
        );
        assert_eq!(
            stmt.params,
            vec![Value::StrList(vec!["cpu".into(), "mem".into(), "disk".into()])]
        );
    }

    #[test]
    fn test_tumble_window_recent_uses_raw_relation() {
        let stmt = generate(
            "STREAM metrics WHERE timestamp > 30m GROUP BY device_id WINDOW 5m",
        );
        assert!(stmt.sql.starts_with("WITH src AS (SELECT * FROM metrics WHERE"));
        assert!(stmt.sql.contains("time_bucket(make_interval(secs => $2), timestamp) AS bucket"));
        assert!(stmt.sql.contains("avg(value) AS avg_value"));
        assert!(stmt.sql.contains("count(*) AS sample_count"));
        assert!(stmt.sql.contains("GROUP BY device_id, bucket"));
    }

    #[test]
    fn test_old_time_bound_switches_to_aggregate_relation() {
        let stmt = generate(
            "STREAM metrics WHERE timestamp > 2d GROUP BY device_id WINDOW 1h",
        );
        assert!(stmt.sql.contains("FROM metrics_agg_1m"));
        assert!(stmt.sql.contains("avg(avg_value) AS avg_value"));
        assert!(stmt.sql.contains("sum(sample_count) AS sample_count"));
        // The time predicate addresses the bucket column.
        assert!(stmt.sql.contains("bucket > now() - make_interval(secs => $1)"));
    }

    #[test]
    fn test_unbounded_aggregate_query_uses_aggregate_relation() {
        let stmt = generate("STREAM metrics GROUP BY device_id WINDOW 1h");
        assert!(stmt.sql.contains("FROM metrics_agg_1m"));
    }

    #[test]
    fn test_hop_window_unions_slide_offsets() {
        let stmt = generate(
            "STREAM metrics WHERE timestamp > 10m GROUP BY device_id WINDOW 5m HOP 1m",
        );
        assert_eq!(stmt.sql.matches("UNION ALL").count(), 4);
        assert_eq!(stmt.sql.matches("AS bucket").count(), 5);
    }

    #[test]
    fn test_session_window_uses_lag_gaps() {
        let stmt = generate(
            "STREAM events WHERE timestamp > 1h GROUP BY device_id WINDOW 30m SESSION 5m",
        );
        assert!(stmt.sql.contains("lag(timestamp) OVER (PARTITION BY device_id ORDER BY timestamp)"));
        assert!(stmt.sql.contains("sum(new_session) OVER"));
        assert!(stmt.sql.contains("min(timestamp) AS session_start"));
        assert!(stmt.sql.contains("GROUP BY device_id, session_id"));
        assert_eq!(stmt.params, vec![Value::Int(3600), Value::Int(300)]);
    }

    #[test]
    fn test_having_spells_out_aggregate() {
        let stmt = generate(
            "STREAM metrics WHERE timestamp > 10m GROUP BY device_id WINDOW 5m \
             HAVING avg_value > 80",
        );
        assert!(stmt.sql.contains("HAVING avg(value) > $"));
    }

    #[test]
    fn test_key_filter_reserves_slot() {
        let stmt = generate_timeseries(
            &bound("STREAM metrics WHERE metric_name = 'cpu'"),
            Some("device_id"),
            false,
            3600,
        )
        .unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT * FROM metrics WHERE metric_name = $1 AND device_id = ANY($2)"
        );
        assert_eq!(stmt.key_slot, Some(1));
        assert_eq!(stmt.params[1], Value::StrList(Vec::new()));
    }

    #[test]
    fn test_order_limit_pushed_down_only_when_asked() {
        let pushed = generate("STREAM logs WHERE severity = 'error' ORDER BY timestamp DESC LIMIT 100");
        assert!(pushed.sql.contains("ORDER BY timestamp DESC LIMIT $2"));

        let unpushed = generate_timeseries(
            &bound("STREAM logs WHERE severity = 'error' ORDER BY timestamp DESC LIMIT 100"),
            None,
            false,
            3600,
        )
        .unwrap();
        assert!(!unpushed.sql.contains("ORDER BY"));
        assert!(!unpushed.sql.contains("LIMIT"));
    }
}
