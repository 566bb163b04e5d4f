//! Traversal-language generation for the graph store.
//!
//! Statements use the store's `FOR doc IN <collection> FILTER ... RETURN`
//! form with `@p<n>` bind variables; values never appear in statement
//! text. Path queries emit bounded traversals over the topology edge
//! collection.

use crate::bind::BoundPath;
use crate::codegen::sanitize::safe_identifier;
use srql_backends::GraphStatement;
use srql_catalog::EntitySchema;
use srql_common::models::Value;
use srql_error::Result;
use srql_lang::{CompareOp, Expr, Literal};
use std::collections::BTreeMap;

/// Bind variable name the executor fills with the correlating key set.
pub const KEY_BIND_VAR: &str = "keys";

struct BindVars {
    vars: BTreeMap<String, Value>,
    next: usize,
}

impl BindVars {
    fn new() -> Self {
        BindVars {
            vars: BTreeMap::new(),
            next: 1,
        }
    }

    fn push(&mut self, value: Value) -> String {
        let name = format!("p{}", self.next);
        self.next += 1;
        self.vars.insert(name.clone(), value);
        format!("@{name}")
    }
}

/// What to generate for one graph step.
pub struct GraphQuerySpec<'a> {
    pub entity: &'a EntitySchema,
    pub filter: Option<&'a Expr>,
    pub order_by: &'a [(String, bool)],
    pub limit: Option<u64>,
    /// Push SORT/LIMIT into the statement; single-step plans only.
    pub push_order_limit: bool,
    /// Field restricted to the correlating key set, when this is the
    /// key-consuming step of a join.
    pub key_filter: Option<&'a str>,
}

/// Generate a collection scan. Returns the statement and the key bind
/// variable name when a key filter was requested.
pub fn generate_graph(spec: &GraphQuerySpec<'_>) -> Result<(GraphStatement, Option<String>)> {
    let collection = safe_identifier(&spec.entity.relation)?;
    let mut binds = BindVars::new();
    let mut text = format!("FOR doc IN {collection}");

    let mut filters = Vec::new();
    if let Some(filter) = spec.filter {
        filters.push(render_expr(filter, &mut binds)?);
    }
    let mut key_slot = None;
    if let Some(key_field) = spec.key_filter {
        safe_identifier(key_field)?;
        binds
            .vars
            .insert(KEY_BIND_VAR.to_string(), Value::StrList(Vec::new()));
        filters.push(format!("doc.{key_field} IN @{KEY_BIND_VAR}"));
        key_slot = Some(KEY_BIND_VAR.to_string());
    }
    if !filters.is_empty() {
        text.push_str(&format!(" FILTER {}", filters.join(" AND ")));
    }

    if spec.push_order_limit {
        if !spec.order_by.is_empty() {
            let keys: Result<Vec<String>> = spec
                .order_by
                .iter()
                .map(|(column, descending)| {
                    safe_identifier(column)?;
                    Ok(format!(
                        "doc.{column}{}",
                        if *descending { " DESC" } else { " ASC" }
                    ))
                })
                .collect();
            text.push_str(&format!(" SORT {}", keys?.join(", ")));
        }
        if let Some(limit) = spec.limit {
            let var = binds.push(Value::Int(limit as i64));
            text.push_str(&format!(" LIMIT {var}"));
        }
    }

    text.push_str(" RETURN doc");
    Ok((GraphStatement::new(text, binds.vars), key_slot))
}

/// Generate a bounded path traversal between two endpoints.
pub fn generate_path(path: &BoundPath, depth: u32) -> Result<GraphStatement> {
    safe_identifier(&path.entity.relation)?;
    let edges = safe_identifier(&path.edge_collection)?.to_string();

    let mut vars = BTreeMap::new();
    vars.insert("start".to_string(), Value::Str(path.from_id.clone()));
    vars.insert("target".to_string(), Value::Str(path.to_id.clone()));
    vars.insert("depth".to_string(), Value::Int(depth as i64));

    let text = format!(
        "FOR v, e, p IN 1..@depth ANY @start {edges} \
         OPTIONS {{uniqueVertices: \"path\"}} \
         FILTER v.id == @target \
         RETURN {{vertices: p.vertices, edges: p.edges}}"
    );
    Ok(GraphStatement::new(text, vars))
}

fn render_expr(expr: &Expr, binds: &mut BindVars) -> Result<String> {
    match expr {
        Expr::Compare { field, op, value } => {
            let column = safe_identifier(&field.name)?;
            let is_timestamp = matches!(value, Literal::Duration(_));
            let rhs = if is_timestamp {
                let var = binds.push(literal_value(value));
                format!("DATE_SUBTRACT(DATE_NOW(), {var}, \"second\")")
            } else {
                binds.push(literal_value(value))
            };
            Ok(format!("doc.{column} {} {rhs}", graph_op(*op)))
        }
        Expr::Contains { field, value } => {
            let column = safe_identifier(&field.name)?;
            let var = binds.push(literal_value(value));
            Ok(format!("CONTAINS(doc.{column}, {var})"))
        }
        Expr::Like { field, value } => {
            let column = safe_identifier(&field.name)?;
            let var = binds.push(literal_value(value));
            Ok(format!("doc.{column} LIKE {var}"))
        }
        Expr::In { field, values } => {
            let column = safe_identifier(&field.name)?;
            if values.iter().all(|v| matches!(v, Literal::Str(_))) {
                let items = values
                    .iter()
                    .filter_map(|v| match v {
                        Literal::Str(s) => Some(s.clone()),
                        _ => None,
                    })
                    .collect();
                let var = binds.push(Value::StrList(items));
                Ok(format!("doc.{column} IN {var}"))
            } else {
                let vars: Vec<String> = values
                    .iter()
                    .map(|v| binds.push(literal_value(v)))
                    .collect();
                Ok(format!("doc.{column} IN [{}]", vars.join(", ")))
            }
        }
        Expr::Between { field, low, high } => {
            let column = safe_identifier(&field.name)?;
            let low_var = binds.push(literal_value(low));
            let high_var = binds.push(literal_value(high));
            Ok(format!(
                "(doc.{column} >= {low_var} AND doc.{column} <= {high_var})"
            ))
        }
        Expr::And(left, right) => Ok(format!(
            "({} AND {})",
            render_expr(left, binds)?,
            render_expr(right, binds)?
        )),
        Expr::Or(left, right) => Ok(format!(
            "({} OR {})",
            render_expr(left, binds)?,
            render_expr(right, binds)?
        )),
        Expr::Not(inner) => Ok(format!("NOT ({})", render_expr(inner, binds)?)),
    }
}

fn graph_op(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "==",
        CompareOp::Neq => "!=",
        CompareOp::Lt => "<",
        CompareOp::LtEq => "<=",
        CompareOp::Gt => ">",
        CompareOp::GtEq => ">=",
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::{Binder, BoundQuery, BoundStream};
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

    fn generate(input: &str) -> GraphStatement {
        let q = bound(input);
        let spec = GraphQuerySpec {
            entity: &q.entity,
            filter: q.local_filter.as_ref(),
            order_by: &q.order_by,
            limit: q.limit,
            push_order_limit: true,
            key_filter: None,
        };
        generate_graph(&spec).unwrap().0
    }

    #[test]
    fn test_filter_scan_shape() {
        let stmt = generate("STREAM devices WHERE site = 'dc-east' AND up = true LIMIT 50");
        assert_eq!(
            stmt.text,
            "FOR doc IN devices FILTER (doc.site == @p1 AND doc.up == @p2) \
             LIMIT @p3 RETURN doc"
        );
        assert_eq!(stmt.bind_vars["p1"], Value::Str("dc-east".into()));
        assert_eq!(stmt.bind_vars["p2"], Value::Bool(true));
        assert_eq!(stmt.bind_vars["p3"], Value::Int(50));
    }

    #[test]
    fn test_sort_direction() {
        let stmt = generate("STREAM devices ORDER BY hostname DESC, site");
        assert!(stmt.text.contains("SORT doc.hostname DESC, doc.site ASC"));
    }

    #[test]
    fn test_duration_compare_relative_to_now() {
        let stmt = generate("STREAM devices WHERE last_seen > 1h");
        assert!(stmt
            .text
            .contains("doc.last_seen > DATE_SUBTRACT(DATE_NOW(), @p1, \"second\")"));
        assert_eq!(stmt.bind_vars["p1"], Value::Int(3600));
    }

    #[test]
    fn test_contains_and_in() {
        let stmt =
            generate("STREAM devices WHERE hostname CONTAINS 'sw-' AND vendor IN ('acme', 'initech')");
        assert!(stmt.text.contains("CONTAINS(doc.hostname, @p1)"));
        assert!(stmt.text.contains("doc.vendor IN @p2"));
        assert_eq!(
            stmt.bind_vars["p2"],
            Value::StrList(vec!["acme".into(), "initech".into()])
        );
    }

    #[test]
    fn test_key_filter_adds_slot() {
        let q = bound("STREAM devices WHERE site = 'dc-east'");
        let spec = GraphQuerySpec {
            entity: &q.entity,
            filter: q.local_filter.as_ref(),
            order_by: &[],
            limit: None,
            push_order_limit: false,
            key_filter: Some("id"),
        };
        let (stmt, key_slot) = generate_graph(&spec).unwrap();
        assert_eq!(key_slot.as_deref(), Some(KEY_BIND_VAR));
        assert!(stmt.text.contains("doc.id IN @keys"));
        assert_eq!(stmt.bind_vars["keys"], Value::StrList(Vec::new()));
    }

    #[test]
    fn test_path_traversal() {
        let query = parse("SHOW PATH FROM device 'sw-01' TO device 'sw-09' WITHIN 4 HOPS").unwrap();
        let path = match Binder::new(Arc::new(builtin_snapshot())).bind(&query).unwrap() {
            BoundQuery::Path(p) => p,
            other => panic!("expected path, got {other:?}"),
        };
        let stmt = generate_path(&path, 4).unwrap();
        assert_eq!(
            stmt.text,
            "FOR v, e, p IN 1..@depth ANY @start topology_edges \
             OPTIONS {uniqueVertices: \"path\"} \
             FILTER v.id == @target \
             RETURN {vertices: p.vertices, edges: p.edges}"
        );
        assert_eq!(stmt.bind_vars["start"], Value::Str("sw-01".into()));
        assert_eq!(stmt.bind_vars["target"], Value::Str("sw-09".into()));
        assert_eq!(stmt.bind_vars["depth"], Value::Int(4));
    }
}
