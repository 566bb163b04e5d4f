//! The binder: resolves a parsed query against a catalog snapshot.
//!
//! Binding attaches schemas, routes WHERE predicates to the side of a
//! join that owns their fields, and rejects queries that reference
//! unknown entities or fields, mix backends inside one predicate, or
//! compare incompatible types. All diagnostics carry source positions.

use srql_catalog::{BackendKind, CatalogSnapshot, EntitySchema, FieldType};
use srql_error::{ErrorCode, ErrorContext, Result, SrqlError};
use srql_lang::{CompareOp, Expr, FieldRef, Literal, PathQuery, Query, StreamQuery, Window};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum BoundQuery {
    Stream(BoundStream),
    Path(BoundPath),
}

#[derive(Debug, Clone)]
pub struct BoundStream {
    pub entity: EntitySchema,
    pub join: Option<BoundJoin>,
    /// Predicates owned by the FROM entity.
    pub local_filter: Option<Expr>,
    /// Predicates owned by the joined entity.
    pub remote_filter: Option<Expr>,
    pub group_by: Vec<String>,
    pub window: Option<Window>,
    pub having: Option<Expr>,
    pub order_by: Vec<(String, bool)>,
    pub limit: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct BoundJoin {
    pub entity: EntitySchema,
    /// Join key on the FROM entity.
    pub local_key: String,
    /// Join key on the joined entity.
    pub remote_key: String,
    pub cross_backend: bool,
}

#[derive(Debug, Clone)]
pub struct BoundPath {
    pub entity: EntitySchema,
    pub edge_collection: String,
    pub from_id: String,
    pub to_id: String,
    pub max_hops: Option<u32>,
}

impl BoundStream {
    pub fn is_cross_backend(&self) -> bool {
        self.join.as_ref().is_some_and(|j| j.cross_backend)
    }

    pub fn is_aggregate(&self) -> bool {
        !self.group_by.is_empty() || self.window.is_some()
    }

    /// Oldest relative time bound in the local filter, in seconds. `None`
    /// when the query carries no duration predicate on the time field.
    pub fn oldest_time_bound_seconds(&self) -> Option<u64> {
        let time_field = self.entity.time_field.as_deref()?;
        let filter = self.local_filter.as_ref()?;
        let mut oldest = None;
        for conjunct in conjuncts(filter) {
            if let Expr::Compare {
                field,
                value: Literal::Duration(seconds),
                ..
            } = conjunct
            {
                if field.name == time_field {
                    oldest = Some(oldest.map_or(*seconds, |o: u64| o.max(*seconds)));
                }
            }
        }
        oldest
    }
}

/// Flatten a filter into its top-level AND conjuncts.
pub fn conjuncts(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::And(left, right) => {
            let mut out = conjuncts(left);
            out.extend(conjuncts(right));
            out
        }
        other => vec![other],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Primary,
    Joined,
}

pub struct Binder {
    snapshot: Arc<CatalogSnapshot>,
}

impl Binder {
    pub fn new(snapshot: Arc<CatalogSnapshot>) -> Self {
        Binder { snapshot }
    }

    pub fn bind(&self, query: &Query) -> Result<BoundQuery> {
        match query {
            Query::Stream(q) => self.bind_stream(q).map(BoundQuery::Stream),
            Query::Path(q) => self.bind_path(q).map(BoundQuery::Path),
        }
    }

    fn bind_stream(&self, query: &StreamQuery) -> Result<BoundStream> {
        let entity = self.lookup_entity(&query.entity.node, query.entity.pos.offset)?;

        let join = match &query.join {
            Some(join) => Some(self.bind_join(&entity, join)?),
            None => None,
        };

        let (local_filter, remote_filter) = match &query.filter {
            Some(filter) => self.route_filter(filter, &entity, join.as_ref())?,
            None => (None, None),
        };

        if !query.group_by.is_empty() && entity.backend == BackendKind::Graph {
            return Err(graph_clause_error(&entity, "GROUP BY"));
        }
        if query.window.is_some() && entity.backend == BackendKind::Graph {
            return Err(graph_clause_error(&entity, "WINDOW"));
        }

        let group_by = query
            .group_by
            .iter()
            .map(|field| {
                let (side, name) = self.resolve_field(field, &entity, join.as_ref())?;
                if side == Side::Joined {
                    Err(SrqlError::new(
                        ErrorCode::UnsupportedCrossBackend,
                        format!("GROUP BY field '{name}' belongs to the joined entity"),
                    )
                    .with_hint("Group by fields of the FROM entity"))
                } else {
                    Ok(name)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let aggregate = !group_by.is_empty() || query.window.is_some();

        let having = match &query.having {
            Some(having) => {
                self.check_aggregate_expr(having, &entity, &group_by)?;
                Some(having.clone())
            }
            None => None,
        };

        let order_by = query
            .order_by
            .iter()
            .map(|key| {
                let name = if aggregate {
                    self.resolve_output_column(&key.field, &entity, &group_by)?
                } else {
                    self.resolve_field(&key.field, &entity, join.as_ref())?.1
                };
                Ok((name, key.descending))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(BoundStream {
            entity,
            join,
            local_filter,
            remote_filter,
            group_by,
            window: query.window.clone(),
            having,
            order_by,
            limit: query.limit,
        })
    }

    fn bind_path(&self, query: &PathQuery) -> Result<BoundPath> {
        let entity = self.lookup_path_entity(&query.from_entity.node, query.from_entity.pos.offset)?;
        // Both endpoints must name the same vertex kind.
        let to_entity =
            self.lookup_path_entity(&query.to_entity.node, query.to_entity.pos.offset)?;
        if entity.name != to_entity.name {
            return Err(SrqlError::new(
                ErrorCode::IncompatibleJoin,
                format!(
                    "Path endpoints must share an entity, got '{}' and '{}'",
                    entity.name, to_entity.name
                ),
            )
            .with_context(ErrorContext::Join {
                left_entity: entity.name.clone(),
                right_entity: to_entity.name.clone(),
                reason: "path endpoints differ".to_string(),
            }));
        }

        let edge_collection = self
            .snapshot
            .entity("topology")
            .and_then(|t| t.edge_collection.clone())
            .ok_or_else(|| {
                SrqlError::new(
                    ErrorCode::CatalogUnavailable,
                    "Catalog declares no topology edge collection",
                )
            })?;

        Ok(BoundPath {
            entity,
            edge_collection,
            from_id: query.from_id.clone(),
            to_id: query.to_id.clone(),
            max_hops: query.max_hops,
        })
    }

    fn lookup_entity(&self, name: &str, position: usize) -> Result<EntitySchema> {
        self.snapshot
            .entity(name)
            .cloned()
            .ok_or_else(|| self.unknown_entity(name, position))
    }

    /// `SHOW PATH FROM device ...` accepts the singular form.
    fn lookup_path_entity(&self, name: &str, position: usize) -> Result<EntitySchema> {
        let entity = self
            .snapshot
            .resolve_entity(name)
            .cloned()
            .ok_or_else(|| self.unknown_entity(name, position))?;
        if entity.backend != BackendKind::Graph {
            return Err(SrqlError::new(
                ErrorCode::UnsupportedCrossBackend,
                format!("Entity '{}' is not a graph entity", entity.name),
            )
            .with_hint("Path queries traverse graph entities such as 'devices'"));
        }
        Ok(entity)
    }

    fn unknown_entity(&self, name: &str, position: usize) -> SrqlError {
        SrqlError::new(
            ErrorCode::UnknownEntity,
            format!("Unknown entity '{name}'"),
        )
        .with_context(ErrorContext::UnknownEntity {
            entity: name.to_string(),
            position,
            available_entities: self.snapshot.entity_names(),
        })
        .with_hint("Check the schema catalog for available entities")
    }

    fn bind_join(&self, primary: &EntitySchema, join: &srql_lang::Join) -> Result<BoundJoin> {
        let joined = self.lookup_entity(&join.entity.node, join.entity.pos.offset)?;
        if joined.name == primary.name {
            return Err(SrqlError::new(
                ErrorCode::IncompatibleJoin,
                format!("Cannot join entity '{}' to itself", primary.name),
            ));
        }

        let left = self.resolve_join_field(&join.left, primary, &joined)?;
        let right = self.resolve_join_field(&join.right, primary, &joined)?;
        let ((_, local_key), (_, remote_key)) = match (left, right) {
            (l @ (Side::Primary, _), r @ (Side::Joined, _)) => (l, r),
            (r @ (Side::Joined, _), l @ (Side::Primary, _)) => (l, r),
            ((side, _), _) => {
                return Err(SrqlError::new(
                    ErrorCode::IncompatibleJoin,
                    "Join condition must relate one field from each entity",
                )
                .with_context(ErrorContext::Join {
                    left_entity: primary.name.clone(),
                    right_entity: joined.name.clone(),
                    reason: format!(
                        "both join keys resolve to the {} entity",
                        match side {
                            Side::Primary => "FROM",
                            Side::Joined => "joined",
                        }
                    ),
                }));
            }
        };

        let local_type = field_type(primary, &local_key);
        let remote_type = field_type(&joined, &remote_key);
        if let (Some(l), Some(r)) = (local_type, remote_type) {
            if l != r && !(l.is_numeric() && r.is_numeric()) {
                return Err(SrqlError::new(
                    ErrorCode::IncompatibleJoin,
                    format!(
                        "Join keys '{local_key}' and '{remote_key}' have incompatible types"
                    ),
                )
                .with_context(ErrorContext::Join {
                    left_entity: primary.name.clone(),
                    right_entity: joined.name.clone(),
                    reason: "join key type mismatch".to_string(),
                }));
            }
        }

        let cross_backend = primary.backend != joined.backend;
        Ok(BoundJoin {
            entity: joined,
            local_key,
            remote_key,
            cross_backend,
        })
    }

    fn resolve_join_field(
        &self,
        field: &FieldRef,
        primary: &EntitySchema,
        joined: &EntitySchema,
    ) -> Result<(Side, String)> {
        match &field.qualifier {
            Some(qualifier) if qualifier == &primary.name => {
                self.require_field(primary, field).map(|n| (Side::Primary, n))
            }
            Some(qualifier) if qualifier == &joined.name => {
                self.require_field(joined, field).map(|n| (Side::Joined, n))
            }
            Some(qualifier) => Err(self.unknown_entity(qualifier, field.pos.offset)),
            None => {
                if primary.field(&field.name).is_some() {
                    Ok((Side::Primary, field.name.clone()))
                } else if joined.field(&field.name).is_some() {
                    Ok((Side::Joined, field.name.clone()))
                } else {
                    Err(self.unknown_field(primary, field))
                }
            }
        }
    }

    fn require_field(&self, entity: &EntitySchema, field: &FieldRef) -> Result<String> {
        if entity.field(&field.name).is_some() {
            Ok(field.name.clone())
        } else {
            Err(self.unknown_field(entity, field))
        }
    }

    fn unknown_field(&self, entity: &EntitySchema, field: &FieldRef) -> SrqlError {
        SrqlError::new(
            ErrorCode::UnknownField,
            format!("Unknown field '{}' on entity '{}'", field.name, entity.name),
        )
        .with_context(ErrorContext::UnknownField {
            field: field.name.clone(),
            entity: entity.name.clone(),
            position: field.pos.offset,
            available_fields: entity.field_names(),
        })
    }

    fn resolve_field(
        &self,
        field: &FieldRef,
        primary: &EntitySchema,
        join: Option<&BoundJoin>,
    ) -> Result<(Side, String)> {
        if let Some(join) = join {
            return self.resolve_join_field(field, primary, &join.entity);
        }
        if field.qualifier.as_deref().is_some_and(|q| q != primary.name) {
            let qualifier = field.qualifier.as_deref().unwrap_or_default();
            return Err(self.unknown_entity(qualifier, field.pos.offset));
        }
        if primary.field(&field.name).is_some() {
            Ok((Side::Primary, field.name.clone()))
        } else {
            Err(self.unknown_field(primary, field))
        }
    }

    /// Resolve a HAVING/ORDER BY reference in an aggregate query: group
    /// keys and the entity's derived aggregate columns are in scope.
    fn resolve_output_column(
        &self,
        field: &FieldRef,
        entity: &EntitySchema,
        group_by: &[String],
    ) -> Result<String> {
        if group_by.iter().any(|g| g == &field.name)
            || entity.derived_column(&field.name).is_some()
        {
            return Ok(field.name.clone());
        }
        let mut available: Vec<String> = group_by.to_vec();
        available.extend(entity.derived_columns().into_iter().map(|(n, _)| n));
        Err(SrqlError::new(
            ErrorCode::UnknownField,
            format!(
                "Column '{}' is not a group key or derived aggregate of '{}'",
                field.name, entity.name
            ),
        )
        .with_context(ErrorContext::UnknownField {
            field: field.name.clone(),
            entity: entity.name.clone(),
            position: field.pos.offset,
            available_fields: available,
        })
        .with_hint("Aggregate queries expose group keys, avg_/min_/max_ columns, and sample_count"))
    }

    fn check_aggregate_expr(
        &self,
        expr: &Expr,
        entity: &EntitySchema,
        group_by: &[String],
    ) -> Result<()> {
        for field in expr.fields() {
            self.resolve_output_column(field, entity, group_by)?;
        }
        Ok(())
    }

    /// Split WHERE into per-side filters. Each top-level conjunct must be
    /// wholly owned by one side of the join.
    fn route_filter(
        &self,
        filter: &Expr,
        primary: &EntitySchema,
        join: Option<&BoundJoin>,
    ) -> Result<(Option<Expr>, Option<Expr>)> {
        let mut local: Option<Expr> = None;
        let mut remote: Option<Expr> = None;

        for conjunct in conjuncts(filter) {
            let mut side: Option<Side> = None;
            for field in conjunct.fields() {
                let (owner, _) = self.resolve_field(field, primary, join)?;
                match side {
                    None => side = Some(owner),
                    Some(existing) if existing == owner => {}
                    Some(_) => {
                        return Err(SrqlError::new(
                            ErrorCode::UnsupportedCrossBackend,
                            "A predicate may not mix fields from both sides of a join",
                        )
                        .with_hint(
                            "Split the condition into separate AND clauses, one per entity",
                        ));
                    }
                }
            }
            self.check_types(conjunct, primary, join)?;
            let target = match side.unwrap_or(Side::Primary) {
                Side::Primary => &mut local,
                Side::Joined => &mut remote,
            };
            *target = Some(match target.take() {
                Some(existing) => {
                    Expr::And(Box::new(existing), Box::new(conjunct.clone()))
                }
                None => conjunct.clone(),
            });
        }

        Ok((local, remote))
    }

    fn check_types(
        &self,
        expr: &Expr,
        primary: &EntitySchema,
        join: Option<&BoundJoin>,
    ) -> Result<()> {
        match expr {
            Expr::Compare { field, value, .. } => {
                self.check_literal(field, value, primary, join)
            }
            Expr::Contains { field, value } | Expr::Like { field, value } => {
                let owner = self.owner_schema(field, primary, join)?;
                let field_ty = field_type(owner, &field.name);
                if field_ty != Some(FieldType::Str) || !matches!(value, Literal::Str(_)) {
                    return Err(type_mismatch(owner, field, "a string field and pattern"));
                }
                Ok(())
            }
            Expr::In { field, values } => {
                for value in values {
                    self.check_literal(field, value, primary, join)?;
                }
                Ok(())
            }
            Expr::Between { field, low, high } => {
                self.check_literal(field, low, primary, join)?;
                self.check_literal(field, high, primary, join)
            }
            Expr::And(left, right) | Expr::Or(left, right) => {
                self.check_types(left, primary, join)?;
                self.check_types(right, primary, join)
            }
            Expr::Not(inner) => self.check_types(inner, primary, join),
        }
    }

    fn owner_schema<'a>(
        &self,
        field: &FieldRef,
        primary: &'a EntitySchema,
        join: Option<&'a BoundJoin>,
    ) -> Result<&'a EntitySchema> {
        let (side, _) = self.resolve_field(field, primary, join)?;
        Ok(match side {
            Side::Primary => primary,
            // resolve_field only returns Joined when a join exists.
            Side::Joined => join.map(|j| &j.entity).unwrap_or(primary),
        })
    }

    fn check_literal(
        &self,
        field: &FieldRef,
        literal: &Literal,
        primary: &EntitySchema,
        join: Option<&BoundJoin>,
    ) -> Result<()> {
        let owner = self.owner_schema(field, primary, join)?;
        let Some(field_ty) = field_type(owner, &field.name) else {
            return Ok(());
        };
        let compatible = match field_ty {
            FieldType::Str => matches!(literal, Literal::Str(_)),
            FieldType::Int | FieldType::Float => {
                matches!(literal, Literal::Int(_) | Literal::Float(_))
            }
            FieldType::Bool => matches!(literal, Literal::Bool(_)),
            // Timestamps compare against durations (relative to now) or
            // ISO-8601 strings.
            FieldType::Timestamp => {
                matches!(literal, Literal::Duration(_) | Literal::Str(_))
            }
        };
        if compatible {
            Ok(())
        } else {
            Err(type_mismatch(
                owner,
                field,
                match field_ty {
                    FieldType::Str => "a string literal",
                    FieldType::Int | FieldType::Float => "a numeric literal",
                    FieldType::Bool => "a boolean literal",
                    FieldType::Timestamp => "a duration or timestamp string",
                },
            ))
        }
    }
}

fn field_type(entity: &EntitySchema, name: &str) -> Option<FieldType> {
    entity.field(name).map(|f| f.field_type)
}

fn type_mismatch(entity: &EntitySchema, field: &FieldRef, expected: &str) -> SrqlError {
    SrqlError::new(
        ErrorCode::TypeMismatch,
        format!(
            "Field '{}' on '{}' expects {expected}",
            field.name, entity.name
        ),
    )
    .with_context(ErrorContext::UnknownField {
        field: field.name.clone(),
        entity: entity.name.clone(),
        position: field.pos.offset,
        available_fields: Vec::new(),
    })
}

fn graph_clause_error(entity: &EntitySchema, clause: &str) -> SrqlError {
    SrqlError::new(
        ErrorCode::InvalidWindowOnGraph,
        format!("{clause} is not supported on graph entity '{}'", entity.name),
    )
    .with_context(ErrorContext::Window {
        entity: entity.name.clone(),
        clause: clause.to_string(),
    })
    .with_hint("Windows and grouping apply to stream entities such as 'metrics'")
}

#[cfg(test)]
mod tests {
    use super::*;
    use srql_catalog::builtin_snapshot;
    use srql_lang::parse;

    fn bind(input: &str) -> Result<BoundQuery> {
        let query = parse(input).unwrap();
        Binder::new(Arc::new(builtin_snapshot())).bind(&query)
    }

    fn bind_stream(input: &str) -> BoundStream {
        match bind(input).unwrap() {
            BoundQuery::Stream(q) => q,
            other => panic!("expected stream, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_entity_lists_candidates() {
        let err = bind("STREAM gadgets").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownEntity);
        match err.context.unwrap() {
            ErrorContext::UnknownEntity {
                available_entities, ..
            } => assert!(available_entities.contains(&"devices".to_string())),
            other => panic!("wrong context: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_field_carries_position() {
        let err = bind("STREAM devices WHERE bogus = 'x'").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownField);
        assert_eq!(err.position(), Some(21));
    }

    #[test]
    fn test_window_on_graph_rejected() {
        let err = bind("STREAM devices GROUP BY site WINDOW 5m").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidWindowOnGraph);
    }

    #[test]
    fn test_filter_routing_by_ownership() {
        let q = bind_stream(
            "STREAM metrics JOIN devices ON device_id = devices.id \
             WHERE metric_name = 'cpu' AND devices.site = 'dc-east' AND value > 10",
        );
        let join = q.join.as_ref().unwrap();
        assert!(join.cross_backend);
        assert_eq!(join.local_key, "device_id");
        assert_eq!(join.remote_key, "id");

        let local_fields: Vec<&str> = q
            .local_filter
            .as_ref()
            .unwrap()
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(local_fields, ["metric_name", "value"]);

        let remote_fields: Vec<&str> = q
            .remote_filter
            .as_ref()
            .unwrap()
            .fields()
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(remote_fields, ["site"]);
    }

    #[test]
    fn test_unqualified_fields_prefer_from_entity() {
        // `name` exists on both services and devices queries must pick
        // the FROM side.
        let q = bind_stream(
            "STREAM services JOIN devices ON device_id = devices.id WHERE name = 'ssh'",
        );
        assert!(q.local_filter.is_some());
        assert!(q.remote_filter.is_none());
    }

    #[test]
    fn test_predicate_spanning_both_sides_rejected() {
        let err = bind(
            "STREAM metrics JOIN devices ON device_id = devices.id \
             WHERE metric_name = 'cpu' OR devices.site = 'dc-east'",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedCrossBackend);
    }

    #[test]
    fn test_join_keys_must_span_entities() {
        let err = bind(
            "STREAM metrics JOIN devices ON metrics.device_id = metrics.metric_name",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::IncompatibleJoin);
    }

    #[test]
    fn test_type_mismatch() {
        let err = bind("STREAM metrics WHERE value = 'high'").unwrap_err();
        assert_eq!(err.code, ErrorCode::TypeMismatch);
    }

    #[test]
    fn test_timestamp_accepts_duration() {
        let q = bind_stream("STREAM metrics WHERE timestamp > 1h");
        assert_eq!(q.oldest_time_bound_seconds(), Some(3600));
    }

    #[test]
    fn test_oldest_time_bound_takes_max() {
        let q = bind_stream("STREAM metrics WHERE timestamp > 1h AND timestamp > 2h");
        assert_eq!(q.oldest_time_bound_seconds(), Some(7200));
    }

    #[test]
    fn test_having_resolves_derived_columns() {
        let q = bind_stream(
            "STREAM metrics GROUP BY device_id WINDOW 5m HAVING avg_value > 80 \
             ORDER BY avg_value DESC",
        );
        assert!(q.having.is_some());
        assert_eq!(q.order_by, vec![("avg_value".to_string(), true)]);
    }

    #[test]
    fn test_having_unknown_aggregate_rejected() {
        let err =
            bind("STREAM metrics GROUP BY device_id WINDOW 5m HAVING p99_value > 1").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownField);
        assert!(err.hint.is_some());
    }

    #[test]
    fn test_path_singular_fallback() {
        let bound = match bind("SHOW PATH FROM device 'a' TO device 'b'").unwrap() {
            BoundQuery::Path(p) => p,
            other => panic!("expected path, got {other:?}"),
        };
        assert_eq!(bound.entity.name, "devices");
        assert_eq!(bound.edge_collection, "topology_edges");
    }

    #[test]
    fn test_path_on_stream_entity_rejected() {
        let err = bind("SHOW PATH FROM metrics 'a' TO metrics 'b'").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnsupportedCrossBackend);
    }
}
