//! Canonical printing of SRQL queries.
//!
//! The printed form uses uppercase keywords, single spaces, and the
//! largest duration unit that divides evenly. Parsing the printed form
//! yields a structurally identical AST, which makes the canonical text
//! a stable plan-cache key.

use crate::ast::{
    CompareOp, Expr, FieldRef, Literal, PathQuery, Query, StreamQuery, WindowMode,
};
use std::fmt;

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Stream(q) => q.fmt(f),
            Query::Path(q) => q.fmt(f),
        }
    }
}

impl fmt::Display for StreamQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "STREAM {}", self.entity.node)?;
        if let Some(join) = &self.join {
            write!(
                f,
                " JOIN {} ON {} = {}",
                join.entity.node, join.left, join.right
            )?;
        }
        if let Some(filter) = &self.filter {
            write!(f, " WHERE {}", ExprAtPrec(filter, 0))?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", join_fields(&self.group_by))?;
        }
        if let Some(window) = &self.window {
            write!(f, " WINDOW {}", format_duration(window.size_seconds))?;
            match window.mode {
                WindowMode::Tumble => write!(f, " TUMBLE")?,
                WindowMode::Hop { slide_seconds } => {
                    write!(f, " HOP {}", format_duration(slide_seconds))?
                }
                WindowMode::Session { gap_seconds } => {
                    write!(f, " SESSION {}", format_duration(gap_seconds))?
                }
            }
        }
        if let Some(having) = &self.having {
            write!(f, " HAVING {}", ExprAtPrec(having, 0))?;
        }
        if !self.order_by.is_empty() {
            let keys: Vec<String> = self
                .order_by
                .iter()
                .map(|k| {
                    format!(
                        "{} {}",
                        k.field,
                        if k.descending { "DESC" } else { "ASC" }
                    )
                })
                .collect();
            write!(f, " ORDER BY {}", keys.join(", "))?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        Ok(())
    }
}

impl fmt::Display for PathQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SHOW PATH FROM {} {} TO {} {}",
            self.from_entity.node,
            quote(&self.from_id),
            self.to_entity.node,
            quote(&self.to_id)
        )?;
        if let Some(hops) = self.max_hops {
            write!(f, " WITHIN {hops} HOPS")?;
        }
        Ok(())
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{qualifier}.{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(value) => write!(f, "{}", quote(value)),
            Literal::Int(value) => write!(f, "{value}"),
            Literal::Float(value) => write!(f, "{value:?}"),
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Duration(seconds) => write!(f, "{}", format_duration(*seconds)),
        }
    }
}

/// Precedence levels: 0 = OR, 1 = AND, 2 = NOT and predicates. A child
/// printed at a context above its own precedence gets parentheses, so
/// the printed text reparses to the same tree shape.
struct ExprAtPrec<'a>(&'a Expr, u8);

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Or(_, _) => 0,
        Expr::And(_, _) => 1,
        _ => 2,
    }
}

impl fmt::Display for ExprAtPrec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ExprAtPrec(expr, min_prec) = *self;
        let prec = precedence(expr);
        if prec < min_prec {
            write!(f, "(")?;
        }
        match expr {
            Expr::Compare { field, op, value } => {
                write!(f, "{field} {} {value}", op.as_str())?
            }
            Expr::Contains { field, value } => write!(f, "{field} CONTAINS {value}")?,
            Expr::Like { field, value } => write!(f, "{field} LIKE {value}")?,
            Expr::In { field, values } => {
                let items: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{field} IN ({})", items.join(", "))?;
            }
            Expr::Between { field, low, high } => {
                write!(f, "{field} BETWEEN {low} AND {high}")?
            }
            Expr::And(left, right) => {
                // Right operand is printed one level tighter so a nested
                // AND on the right keeps its parentheses.
                write!(f, "{} AND {}", ExprAtPrec(left, 1), ExprAtPrec(right, 2))?;
            }
            Expr::Or(left, right) => {
                write!(f, "{} OR {}", ExprAtPrec(left, 0), ExprAtPrec(right, 1))?;
            }
            Expr::Not(inner) => write!(f, "NOT {}", ExprAtPrec(inner, 2))?,
        }
        if prec < min_prec {
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn join_fields(fields: &[FieldRef]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn quote(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

/// Render seconds using the largest unit that divides evenly.
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }
    if seconds % 86_400 == 0 {
        format!("{}d", seconds / 86_400)
    } else if seconds % 3600 == 0 {
        format!("{}h", seconds / 3600)
    } else if seconds % 60 == 0 {
        format!("{}m", seconds / 60)
    } else {
        format!("{seconds}s")
    }
}

/// Canonicalise query text: parse and print. Two queries that differ
/// only in keyword case, whitespace, or duration spelling normalise to
/// the same string.
pub fn normalize(input: &str) -> srql_error::Result<String> {
    crate::parser::parse(input).map(|query| query.to_string())
}
