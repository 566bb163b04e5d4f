//! Abstract syntax tree for SRQL queries.
//!
//! Equality on AST nodes ignores source positions, so a parsed query
//! compares equal to the parse of its canonical printing.

use crate::token::Pos;
use serde::Serialize;

/// A node paired with the position it was parsed at. Positions are
/// carried for diagnostics only and do not participate in equality.
#[derive(Debug, Clone, Serialize)]
pub struct Spanned<T> {
    pub node: T,
    #[serde(skip)]
    pub pos: Pos,
}

impl<T: PartialEq> PartialEq for Spanned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<T> Spanned<T> {
    pub fn new(node: T, pos: Pos) -> Self {
        Spanned { node, pos }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Query {
    Stream(StreamQuery),
    Path(PathQuery),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamQuery {
    pub entity: Spanned<String>,
    pub join: Option<Join>,
    pub filter: Option<Expr>,
    pub group_by: Vec<FieldRef>,
    pub window: Option<Window>,
    pub having: Option<Expr>,
    pub order_by: Vec<OrderKey>,
    pub limit: Option<u64>,
}

/// `SHOW PATH FROM device 'a' TO device 'b' [WITHIN n HOPS]`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathQuery {
    pub from_entity: Spanned<String>,
    pub from_id: String,
    pub to_entity: Spanned<String>,
    pub to_id: String,
    pub max_hops: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub entity: Spanned<String>,
    pub left: FieldRef,
    pub right: FieldRef,
}

/// A field reference, optionally qualified by an entity name
/// (`devices.hostname`).
#[derive(Debug, Clone, Serialize)]
pub struct FieldRef {
    pub qualifier: Option<String>,
    pub name: String,
    #[serde(skip)]
    pub pos: Pos,
}

impl PartialEq for FieldRef {
    fn eq(&self, other: &Self) -> bool {
        self.qualifier == other.qualifier && self.name == other.name
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Window {
    pub size_seconds: u64,
    pub mode: WindowMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum WindowMode {
    Tumble,
    Hop { slide_seconds: u64 },
    Session { gap_seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderKey {
    pub field: FieldRef,
    pub descending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Duration in whole seconds.
    Duration(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    Compare {
        field: FieldRef,
        op: CompareOp,
        value: Literal,
    },
    Contains {
        field: FieldRef,
        value: Literal,
    },
    Like {
        field: FieldRef,
        value: Literal,
    },
    In {
        field: FieldRef,
        values: Vec<Literal>,
    },
    Between {
        field: FieldRef,
        low: Literal,
        high: Literal,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    /// Every field referenced anywhere in this expression, left to right.
    pub fn fields(&self) -> Vec<&FieldRef> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a FieldRef>) {
        match self {
            Expr::Compare { field, .. }
            | Expr::Contains { field, .. }
            | Expr::Like { field, .. }
            | Expr::In { field, .. }
            | Expr::Between { field, .. } => out.push(field),
            Expr::And(left, right) | Expr::Or(left, right) => {
                left.collect_fields(out);
                right.collect_fields(out);
            }
            Expr::Not(inner) => inner.collect_fields(out),
        }
    }
}
