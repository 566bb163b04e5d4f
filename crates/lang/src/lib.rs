//! # srql-lang
//!
//! The SRQL front end: lexer, recursive-descent parser, AST, and a
//! canonical printer. Parsing is pure and infallible queries round-trip
//! through the printer, which downstream crates rely on for plan-cache
//! keys.

pub mod ast;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod token;

pub use ast::{
    CompareOp, Expr, FieldRef, Join, Literal, OrderKey, PathQuery, Query, Spanned, StreamQuery,
    Window, WindowMode,
};
pub use parser::parse;
pub use printer::{format_duration, normalize};
pub use token::Pos;
