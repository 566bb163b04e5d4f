//! Recursive-descent parser for SRQL.
//!
//! Clauses appear in a fixed order: `STREAM [FROM] entity [JOIN ... ON ...]
//! [WHERE ...] [GROUP BY ...] [WINDOW ...] [HAVING ...] [ORDER BY ...]
//! [LIMIT n]`, or `SHOW PATH FROM entity 'id' TO entity 'id'
//! [WITHIN n HOPS]`.

use crate::ast::{
    CompareOp, Expr, FieldRef, Join, Literal, OrderKey, PathQuery, Query, Spanned, StreamQuery,
    Window, WindowMode,
};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};
use srql_error::{ErrorCode, ErrorContext, Result, SrqlError};

/// Parse a complete SRQL query.
pub fn parse(input: &str) -> Result<Query> {
    let tokens = Lexer::new(input).tokenize()?;
    let mut parser = Parser {
        tokens,
        position: 0,
    };
    let query = parser.parse_query()?;
    parser.expect_eof()?;
    Ok(query)
}

struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    fn current(&self) -> &Token {
        // The token stream always ends with Eof, which is never consumed.
        &self.tokens[self.position.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.current().clone();
        if token.kind != TokenKind::Eof {
            self.position += 1;
        }
        token
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if &self.current().kind == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.current().kind == kind {
            Ok(self.advance())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_eof(&mut self) -> Result<()> {
        if self.current().kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(self.error("end of query"))
        }
    }

    fn error(&self, expected: &str) -> SrqlError {
        let token = self.current();
        SrqlError::new(
            ErrorCode::UnexpectedToken,
            format!("Expected {expected}, found {}", token.describe()),
        )
        .with_context(ErrorContext::Syntax {
            position: token.pos.offset,
            line: token.pos.line,
            column: token.pos.column,
            expected: expected.to_string(),
            found: token.describe(),
        })
    }

    fn parse_query(&mut self) -> Result<Query> {
        match self.current().kind {
            TokenKind::Stream => self.parse_stream().map(Query::Stream),
            TokenKind::Show => self.parse_path().map(Query::Path),
            _ => Err(self.error("STREAM or SHOW PATH")),
        }
    }

    fn parse_stream(&mut self) -> Result<StreamQuery> {
        self.expect(TokenKind::Stream, "STREAM")?;
        // FROM is optional noise after STREAM.
        self.eat(&TokenKind::From);
        let entity = self.parse_entity_name()?;

        let join = if self.eat(&TokenKind::Join) {
            Some(self.parse_join()?)
        } else {
            None
        };

        let filter = if self.eat(&TokenKind::Where) {
            Some(self.parse_expr()?)
        } else {
            None
        };

        let group_by = if self.eat(&TokenKind::Group) {
            self.expect(TokenKind::By, "BY")?;
            self.parse_field_list()?
        } else {
            Vec::new()
        };

        let window = if self.eat(&TokenKind::Window) {
            Some(self.parse_window()?)
        } else {
            None
        };

        let having = if self.current().kind == TokenKind::Having {
            if group_by.is_empty() {
                return Err(self.error("GROUP BY before HAVING"));
            }
            self.advance();
            Some(self.parse_expr()?)
        } else {
            None
        };

        let order_by = if self.eat(&TokenKind::Order) {
            self.expect(TokenKind::By, "BY")?;
            self.parse_order_keys()?
        } else {
            Vec::new()
        };

        let limit = if self.eat(&TokenKind::Limit) {
            Some(self.parse_limit()?)
        } else {
            None
        };

        Ok(StreamQuery {
            entity,
            join,
            filter,
            group_by,
            window,
            having,
            order_by,
            limit,
        })
    }

    fn parse_path(&mut self) -> Result<PathQuery> {
        self.expect(TokenKind::Show, "SHOW")?;
        self.expect(TokenKind::Path, "PATH")?;
        self.expect(TokenKind::From, "FROM")?;
        let from_entity = self.parse_entity_name()?;
        let from_id = self.parse_endpoint()?;
        self.expect(TokenKind::To, "TO")?;
        let to_entity = self.parse_entity_name()?;
        let to_id = self.parse_endpoint()?;

        let max_hops = if self.eat(&TokenKind::Within) {
            let hops = match self.current().kind {
                TokenKind::IntLit(n) if n > 0 => {
                    let hops =
                        u32::try_from(n).map_err(|_| self.error("a smaller hop count"))?;
                    self.advance();
                    hops
                }
                _ => return Err(self.error("a positive hop count")),
            };
            self.expect(TokenKind::Hops, "HOPS")?;
            Some(hops)
        } else {
            None
        };

        Ok(PathQuery {
            from_entity,
            from_id,
            to_entity,
            to_id,
            max_hops,
        })
    }

    fn parse_entity_name(&mut self) -> Result<Spanned<String>> {
        match self.current().kind.clone() {
            TokenKind::Ident(name) => {
                let pos = self.current().pos;
                self.advance();
                Ok(Spanned::new(name, pos))
            }
            _ => Err(self.error("an entity name")),
        }
    }

    /// Path endpoints accept a quoted string or a bare identifier.
    fn parse_endpoint(&mut self) -> Result<String> {
        match self.current().kind.clone() {
            TokenKind::StringLit(value) | TokenKind::Ident(value) => {
                self.advance();
                Ok(value)
            }
            _ => Err(self.error("an endpoint identifier")),
        }
    }

    fn parse_join(&mut self) -> Result<Join> {
        let entity = self.parse_entity_name()?;
        self.expect(TokenKind::On, "ON")?;
        let left = self.parse_field_ref()?;
        self.expect(TokenKind::Eq, "'='")?;
        let right = self.parse_field_ref()?;
        Ok(Join {
            entity,
            left,
            right,
        })
    }

    fn parse_window(&mut self) -> Result<Window> {
        let size_seconds = self.parse_duration("a window size")?;
        let mode = match self.current().kind {
            TokenKind::Tumble => {
                self.advance();
                WindowMode::Tumble
            }
            TokenKind::Hop => {
                self.advance();
                let slide_seconds = self.parse_duration("a hop slide duration")?;
                WindowMode::Hop { slide_seconds }
            }
            TokenKind::Session => {
                self.advance();
                let gap_seconds = self.parse_duration("a session gap duration")?;
                WindowMode::Session { gap_seconds }
            }
            _ => WindowMode::Tumble,
        };
        Ok(Window {
            size_seconds,
            mode,
        })
    }

    fn parse_duration(&mut self, expected: &str) -> Result<u64> {
        match self.current().kind {
            TokenKind::DurationLit(seconds) => {
                self.advance();
                Ok(seconds)
            }
            _ => Err(self.error(expected)),
        }
    }

    fn parse_field_list(&mut self) -> Result<Vec<FieldRef>> {
        let mut fields = vec![self.parse_field_ref()?];
        while self.eat(&TokenKind::Comma) {
            fields.push(self.parse_field_ref()?);
        }
        Ok(fields)
    }

    fn parse_order_keys(&mut self) -> Result<Vec<OrderKey>> {
        let mut keys = Vec::new();
        loop {
            let field = self.parse_field_ref()?;
            let descending = if self.eat(&TokenKind::Desc) {
                true
            } else {
                self.eat(&TokenKind::Asc);
                false
            };
            keys.push(OrderKey { field, descending });
            if !self.eat(&TokenKind::Comma) {
                return Ok(keys);
            }
        }
    }

    fn parse_limit(&mut self) -> Result<u64> {
        match self.current().kind {
            TokenKind::IntLit(n) if n >= 0 => {
                self.advance();
                Ok(n as u64)
            }
            _ => Err(self.error("a non-negative limit")),
        }
    }

    fn parse_field_ref(&mut self) -> Result<FieldRef> {
        let pos = self.current().pos;
        let first = match self.current().kind.clone() {
            TokenKind::Ident(name) => {
                self.advance();
                name
            }
            _ => return Err(self.error("a field name")),
        };
        if self.eat(&TokenKind::Dot) {
            let name = match self.current().kind.clone() {
                TokenKind::Ident(name) => {
                    self.advance();
                    name
                }
                _ => return Err(self.error("a field name")),
            };
            Ok(FieldRef {
                qualifier: Some(first),
                name,
                pos,
            })
        } else {
            Ok(FieldRef {
                qualifier: None,
                name: first,
                pos,
            })
        }
    }

    // Expressions: OR binds loosest, then AND, then NOT, then predicates.

    fn parse_expr(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while self.eat(&TokenKind::And) {
            let right = self.parse_unary()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if self.eat(&TokenKind::Not) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        if self.eat(&TokenKind::LParen) {
            let inner = self.parse_expr()?;
            self.expect(TokenKind::RParen, "')'")?;
            return Ok(inner);
        }
        self.parse_predicate()
    }

    fn parse_predicate(&mut self) -> Result<Expr> {
        let field = self.parse_field_ref()?;
        match self.current().kind {
            TokenKind::Eq
            | TokenKind::Neq
            | TokenKind::Lt
            | TokenKind::LtEq
            | TokenKind::Gt
            | TokenKind::GtEq => {
                let op = self.parse_compare_op()?;
                let value = self.parse_literal()?;
                Ok(Expr::Compare { field, op, value })
            }
            TokenKind::Contains => {
                self.advance();
                let value = self.parse_literal()?;
                Ok(Expr::Contains { field, value })
            }
            TokenKind::Like => {
                self.advance();
                let value = self.parse_literal()?;
                Ok(Expr::Like { field, value })
            }
            TokenKind::In => {
                self.advance();
                self.expect(TokenKind::LParen, "'('")?;
                let mut values = vec![self.parse_literal()?];
                while self.eat(&TokenKind::Comma) {
                    values.push(self.parse_literal()?);
                }
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Expr::In { field, values })
            }
            TokenKind::Between => {
                self.advance();
                let low = self.parse_literal()?;
                self.expect(TokenKind::And, "AND")?;
                let high = self.parse_literal()?;
                Ok(Expr::Between { field, low, high })
            }
            _ => Err(self.error("a comparison operator")),
        }
    }

    fn parse_compare_op(&mut self) -> Result<CompareOp> {
        let op = match self.current().kind {
            TokenKind::Eq => CompareOp::Eq,
            TokenKind::Neq => CompareOp::Neq,
            TokenKind::Lt => CompareOp::Lt,
            TokenKind::LtEq => CompareOp::LtEq,
            TokenKind::Gt => CompareOp::Gt,
            TokenKind::GtEq => CompareOp::GtEq,
            _ => return Err(self.error("a comparison operator")),
        };
        self.advance();
        Ok(op)
    }

    fn parse_literal(&mut self) -> Result<Literal> {
        let literal = match self.current().kind.clone() {
            TokenKind::StringLit(value) => Literal::Str(value),
            TokenKind::IntLit(value) => Literal::Int(value),
            TokenKind::FloatLit(value) => Literal::Float(value),
            TokenKind::BoolLit(value) => Literal::Bool(value),
            TokenKind::DurationLit(seconds) => Literal::Duration(seconds),
            _ => return Err(self.error("a literal value")),
        };
        self.advance();
        Ok(literal)
    }
}
