//! Token definitions for the SRQL lexer.

use std::fmt;

/// A character offset into the query plus human-readable line/column,
/// both 1-based. The offset counts `char`s, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pos {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Pos {
    pub fn start() -> Self {
        Pos {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Keywords. The lexer matches these case-insensitively.
    Stream,
    From,
    Where,
    Join,
    On,
    Group,
    By,
    Window,
    Tumble,
    Hop,
    Session,
    Having,
    Order,
    Limit,
    Asc,
    Desc,
    Show,
    Path,
    To,
    Within,
    Hops,
    And,
    Or,
    Not,
    In,
    Between,
    Contains,
    Like,

    // Literals and names.
    Ident(String),
    StringLit(String),
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    /// Duration literal normalised to whole seconds.
    DurationLit(u64),

    // Operators and punctuation.
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    LParen,
    RParen,
    Comma,
    Dot,

    Eof,
}

impl TokenKind {
    /// Keyword lookup on an already-lowercased identifier.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "stream" => TokenKind::Stream,
            "from" => TokenKind::From,
            "where" => TokenKind::Where,
            "join" => TokenKind::Join,
            "on" => TokenKind::On,
            "group" => TokenKind::Group,
            "by" => TokenKind::By,
            "window" => TokenKind::Window,
            "tumble" => TokenKind::Tumble,
            "hop" => TokenKind::Hop,
            "session" => TokenKind::Session,
            "having" => TokenKind::Having,
            "order" => TokenKind::Order,
            "limit" => TokenKind::Limit,
            "asc" => TokenKind::Asc,
            "desc" => TokenKind::Desc,
            "show" => TokenKind::Show,
            "path" => TokenKind::Path,
            "to" => TokenKind::To,
            "within" => TokenKind::Within,
            "hops" => TokenKind::Hops,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "not" => TokenKind::Not,
            "in" => TokenKind::In,
            "between" => TokenKind::Between,
            "contains" => TokenKind::Contains,
            "like" => TokenKind::Like,
            "true" => TokenKind::BoolLit(true),
            "false" => TokenKind::BoolLit(false),
            _ => return None,
        };
        Some(kind)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The source text of the token, used verbatim in error messages.
    pub lexeme: String,
    pub pos: Pos,
}

impl Token {
    pub fn describe(&self) -> String {
        match self.kind {
            TokenKind::Eof => "end of input".to_string(),
            _ => format!("'{}'", self.lexeme),
        }
    }
}
