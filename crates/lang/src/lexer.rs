//! Hand-written character-walking lexer for SRQL.
//!
//! Keywords are case-insensitive; identifiers preserve their case.
//! Duration literals (`5m`, `1h`) are normalised to seconds at lex time.

use crate::token::{Pos, Token, TokenKind};
use srql_error::{ErrorCode, ErrorContext, Result, SrqlError};

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Lex the whole input, ending with an `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                return Ok(tokens);
            }
        }
    }

    fn pos(&self) -> Pos {
        Pos {
            offset: self.position,
            line: self.line,
            column: self.column,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.position + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let pos = self.pos();
        let ch = match self.current_char() {
            Some(ch) => ch,
            None => {
                return Ok(Token {
                    kind: TokenKind::Eof,
                    lexeme: String::new(),
                    pos,
                })
            }
        };

        match ch {
            '(' => Ok(self.single(TokenKind::LParen, pos)),
            ')' => Ok(self.single(TokenKind::RParen, pos)),
            ',' => Ok(self.single(TokenKind::Comma, pos)),
            '.' => Ok(self.single(TokenKind::Dot, pos)),
            '=' => Ok(self.single(TokenKind::Eq, pos)),
            '!' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Ok(Token {
                        kind: TokenKind::Neq,
                        lexeme: "!=".to_string(),
                        pos,
                    })
                } else {
                    Err(syntax_error(pos, "'='", &found_char(self.current_char())))
                }
            }
            '<' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Ok(Token {
                        kind: TokenKind::LtEq,
                        lexeme: "<=".to_string(),
                        pos,
                    })
                } else {
                    Ok(Token {
                        kind: TokenKind::Lt,
                        lexeme: "<".to_string(),
                        pos,
                    })
                }
            }
            '>' => {
                self.advance();
                if self.current_char() == Some('=') {
                    self.advance();
                    Ok(Token {
                        kind: TokenKind::GtEq,
                        lexeme: ">=".to_string(),
                        pos,
                    })
                } else {
                    Ok(Token {
                        kind: TokenKind::Gt,
                        lexeme: ">".to_string(),
                        pos,
                    })
                }
            }
            '\'' => self.read_string(pos),
            _ if ch.is_ascii_digit() => self.read_number(pos),
            _ if ch.is_alphabetic() || ch == '_' => Ok(self.read_identifier(pos)),
            _ => Err(syntax_error(pos, "a token", &format!("'{ch}'"))),
        }
    }

    fn single(&mut self, kind: TokenKind, pos: Pos) -> Token {
        let ch = self.advance().unwrap_or_default();
        Token {
            kind,
            lexeme: ch.to_string(),
            pos,
        }
    }

    /// Single-quoted string with backslash escapes for `\'` and `\\`.
    fn read_string(&mut self, pos: Pos) -> Result<Token> {
        self.advance(); // opening quote
        let mut value = String::new();
        let mut lexeme = String::from("'");
        loop {
            match self.advance() {
                Some('\'') => {
                    lexeme.push('\'');
                    return Ok(Token {
                        kind: TokenKind::StringLit(value),
                        lexeme,
                        pos,
                    });
                }
                Some('\\') => {
                    lexeme.push('\\');
                    match self.advance() {
                        Some(escaped @ ('\'' | '\\')) => {
                            lexeme.push(escaped);
                            value.push(escaped);
                        }
                        Some(other) => {
                            lexeme.push(other);
                            value.push('\\');
                            value.push(other);
                        }
                        None => {
                            return Err(SrqlError::new(
                                ErrorCode::UnterminatedString,
                                "Unterminated string literal",
                            )
                            .with_context(ErrorContext::Syntax {
                                position: pos.offset,
                                line: pos.line,
                                column: pos.column,
                                expected: "closing quote".to_string(),
                                found: "end of input".to_string(),
                            })
                            .with_hint("Close the string with a single quote"));
                        }
                    }
                }
                Some(ch) => {
                    lexeme.push(ch);
                    value.push(ch);
                }
                None => {
                    return Err(SrqlError::new(
                        ErrorCode::UnterminatedString,
                        "Unterminated string literal",
                    )
                    .with_context(ErrorContext::Syntax {
                        position: pos.offset,
                        line: pos.line,
                        column: pos.column,
                        expected: "closing quote".to_string(),
                        found: "end of input".to_string(),
                    })
                    .with_hint("Close the string with a single quote"));
                }
            }
        }
    }

    /// Integer, float, or duration literal. A digit run followed
    /// immediately by a unit letter (s, m, h, d) is a duration.
    fn read_number(&mut self, pos: Pos) -> Result<Token> {
        let mut digits = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                digits.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        // Float: digits '.' digits. A bare trailing dot is left for the
        // parser to reject as punctuation.
        if self.current_char() == Some('.') && self.peek_char().is_some_and(|c| c.is_ascii_digit())
        {
            let mut lexeme = digits;
            lexeme.push('.');
            self.advance();
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_digit() {
                    lexeme.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
            let value: f64 = lexeme
                .parse()
                .map_err(|_| syntax_error(pos, "a number", &format!("'{lexeme}'")))?;
            return Ok(Token {
                kind: TokenKind::FloatLit(value),
                lexeme,
                pos,
            });
        }

        // Duration: unit suffix with no intervening whitespace. The unit
        // must not be followed by more identifier characters, so `5min`
        // stays an error rather than lexing as `5m` + `in`.
        if let Some(unit @ ('s' | 'm' | 'h' | 'd')) = self.current_char() {
            let next_is_word = self
                .peek_char()
                .is_some_and(|c| c.is_alphanumeric() || c == '_');
            if !next_is_word {
                self.advance();
                let lexeme = format!("{digits}{unit}");
                let count: u64 = digits.parse().map_err(|_| {
                    SrqlError::new(
                        ErrorCode::InvalidDuration,
                        format!("Duration '{lexeme}' is out of range"),
                    )
                    .with_context(ErrorContext::Syntax {
                        position: pos.offset,
                        line: pos.line,
                        column: pos.column,
                        expected: "a duration literal".to_string(),
                        found: format!("'{lexeme}'"),
                    })
                })?;
                let multiplier = match unit {
                    's' => 1,
                    'm' => 60,
                    'h' => 3600,
                    _ => 86_400,
                };
                let seconds = count.checked_mul(multiplier).ok_or_else(|| {
                    SrqlError::new(
                        ErrorCode::InvalidDuration,
                        format!("Duration '{lexeme}' is out of range"),
                    )
                })?;
                return Ok(Token {
                    kind: TokenKind::DurationLit(seconds),
                    lexeme,
                    pos,
                });
            }
        }

        let value: i64 = digits
            .parse()
            .map_err(|_| syntax_error(pos, "a number", &format!("'{digits}'")))?;
        Ok(Token {
            kind: TokenKind::IntLit(value),
            lexeme: digits,
            pos,
        })
    }

    fn read_identifier(&mut self, pos: Pos) -> Token {
        let mut lexeme = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_alphanumeric() || ch == '_' {
                lexeme.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&lexeme.to_ascii_lowercase())
            .unwrap_or_else(|| TokenKind::Ident(lexeme.clone()));
        Token { kind, lexeme, pos }
    }
}

fn found_char(ch: Option<char>) -> String {
    match ch {
        Some(ch) => format!("'{ch}'"),
        None => "end of input".to_string(),
    }
}

fn syntax_error(pos: Pos, expected: &str, found: &str) -> SrqlError {
    SrqlError::new(
        ErrorCode::SyntaxError,
        format!("Expected {expected}, found {found}"),
    )
    .with_context(ErrorContext::Syntax {
        position: pos.offset,
        line: pos.line,
        column: pos.column,
        expected: expected.to_string(),
        found: found.to_string(),
    })
}
