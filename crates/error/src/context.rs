//! # Error Contexts
//!
//! Structured metadata for errors so callers can act on them
//! programmatically instead of parsing message strings.

use serde::{Deserialize, Serialize};

/// Structured context, one variant per error family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorContext {
    /// Context for SRQL-1001/1002 (parse errors)
    Syntax {
        /// Byte offset into the query text
        position: usize,
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },

    /// Context for SRQL-2001 (UnknownEntity)
    UnknownEntity {
        entity: String,
        position: usize,
        available_entities: Vec<String>,
    },

    /// Context for SRQL-2002 (UnknownField)
    UnknownField {
        field: String,
        entity: String,
        position: usize,
        available_fields: Vec<String>,
    },

    /// Context for SRQL-2003 (InvalidWindowOnGraph)
    Window {
        entity: String,
        clause: String,
    },

    /// Context for SRQL-2004 (IncompatibleJoin)
    Join {
        left_entity: String,
        right_entity: String,
        reason: String,
    },

    /// Context for backend errors (SRQL-4001..4003)
    Backend {
        backend: String,
        detail: String,
    },

    /// Context for SRQL-5001 (QueryTimeout)
    Timeout {
        timeout_seconds: u64,
    },

    /// Context for the chunked-execution path (diagnostic, not an error)
    KeyCap {
        keys: usize,
        cap: usize,
    },

    /// Generic key-value context for extensibility
    Generic {
        #[serde(flatten)]
        data: std::collections::HashMap<String, serde_json::Value>,
    },
}

impl ErrorContext {
    /// Source position of the offending token, when the context carries one.
    pub fn position(&self) -> Option<usize> {
        match self {
            ErrorContext::Syntax { position, .. }
            | ErrorContext::UnknownEntity { position, .. }
            | ErrorContext::UnknownField { position, .. } => Some(*position),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_context_serde_roundtrip() {
        let ctx = ErrorContext::Syntax {
            position: 12,
            line: 1,
            column: 13,
            expected: "entity name".to_string(),
            found: "WHERE".to_string(),
        };

        let json = serde_json::to_string(&ctx).unwrap();
        let de: ErrorContext = serde_json::from_str(&json).unwrap();

        match de {
            ErrorContext::Syntax { position, found, .. } => {
                assert_eq!(position, 12);
                assert_eq!(found, "WHERE");
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_position_accessor() {
        let ctx = ErrorContext::UnknownField {
            field: "bogus_field".to_string(),
            entity: "metrics".to_string(),
            position: 27,
            available_fields: vec!["device_id".to_string()],
        };
        assert_eq!(ctx.position(), Some(27));

        let ctx = ErrorContext::Timeout { timeout_seconds: 30 };
        assert_eq!(ctx.position(), None);
    }
}
