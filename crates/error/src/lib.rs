//! # srql-error
//!
//! Unified error types for the ServiceRadar SRQL engine.
//!
//! All errors carry:
//! - Numeric error codes (SRQL-XXXX), grouped by pipeline stage
//! - Structured context (offending identifier, source position, candidates)
//! - Actionable hints for the operator

mod code;
mod context;

pub use code::{ErrorCategory, ErrorCode};
pub use context::ErrorContext;

use serde::{Deserialize, Serialize};
use std::fmt;

/// The unified error type for all SRQL operations.
///
/// Serialized as-is into the API error envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SrqlError {
    /// Numeric error code (e.g., "SRQL-2002")
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Structured context for programmatic handling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ErrorContext>,

    /// Actionable suggestion for correcting the query or configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl SrqlError {
    /// Create a new error with code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: None,
            hint: None,
        }
    }

    /// Add structured context
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Add an actionable hint
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// The pipeline stage this error originated in.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Byte offset of the offending token, for parse/semantic errors.
    pub fn position(&self) -> Option<usize> {
        self.context.as_ref().and_then(|c| c.position())
    }

    /// Serialize to JSON for API responses
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::warn!("Failed to serialize SrqlError: {}", e);
            format!(
                r#"{{"code":"{}","message":"Serialization failed"}}"#,
                self.code
            )
        })
    }
}

impl fmt::Display for SrqlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " (Hint: {})", hint)?;
        }
        Ok(())
    }
}

impl std::error::Error for SrqlError {}

/// Result type alias for SRQL operations
pub type Result<T> = std::result::Result<T, SrqlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_builder() {
        let err = SrqlError::new(ErrorCode::UnknownEntity, "Entity 'gadgets' not found")
            .with_hint("Check the schema catalog");

        assert_eq!(err.code, ErrorCode::UnknownEntity);
        assert_eq!(err.message, "Entity 'gadgets' not found");
        assert_eq!(err.hint, Some("Check the schema catalog".to_string()));
        assert!(err.context.is_none());
        assert_eq!(err.category(), ErrorCategory::Semantic);
    }

    #[test]
    fn test_display_implementation() {
        let err = SrqlError::new(ErrorCode::SyntaxError, "Unexpected token")
            .with_hint("Remove trailing comma");

        assert_eq!(
            err.to_string(),
            "[SRQL-1001] Unexpected token (Hint: Remove trailing comma)"
        );

        let err_no_hint = SrqlError::new(ErrorCode::Internal, "Crash");
        assert_eq!(err_no_hint.to_string(), "[SRQL-9001] Crash");
    }

    #[test]
    fn test_json_output() {
        let err = SrqlError::new(ErrorCode::QueryTimeout, "Query timed out after 30 seconds");
        let json = err.to_json();

        assert!(json.contains("\"code\":\"SRQL-5001\""));
        assert!(json.contains("\"message\":\"Query timed out after 30 seconds\""));
    }

    #[test]
    fn test_position_from_context() {
        let err = SrqlError::new(ErrorCode::UnexpectedToken, "Expected entity name, found WHERE")
            .with_context(ErrorContext::Syntax {
                position: 7,
                line: 1,
                column: 8,
                expected: "entity name".to_string(),
                found: "WHERE".to_string(),
            });
        assert_eq!(err.position(), Some(7));
    }
}
