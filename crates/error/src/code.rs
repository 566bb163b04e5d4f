use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric error codes following SRQL-XXXX format.
///
/// ## Code Ranges
/// - **1000-1999**: Parse errors (lexer/parser)
/// - **2000-2999**: Semantic errors (binder)
/// - **3000-3999**: Planning errors
/// - **4000-4999**: Backend/execution errors
/// - **5000-5999**: Timeout/cancellation
/// - **6000-6999**: Configuration errors
/// - **9000-9999**: Internal errors
///
/// Codes are stable across versions (semver contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
#[non_exhaustive]
pub enum ErrorCode {
    // === Parse Errors (1000-1999) ===
    /// SRQL-1001: Malformed query syntax
    SyntaxError = 1001,
    /// SRQL-1002: Unexpected token
    UnexpectedToken = 1002,
    /// SRQL-1003: Unterminated string literal
    UnterminatedString = 1003,
    /// SRQL-1004: Invalid duration literal
    InvalidDuration = 1004,

    // === Semantic Errors (2000-2999) ===
    /// SRQL-2001: Entity not present in the schema catalog
    UnknownEntity = 2001,
    /// SRQL-2002: Field not present for the resolved entity
    UnknownField = 2002,
    /// SRQL-2003: WINDOW/HAVING attached to a graph-affine target
    InvalidWindowOnGraph = 2003,
    /// SRQL-2004: Join shape cannot cross backends
    IncompatibleJoin = 2004,
    /// SRQL-2005: Value type does not match the field type
    TypeMismatch = 2005,

    // === Planning Errors (3000-3999) ===
    /// SRQL-3001: Cross-backend construct the planner cannot order
    UnsupportedCrossBackend = 3001,
    /// SRQL-3002: Plan would exceed a configured resource bound
    ResourceBoundExceeded = 3002,

    // === Backend Errors (4000-4999) ===
    /// SRQL-4001: Store unreachable or connection refused
    StoreUnavailable = 4001,
    /// SRQL-4002: Store rejected the generated statement
    StatementRejected = 4002,
    /// SRQL-4003: Store returned a malformed result
    MalformedResult = 4003,

    // === Timeout (5000-5999) ===
    /// SRQL-5001: Query deadline expired
    QueryTimeout = 5001,
    /// SRQL-5002: Query cancelled by the caller
    QueryCancelled = 5002,

    // === Config Errors (6000-6999) ===
    /// SRQL-6001: Invalid configuration value
    InvalidConfig = 6001,
    /// SRQL-6002: Schema catalog unavailable and no last-known-good snapshot
    CatalogUnavailable = 6002,

    // === Internal Errors (9000-9999) ===
    /// SRQL-9001: Unexpected internal state
    Internal = 9001,
    /// SRQL-9002: Serialization/deserialization failed
    SerializationFailed = 9002,

    /// SRQL-9999: Unknown/unclassified error
    Unknown = 9999,
}

impl ErrorCode {
    /// Get the numeric code value
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the formatted code string (e.g., "SRQL-2002")
    pub fn as_str(&self) -> String {
        format!("SRQL-{:04}", self.as_u16())
    }

    /// Get the error category (the originating pipeline stage)
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            1000..=1999 => ErrorCategory::Parse,
            2000..=2999 => ErrorCategory::Semantic,
            3000..=3999 => ErrorCategory::Planning,
            4000..=4999 => ErrorCategory::Backend,
            5000..=5999 => ErrorCategory::Timeout,
            6000..=6999 => ErrorCategory::Config,
            _ => ErrorCategory::Internal,
        }
    }

    /// Whether a read-only query failing with this code may be retried.
    ///
    /// Parse/semantic/planning errors are terminal; only store-side
    /// availability failures qualify.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> String {
        code.as_str()
    }
}

impl TryFrom<String> for ErrorCode {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        // Parse "SRQL-XXXX" format
        let num: u16 = s
            .strip_prefix("SRQL-")
            .and_then(|n| n.parse().ok())
            .ok_or_else(|| "Invalid format".to_string())?;
        Self::try_from(num).map_err(|_| "Unknown code".to_string())
    }
}

impl TryFrom<u16> for ErrorCode {
    type Error = String;

    fn try_from(n: u16) -> std::result::Result<Self, Self::Error> {
        match n {
            1001 => Ok(Self::SyntaxError),
            1002 => Ok(Self::UnexpectedToken),
            1003 => Ok(Self::UnterminatedString),
            1004 => Ok(Self::InvalidDuration),
            2001 => Ok(Self::UnknownEntity),
            2002 => Ok(Self::UnknownField),
            2003 => Ok(Self::InvalidWindowOnGraph),
            2004 => Ok(Self::IncompatibleJoin),
            2005 => Ok(Self::TypeMismatch),
            3001 => Ok(Self::UnsupportedCrossBackend),
            3002 => Ok(Self::ResourceBoundExceeded),
            4001 => Ok(Self::StoreUnavailable),
            4002 => Ok(Self::StatementRejected),
            4003 => Ok(Self::MalformedResult),
            5001 => Ok(Self::QueryTimeout),
            5002 => Ok(Self::QueryCancelled),
            6001 => Ok(Self::InvalidConfig),
            6002 => Ok(Self::CatalogUnavailable),
            9001 => Ok(Self::Internal),
            9002 => Ok(Self::SerializationFailed),
            9999 => Ok(Self::Unknown),
            _ => Err(format!("Unknown error code: {}", n)),
        }
    }
}

/// High-level error category, one per pipeline stage.
///
/// This is what the API envelope reports as `kind` and what the CLI maps
/// to exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Parse,
    Semantic,
    Planning,
    Backend,
    Timeout,
    Config,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Parse => "parse",
            ErrorCategory::Semantic => "semantic",
            ErrorCategory::Planning => "planning",
            ErrorCategory::Backend => "backend",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Config => "config",
            ErrorCategory::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
