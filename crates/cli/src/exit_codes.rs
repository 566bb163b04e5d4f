//! Structured exit codes for machine-readable error handling.

use srql_error::ErrorCategory;

/// Success (standard convention)
pub const SUCCESS: u8 = 0;

/// The query was rejected before execution (parse, semantic, planning)
pub const QUERY_ERROR: u8 = 1;

/// Execution failed (backend, config, internal)
pub const EXECUTION_ERROR: u8 = 2;

/// The query ran out of time
pub const TIMEOUT: u8 = 3;

pub fn for_category(category: ErrorCategory) -> u8 {
    match category {
        ErrorCategory::Parse | ErrorCategory::Semantic | ErrorCategory::Planning => QUERY_ERROR,
        ErrorCategory::Timeout => TIMEOUT,
        ErrorCategory::Backend | ErrorCategory::Config | ErrorCategory::Internal => {
            EXECUTION_ERROR
        }
    }
}
