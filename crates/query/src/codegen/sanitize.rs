//! Identifier hygiene for generated statements.
//!
//! The binder already restricts names to the catalog allow-list; this is
//! the last line of defense before a name is spliced into statement text.
//! Values never pass through here, they are always bound as parameters.

use once_cell::sync::Lazy;
use regex::Regex;
use srql_error::{ErrorCode, Result, SrqlError};

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Validate a name destined for statement text.
pub fn safe_identifier(name: &str) -> Result<&str> {
    if IDENTIFIER.is_match(name) {
        Ok(name)
    } else {
        Err(SrqlError::new(
            ErrorCode::Internal,
            format!("Identifier '{name}' failed statement hygiene"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_plain_identifiers() {
        assert!(safe_identifier("device_id").is_ok());
        assert!(safe_identifier("metrics_agg_1m").is_ok());
        assert!(safe_identifier("_private").is_ok());
    }

    #[test]
    fn test_rejects_injection_shapes() {
        for bad in ["", "a b", "a;drop table x", "a'b", "1abc", "a.b", "a-b"] {
            assert!(safe_identifier(bad).is_err(), "accepted {bad:?}");
        }
    }
}
