use once_cell::sync::Lazy;
use regex::Regex;

/// Scrubber for query text headed to log files.
///
/// ### WARNING
/// This is a best-effort regex pass. String literals in SRQL queries can
/// carry hostnames, site names, and addresses that operators may not want
/// persisted in logs; masking them here is defense-in-depth, not a
/// compliance guarantee.
static STRING_LITERAL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'(?:[^'\\]|\\.)*'").unwrap());

static IPV4_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap());

/// Mask string literals and bare IPv4 addresses in query text.
pub fn scrub_query(input: &str) -> String {
    let masked = STRING_LITERAL_REGEX.replace_all(input, "'***'");
    IPV4_REGEX.replace_all(&masked, "[IP]").to_string()
}
