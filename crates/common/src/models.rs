//! Shared value and result-shape models.
//!
//! Backend-native results stay tagged (`BackendRecord`) all the way through
//! the executor; only the result merger collapses them into uniform `Row`s.

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

/// A typed scalar (or key-list) value flowing through statements and rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    /// Correlating-key array, bound as a single set-valued parameter.
    StrList(Vec<String>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Render for display (CLI table output). Not an escaping function.
    pub fn render(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::Timestamp(t) => t.to_rfc3339(),
            Value::StrList(items) => items.join(","),
        }
    }

    pub fn from_json(v: &serde_json::Value) -> Value {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            // Nested arrays/objects are flattened to their JSON text; the
            // merger never needs their structure.
            other => Value::Str(other.to_string()),
        }
    }
}

impl std::cmp::PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.partial_cmp(b),
            _ => self.as_f64().and_then(|a| {
                other.as_f64().and_then(|b| a.partial_cmp(&b))
            }),
        }
    }
}

/// An ordered column → value mapping. Column order is meaningful and
/// preserved through merging and serialization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    entries: Vec<(String, Value)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(entries: Vec<(String, Value)>) -> Self {
        Self { entries }
    }

    /// Build from a JSON object, preserving the document's key order.
    pub fn from_json_object(obj: &serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            entries: obj
                .iter()
                .map(|(k, v)| (k.clone(), Value::from_json(v)))
                .collect(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: Value) {
        self.entries.push((column.into(), value));
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, value) in &self.entries {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// A traversal result: the vertex sequence and the edges between them.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphPath {
    pub vertices: Vec<Row>,
    pub edges: Vec<Row>,
}

impl GraphPath {
    /// Number of hops (edges) in the path.
    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }
}

/// A backend-native record, kept tagged until the merger flattens it.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendRecord {
    Row(Row),
    Path(GraphPath),
}

// --- API models ---

/// `POST /api/query` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
    /// Per-request override of the correlating-key cap.
    #[serde(default)]
    pub key_cap: Option<usize>,
    /// Opt into partial results when a chunk fails mid-flight.
    #[serde(default)]
    pub degraded: bool,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: None,
            timeout_seconds: None,
            key_cap: None,
            degraded: false,
        }
    }
}

/// Structured error envelope returned by the API and parsed by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Pipeline stage: parse, semantic, planning, backend, timeout, ...
    pub kind: String,
    /// Stable numeric code, e.g. "SRQL-2002"
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_preserves_column_order() {
        let mut row = Row::new();
        row.push("zeta", Value::Int(1));
        row.push("alpha", Value::Str("x".into()));

        let cols: Vec<&str> = row.columns().collect();
        assert_eq!(cols, vec!["zeta", "alpha"]);

        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":"x"}"#);
    }

    #[test]
    fn test_row_from_json_object_preserves_document_order() {
        let doc: serde_json::Value =
            serde_json::from_str(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
        let serde_json::Value::Object(obj) = doc else {
            panic!("expected an object");
        };
        let row = Row::from_json_object(&obj);
        let cols: Vec<&str> = row.columns().collect();
        assert_eq!(cols, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_value_from_json() {
        assert_eq!(Value::from_json(&serde_json::json!(null)), Value::Null);
        assert_eq!(Value::from_json(&serde_json::json!(42)), Value::Int(42));
        assert_eq!(Value::from_json(&serde_json::json!(2.5)), Value::Float(2.5));
        assert_eq!(
            Value::from_json(&serde_json::json!("dc1")),
            Value::Str("dc1".into())
        );
    }

    #[test]
    fn test_value_ordering_across_numeric_kinds() {
        assert!(Value::Int(1) < Value::Int(2));
        assert!(Value::Float(1.5) < Value::Int(2));
        assert!(Value::Str("a".into()).partial_cmp(&Value::Int(1)).is_none());
    }

    #[test]
    fn test_query_request_defaults() {
        let req: QueryRequest =
            serde_json::from_str(r#"{"query": "STREAM devices"}"#).unwrap();
        assert_eq!(req.query, "STREAM devices");
        assert!(req.limit.is_none());
        assert!(!req.degraded);
    }

    #[test]
    fn test_error_envelope_roundtrip() {
        let env = ErrorEnvelope {
            error: ErrorBody {
                kind: "semantic".into(),
                code: "SRQL-2002".into(),
                message: "Unknown field 'bogus_field'".into(),
                position: Some(27),
                hint: None,
            },
        };
        let json = serde_json::to_string(&env).unwrap();
        assert!(!json.contains("hint"));
        let back: ErrorEnvelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back.error.position, Some(27));
    }
}
