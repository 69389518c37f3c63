//! Schema-less guide records.
//!
//! The columns of an Effi export vary by store and report, so a record is an
//! open mapping from field name to value rather than a fixed struct. Field
//! discovery happens on demand (see the cache's `available_fields`).

use serde_json::Value;

/// One row of extracted tabular data.
pub type GuideRecord = serde_json::Map<String, Value>;

/// Synthetic field tagging each record with its source store when querying
/// across stores. Reserved; never treated as a spreadsheet column.
pub const STORE_FIELD: &str = "_store";

/// Render a field value as text for substring matching.
///
/// Returns `None` for null (a null field counts as missing, like an absent
/// key) and for nested structures, which the decoder never produces.
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(_) | Value::Object(_) => None,
    }
}
