//! Dynamic column-value helpers.
//!
//! Column values flow through the builder as [`serde_json::Value`], which
//! keeps the write payload clone-friendly and inspectable (blank filtering,
//! logical-delete coercion) without giving up parameterized execution:
//! values are only ever bound, never interpolated into SQL text.

use serde_json::Value;
use tokio_postgres::types::ToSql;

/// Whether a value counts as "blank" for write-set filtering.
///
/// `Null` is blank, as is any string whose trimmed form is empty. Numbers,
/// booleans, arrays and objects always stringify to non-empty text.
pub fn is_blank(value: &Value) -> bool {
    to_display_string(value).trim().is_empty()
}

/// Stringify a value the way blank checks and save() see it.
///
/// `Null` becomes the empty string and strings are returned without quotes;
/// everything else renders as JSON text.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Coerce the textual logical-delete value configuration.
///
/// Precedence is a behavioral contract: a leading quote strips the first and
/// last character and keeps the text; otherwise an integer parse is tried;
/// otherwise the raw text is kept.
pub fn parse_config_value(raw: &str) -> Value {
    if raw.starts_with('\'') || raw.starts_with('"') {
        // strip by chars, not bytes; the last character may be multi-byte
        let mut inner = raw.chars();
        inner.next();
        if inner.next_back().is_some() && !inner.as_str().is_empty() {
            return Value::String(inner.as_str().to_string());
        }
    }
    match raw.parse::<i64>() {
        Ok(n) => Value::from(n),
        Err(_) => Value::String(raw.to_string()),
    }
}

/// Convert a value into a postgres binding by variant.
///
/// Arrays and objects are bound as jsonb; integral numbers as `i64`,
/// other numbers as `f64`.
pub fn bind_param(value: &Value) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Null => Box::new(None::<String>),
        Value::Bool(b) => Box::new(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Box::new(i)
            } else {
                Box::new(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => Box::new(s.clone()),
        other => Box::new(other.clone()),
    }
}
