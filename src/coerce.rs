//! Semantic type checks for resolved parameter values
//!
//! Resolution produces [`serde_json::Value`]s; each consuming action then
//! narrows them to the semantic type its field requires. The narrowing
//! functions here report mismatches by naming the expected and actual kind,
//! and implement the one deliberate coercion in the system: a
//! sequence-of-strings parameter accepts a single delimited string, split
//! first by comma, then by whitespace, falling back to a single-element
//! sequence.

use serde_json::Value;
use thiserror::Error;

/// A resolved value did not match the semantic type its parameter requires
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoerceError {
    /// Expected a string
    #[error("is not a string, got {actual}")]
    NotAString {
        /// The runtime kind that was actually present
        actual: &'static str,
    },

    /// Expected a string or a sequence of strings
    #[error("is not a string or a sequence of strings, got {actual}")]
    NotAStringList {
        /// The runtime kind that was actually present
        actual: &'static str,
    },

    /// A sequence element was not a string
    #[error("has a non-string element at index {index}, got {actual}")]
    NonStringElement {
        /// Position of the offending element
        index: usize,
        /// The runtime kind of the offending element
        actual: &'static str,
    },
}

/// Name the runtime kind of a value, for error messages.
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Narrow a resolved value to a string slice.
pub fn as_str(value: &Value) -> Result<&str, CoerceError> {
    match value {
        Value::String(s) => Ok(s),
        other => Err(CoerceError::NotAString {
            actual: kind_of(other),
        }),
    }
}

/// Narrow a resolved value to a sequence of strings.
///
/// A single string is split into a sequence: by comma when one is present,
/// otherwise by whitespace, otherwise kept as a one-element sequence. The
/// split never applies to values that already arrive as an array.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use runbook::coerce::to_string_list;
///
/// assert_eq!(to_string_list(&json!("web,db")).unwrap(), vec!["web", "db"]);
/// assert_eq!(
///     to_string_list(&json!("web db redis")).unwrap(),
///     vec!["web", "db", "redis"]
/// );
/// assert_eq!(to_string_list(&json!("single")).unwrap(), vec!["single"]);
/// assert_eq!(to_string_list(&json!(["a", "b"])).unwrap(), vec!["a", "b"]);
/// ```
pub fn to_string_list(value: &Value) -> Result<Vec<String>, CoerceError> {
    match value {
        Value::String(s) => Ok(split_delimited(s)),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::String(s) => out.push(s.clone()),
                    other => {
                        return Err(CoerceError::NonStringElement {
                            index,
                            actual: kind_of(other),
                        })
                    }
                }
            }
            Ok(out)
        }
        other => Err(CoerceError::NotAStringList {
            actual: kind_of(other),
        }),
    }
}

/// Comma first, whitespace second, single element as the no-op fallback.
fn split_delimited(s: &str) -> Vec<String> {
    if s.contains(',') {
        s.split(',')
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .collect()
    } else {
        // split_whitespace also covers the single-token case.
        s.split_whitespace().map(String::from).collect()
    }
}
