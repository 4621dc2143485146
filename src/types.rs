//! Core types shared by schemas and validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Kind tag of the root type every other type derives from.
pub const ANY: &str = "any";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Structural equality used by value sets.
///
/// Numbers compare by numeric value, so `1` and `1.0` are equal.
pub fn deep_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| deep_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).map_or(false, |w| deep_equal(v, w)))
        }
        _ => a == b,
    }
}

/// Renders a value for human-readable messages.
///
/// Strings are shown without quotes and arrays as comma-separated lists.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Whether a value must, may, or must not be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    /// Absent values pass (or receive a default).
    #[default]
    Optional,
    /// Absent values fail with `any.required`.
    Required,
    /// Present values fail with `any.forbidden`.
    Forbidden,
    /// Presence is not checked at all. Used internally to probe a value.
    Ignore,
}

impl Presence {
    /// Parse a presence value from a string.
    ///
    /// Returns `None` for unknown values (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "optional" => Some(Presence::Optional),
            "required" => Some(Presence::Required),
            "forbidden" => Some(Presence::Forbidden),
            "ignore" => Some(Presence::Ignore),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Presence::Optional => "optional",
            Presence::Required => "required",
            Presence::Forbidden => "forbidden",
            Presence::Ignore => "ignore",
        }
    }
}

/// Options for a single validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidateOptions {
    /// When true, type coercion is disabled.
    pub strict: bool,
    /// Stop at the first error instead of collecting every error of a level.
    pub abort_early: bool,
    /// Validate nested schemas of structural types.
    pub recursive: bool,
    /// Keep object keys that have no schema.
    pub allow_unknown: bool,
    /// Remove object keys and array items that have no schema.
    pub strip_unknown: bool,
    /// Side-channel value addressed by context references (`$name`),
    /// normally an object.
    pub context: Value,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            strict: true,
            abort_early: true,
            recursive: true,
            allow_unknown: false,
            strip_unknown: false,
            context: Value::Object(Map::new()),
        }
    }
}

impl ValidateOptions {
    /// Create options with the defaults: strict, abort early, recursive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON object, e.g. `{"abortEarly": false}`.
    ///
    /// Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::InvalidOptions` when a field has the wrong type.
    pub fn from_value(value: &Value) -> Result<Self, SchemaError> {
        serde_json::from_value(value.clone()).map_err(|source| SchemaError::InvalidOptions { source })
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn abort_early(mut self, abort_early: bool) -> Self {
        self.abort_early = abort_early;
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn allow_unknown(mut self, allow: bool) -> Self {
        self.allow_unknown = allow;
        self
    }

    pub fn strip_unknown(mut self, strip: bool) -> Self {
        self.strip_unknown = strip;
        self
    }

    /// Set the context value. Context references into a non-object resolve
    /// to nothing.
    pub fn context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn presence_parse_valid() {
        assert_eq!(Presence::parse("optional"), Some(Presence::Optional));
        assert_eq!(Presence::parse("required"), Some(Presence::Required));
        assert_eq!(Presence::parse("forbidden"), Some(Presence::Forbidden));
    }

    #[test]
    fn presence_parse_invalid() {
        assert_eq!(Presence::parse("maybe"), None);
        assert_eq!(Presence::parse(""), None);
    }

    #[test]
    fn deep_equal_numbers_by_value() {
        assert!(deep_equal(&json!(1), &json!(1.0)));
        assert!(deep_equal(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
        assert!(!deep_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!deep_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn display_value_joins_arrays() {
        assert_eq!(display_value(&json!(["a", 2, true])), "a, 2, true");
        assert_eq!(display_value(&json!(null)), "null");
    }

    #[test]
    fn options_defaults() {
        let opts = ValidateOptions::new();
        assert!(opts.strict);
        assert!(opts.abort_early);
        assert!(opts.recursive);
        assert!(!opts.allow_unknown);
        assert!(!opts.strip_unknown);
        assert_eq!(opts.context, json!({}));
    }

    #[test]
    fn options_from_value_keeps_defaults() {
        let opts = ValidateOptions::from_value(&json!({
            "abortEarly": false,
            "context": { "role": "admin" }
        }))
        .unwrap();
        assert!(!opts.abort_early);
        assert!(opts.strict);
        assert_eq!(opts.context["role"], "admin");
    }

    #[test]
    fn options_from_value_rejects_bad_types() {
        let result = ValidateOptions::from_value(&json!({ "strict": "yes" }));
        assert!(matches!(result, Err(SchemaError::InvalidOptions { .. })));
    }

    #[test]
    fn context_accepts_any_value() {
        let opts = ValidateOptions::new().context(json!([1, 2]));
        assert_eq!(opts.context, json!([1, 2]));

        let first = crate::reference::Ref::new("$0");
        assert_eq!(first.resolve(None, &[], &opts.context).unwrap(), Some(json!(1)));
        let named = crate::reference::Ref::new("$name");
        assert_eq!(named.resolve(None, &[], &opts.context).unwrap(), None);
    }
}
