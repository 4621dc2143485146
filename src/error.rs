//! Error types for schema construction and validation.

use serde_json::{Map, Value};
use thiserror::Error;

/// Definition and usage errors.
///
/// These are programmer errors: a builder call received malformed input, or a
/// schema was used in a way its definition cannot support. They are never the
/// result of bad input data.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("cannot merge a {target} schema with a {other} schema")]
    KindConflict { target: String, other: String },

    #[error("{method}() is not available on {kind} schemas")]
    WrongKind { method: String, kind: String },

    #[error("unknown rule \"{name}\" for {kind} schema")]
    UnknownRule { kind: String, name: String },

    #[error("rule \"{rule}\" argument \"{arg}\" {reason}")]
    InvalidArgument {
        rule: String,
        arg: String,
        reason: String,
    },

    #[error("rule \"{rule}\" argument \"{arg}\" does not accept references")]
    RefNotAllowed { rule: String, arg: String },

    #[error("flag \"{name}\" is already defined on {kind}")]
    FlagCollision { kind: String, name: String },

    #[error("message \"{code}\" is already defined on {kind}")]
    MessageCollision { kind: String, code: String },

    #[error("rule \"{name}\" is already defined on {kind}")]
    RuleCollision { kind: String, name: String },

    #[error("term list \"{name}\" is already defined on {kind}")]
    TermCollision { kind: String, name: String },

    #[error("reference {reference} reaches ancestor {ancestor} but only {available} are available")]
    RefOutOfRange {
        reference: String,
        ancestor: usize,
        available: usize,
    },

    #[error("no message template registered for \"{code}\"")]
    MissingTemplate { code: String },

    #[error("template for \"{code}\" references unknown term \"{term}\"")]
    MissingTerm { code: String, term: String },

    #[error("malformed template for \"{code}\": unclosed placeholder")]
    MalformedTemplate { code: String },

    #[error("invalid options: {source}")]
    InvalidOptions {
        #[source]
        source: serde_json::Error,
    },
}

/// Single validation failure with the state it was raised at.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ValidationError {
    /// Human-readable error message.
    pub message: String,
    /// Machine-readable code, e.g. `any.required`.
    pub code: String,
    /// Dotted path to the failing value; `None` at the root.
    pub path: Option<String>,
    /// Nesting depth of the failing value.
    pub depth: usize,
    /// Values enclosing the failing value, nearest first.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ancestors: Vec<Value>,
    /// Details supplied by the failing stage.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}: {}", path, self.message),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors returned by `Schema::validate`.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("validation failed with {} error(s)", .errors.len())]
    Invalid { errors: Vec<ValidationError> },
}

impl ValidateError {
    /// Validation errors, empty for usage errors.
    pub fn errors(&self) -> &[ValidationError] {
        match self {
            ValidateError::Invalid { errors } => errors,
            ValidateError::Schema(_) => &[],
        }
    }

    /// Codes of all validation errors, in order.
    pub fn codes(&self) -> Vec<&str> {
        self.errors().iter().map(|e| e.code.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(path: Option<&str>) -> ValidationError {
        ValidationError {
            message: "\"email\" is required".into(),
            code: "any.required".into(),
            path: path.map(String::from),
            depth: 1,
            ancestors: Vec::new(),
            context: Map::new(),
        }
    }

    #[test]
    fn validation_error_display() {
        assert_eq!(
            sample(Some("buyer.email")).to_string(),
            "buyer.email: \"email\" is required"
        );
        assert_eq!(sample(None).to_string(), "\"email\" is required");
    }

    #[test]
    fn validate_error_codes() {
        let err = ValidateError::Invalid {
            errors: vec![sample(None), sample(Some("a"))],
        };
        assert_eq!(err.codes(), vec!["any.required", "any.required"]);
        assert_eq!(err.to_string(), "validation failed with 2 error(s)");
    }

    #[test]
    fn schema_error_has_no_validation_errors() {
        let err = ValidateError::from(SchemaError::MissingTemplate {
            code: "x.y".into(),
        });
        assert!(err.errors().is_empty());
        assert_eq!(err.to_string(), "no message template registered for \"x.y\"");
    }

    #[test]
    fn validation_error_serializes_without_empty_fields() {
        let value = serde_json::to_value(sample(Some("a"))).unwrap();
        assert_eq!(value["code"], "any.required");
        assert!(value.get("ancestors").is_none());
        assert!(value.get("context").is_none());
    }
}
