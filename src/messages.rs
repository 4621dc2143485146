//! Error construction and message templates.
//!
//! Templates use three kinds of placeholder:
//!
//! - `{#label}`: the value's label, quoted
//! - `{$name}`: a dotted path into the validation context
//! - `{name}`: a detail supplied by the failing stage

use serde_json::{Map, Value};

use crate::error::{SchemaError, ValidationError};
use crate::reference::{Arg, Ref};
use crate::schema::{ErrorReport, Flag, Schema};
use crate::state::State;
use crate::types::display_value;
use crate::values::Values;

/// Label used when neither a label flag nor a path is available.
pub const UNKNOWN_LABEL: &str = "unknown";

/// Operand of an error message.
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    Value(Value),
    Ref(Ref),
    Values(Values),
}

impl Detail {
    /// Rendering inside a message.
    pub fn display(&self) -> String {
        match self {
            Detail::Value(v) => display_value(v),
            Detail::Ref(r) => r.display(),
            Detail::Values(values) => values.display(),
        }
    }

    /// Rendering inside `ValidationError::context`.
    pub fn to_value(&self) -> Value {
        match self {
            Detail::Value(v) => v.clone(),
            Detail::Ref(r) => Value::String(r.display()),
            Detail::Values(values) => Value::Array(values.describe()),
        }
    }
}

/// Details supplied by a failing stage, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Details {
    entries: Vec<(String, Detail)>,
}

impl Details {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.entries.push((name.into(), Detail::Value(value.into())));
        self
    }

    pub fn with_arg(mut self, name: impl Into<String>, arg: &Arg) -> Self {
        let detail = match arg {
            Arg::Value(v) => Detail::Value(v.clone()),
            Arg::Ref(r) => Detail::Ref(r.clone()),
        };
        self.entries.push((name.into(), detail));
        self
    }

    pub fn with_ref(mut self, name: impl Into<String>, reference: &Ref) -> Self {
        self.entries.push((name.into(), Detail::Ref(reference.clone())));
        self
    }

    pub fn with_values(mut self, name: impl Into<String>, values: &Values) -> Self {
        self.entries.push((name.into(), Detail::Values(values.clone())));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Detail> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(name, detail)| (name.clone(), detail.to_value()))
            .collect()
    }
}

/// Build the error for `code` raised by `schema` at `state`.
///
/// `label` is the explicit label to render; without one the dotted path is
/// used, then [`UNKNOWN_LABEL`].
///
/// # Errors
///
/// Fails when the type has no template for `code` or the template names a
/// term that cannot be looked up.
pub fn build(
    schema: &Schema,
    code: &str,
    state: &State,
    context: &Value,
    details: &Details,
    label: Option<&str>,
) -> Result<ValidationError, SchemaError> {
    let label = label
        .map(String::from)
        .or_else(|| state.dotted_path())
        .unwrap_or_else(|| UNKNOWN_LABEL.to_string());
    let mut local = details.to_map();

    let message = match schema.flag("error") {
        Some(Flag::Error(custom)) => custom.render(&ErrorReport {
            code,
            state,
            context,
            details: &local,
        }),
        _ => {
            let template = schema
                .def()
                .message(code)
                .ok_or_else(|| SchemaError::MissingTemplate {
                    code: code.to_string(),
                })?;
            render(template, code, &label, context, details)?
        }
    };

    local.insert("label".into(), Value::String(label));
    Ok(ValidationError {
        message,
        code: code.to_string(),
        path: state.dotted_path(),
        depth: state.depth(),
        ancestors: state.ancestors().to_vec(),
        context: local,
    })
}

/// Interpolate a template.
pub fn render(
    template: &str,
    code: &str,
    label: &str,
    context: &Value,
    details: &Details,
) -> Result<String, SchemaError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| SchemaError::MalformedTemplate {
            code: code.to_string(),
        })?;
        let term = &after[..end];
        let missing = || SchemaError::MissingTerm {
            code: code.to_string(),
            term: term.to_string(),
        };

        if let Some(reserved) = term.strip_prefix('#') {
            if reserved != "label" {
                return Err(missing());
            }
            out.push('"');
            out.push_str(label);
            out.push('"');
        } else if let Some(path) = term.strip_prefix('$') {
            let found = path
                .split('.')
                .try_fold(context, |current, segment| current.get(segment))
                .ok_or_else(missing)?;
            out.push_str(&display_value(found));
        } else {
            out.push_str(&details.get(term).ok_or_else(missing)?.display());
        }

        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
