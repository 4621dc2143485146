//! Numbers with value limits.

use once_cell::sync::Lazy;
use serde_json::{Number, Value};

use crate::definition::{ArgDef, RuleDef, TypeSpec, Verdict};
use crate::error::SchemaError;
use crate::messages::Details;
use crate::reference::Arg;
use crate::schema::Schema;

use super::any::any;
use super::Bound;

static NUMBER: Lazy<Schema> = Lazy::new(|| {
    any().derive(
        TypeSpec::new("number")
            .message("number.base", "{#label} must be a number")
            .message("number.min", "{#label} must be greater than or equal to {limit}")
            .message("number.max", "{#label} must be less than or equal to {limit}")
            .message("number.greater", "{#label} must be greater than {limit}")
            .message("number.less", "{#label} must be less than {limit}")
            .message("number.integer", "{#label} must be an integer")
            .rule(compare(Bound::Min))
            .rule(compare(Bound::Max))
            .rule(compare(Bound::Greater))
            .rule(compare(Bound::Less))
            .rule(RuleDef::new("integer").validate(|value, helpers, _| {
                if value.as_f64().map_or(false, |n| n.fract() == 0.0) {
                    Ok(Verdict::Keep)
                } else {
                    helpers.fail("number.integer", Details::new())
                }
            }))
            .coerce(|value, _| Ok(coerce(value)))
            .validate(|value, helpers| {
                if value.is_number() {
                    Ok(Verdict::Keep)
                } else {
                    helpers.fail("number.base", Details::new())
                }
            }),
    )
});

pub fn number() -> Schema {
    NUMBER.clone()
}

fn compare(bound: Bound) -> RuleDef {
    RuleDef::new(bound.name())
        .arg(
            ArgDef::new("limit")
                .assert(Value::is_number, "must be a number")
                .refs(),
        )
        .validate(move |value, helpers, args| {
            let (Some(actual), Some(limit)) = (value.as_f64(), args.f64("limit")) else {
                return Ok(Verdict::Keep);
            };
            if bound.holds(actual, limit) {
                Ok(Verdict::Keep)
            } else {
                let limit = args.get("limit").cloned().unwrap_or(Value::Null);
                helpers.fail(
                    &format!("number.{}", bound.name()),
                    Details::new().with("limit", limit),
                )
            }
        })
}

/// Numeric strings become numbers, integers where possible.
fn coerce(value: &Value) -> Verdict {
    let Some(text) = value.as_str() else {
        return Verdict::Keep;
    };
    let text = text.trim();
    if let Ok(n) = text.parse::<i64>() {
        return Verdict::Value(Some(Value::from(n)));
    }
    match text.parse::<f64>().ok().and_then(Number::from_f64) {
        Some(n) => Verdict::Value(Some(Value::Number(n))),
        None => Verdict::Keep,
    }
}

impl Schema {
    /// Sugar for the `greater` rule.
    pub fn greater(&self, limit: impl Into<Arg>) -> Result<Schema, SchemaError> {
        self.rule("greater", &[limit.into()])
    }

    /// Sugar for the `less` rule.
    pub fn less(&self, limit: impl Into<Arg>) -> Result<Schema, SchemaError> {
        self.rule("less", &[limit.into()])
    }

    /// Sugar for the `integer` rule.
    pub fn integer(&self) -> Result<Schema, SchemaError> {
        self.rule("integer", &[])
    }
}
