//! Built-in schema types.
//!
//! Every type is derived from the `any` root through the same extension API
//! available to callers (`Schema::extend`).

pub mod alternatives;
pub mod any;
pub mod array;
pub mod boolean;
pub mod number;
pub mod object;
pub mod string;

use serde_json::Value;

use crate::definition::{ArgDef, RuleDef, Verdict};
use crate::messages::Details;

/// Comparison applied by size and value limit rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Bound {
    Min,
    Max,
    Length,
    Greater,
    Less,
}

impl Bound {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Bound::Min => "min",
            Bound::Max => "max",
            Bound::Length => "length",
            Bound::Greater => "greater",
            Bound::Less => "less",
        }
    }

    pub(crate) fn holds(self, actual: f64, limit: f64) -> bool {
        match self {
            Bound::Min => actual >= limit,
            Bound::Max => actual <= limit,
            Bound::Length => actual == limit,
            Bound::Greater => actual > limit,
            Bound::Less => actual < limit,
        }
    }
}

/// Rule comparing a size (characters, keys, items) to a non-negative integer limit.
///
/// Fails with `{kind}.{bound}`.
pub(crate) fn size_rule(kind: &'static str, bound: Bound, measure: fn(&Value) -> usize) -> RuleDef {
    RuleDef::new(bound.name())
        .arg(
            ArgDef::new("limit")
                .assert(|v| v.as_u64().is_some(), "must be a non-negative integer")
                .refs(),
        )
        .validate(move |value, helpers, args| {
            let Some(limit) = args.get("limit").and_then(Value::as_u64) else {
                return Ok(Verdict::Keep);
            };
            if bound.holds(measure(value) as f64, limit as f64) {
                Ok(Verdict::Keep)
            } else {
                helpers.fail(
                    &format!("{}.{}", kind, bound.name()),
                    Details::new().with("limit", limit),
                )
            }
        })
}

/// Parse a JSON document held in a string, keeping it only when `accept` holds.
pub(crate) fn parse_json_string(value: &Value, accept: fn(&Value) -> bool) -> Verdict {
    let Some(text) = value.as_str() else {
        return Verdict::Keep;
    };
    match serde_json::from_str::<Value>(text) {
        Ok(parsed) if accept(&parsed) => Verdict::Value(Some(parsed)),
        _ => Verdict::Keep,
    }
}
