//! Strings with character-count limits.

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::definition::{TypeSpec, Verdict};
use crate::messages::Details;
use crate::schema::Schema;

use super::any::any;
use super::{size_rule, Bound};

static STRING: Lazy<Schema> = Lazy::new(|| {
    any().derive(
        TypeSpec::new("string")
            .message("string.base", "{#label} must be a string")
            .message(
                "string.min",
                "{#label} length must be at least {limit} characters long",
            )
            .message(
                "string.max",
                "{#label} length must be less than or equal to {limit} characters long",
            )
            .message("string.length", "{#label} length must be {limit} characters long")
            .rule(size_rule("string", Bound::Min, char_count))
            .rule(size_rule("string", Bound::Max, char_count))
            .rule(size_rule("string", Bound::Length, char_count))
            .validate(|value, helpers| {
                if value.is_string() {
                    Ok(Verdict::Keep)
                } else {
                    helpers.fail("string.base", Details::new())
                }
            }),
    )
});

pub fn string() -> Schema {
    STRING.clone()
}

fn char_count(value: &Value) -> usize {
    value.as_str().map_or(0, |s| s.chars().count())
}
