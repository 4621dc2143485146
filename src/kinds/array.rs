//! Array schemas: positional (`ordered`) and pooled (`items`) element schemas.
//!
//! On rebuild the `items` list is split into three pools:
//!
//! - required: each schema must be matched by exactly one element
//! - inclusions: every schema that is not forbidden (required ones included)
//! - exclusions: forbidden schemas; an element matching one is rejected

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::definition::{TermDef, TypeSpec, Verdict};
use crate::error::{SchemaError, ValidationError};
use crate::messages::Details;
use crate::schema::{Schema, Term};
use crate::state::{Segment, State};
use crate::types::{json_type_name, Presence};
use crate::validator::Helpers;

use super::any::any;
use super::{parse_json_string, size_rule, Bound};

const REQUIREDS: &str = "_requireds";
const INCLUSIONS: &str = "_inclusions";
const EXCLUSIONS: &str = "_exclusions";

static ARRAY: Lazy<Schema> = Lazy::new(|| {
    let pool = || TermDef::new().depth(1).untouched().hidden();
    any().derive(
        TypeSpec::new("array")
            .flag("sparse", false)
            .term("items", TermDef::new().depth(1))
            .term("ordered", TermDef::new().depth(1))
            .term(REQUIREDS, pool())
            .term(INCLUSIONS, pool())
            .term(EXCLUSIONS, pool())
            .message("array.base", "{#label} must be an array")
            .message("array.sparse", "{#label} must not be a sparse array item")
            .message("array.forbidden", "{#label} contains an excluded value")
            .message(
                "array.orderedLength",
                "{#label} must contain at most {limit} items",
            )
            .message(
                "array.required",
                "{#label} does not match any of the allowed types",
            )
            .message("array.requiredKnowns", "{#label} does not contain {knownMisses}")
            .message(
                "array.requiredUnknowns",
                "{#label} does not contain {unknownMisses} required {noun}",
            )
            .message(
                "array.requiredBoth",
                "{#label} does not contain {knownMisses}, and {unknownMisses} other required {noun}",
            )
            .message("array.min", "{#label} must contain at least {limit} items")
            .message(
                "array.max",
                "{#label} must contain less than or equal to {limit} items",
            )
            .message("array.length", "{#label} must contain {limit} items")
            .rule(size_rule("array", Bound::Min, item_count))
            .rule(size_rule("array", Bound::Max, item_count))
            .rule(size_rule("array", Bound::Length, item_count))
            .coerce(|value, _| Ok(parse_json_string(value, Value::is_array)))
            .validate(validate)
            .rebuild(split_pools),
    )
});

/// Schema for JSON arrays. Without item schemas, any element is accepted.
pub fn array() -> Schema {
    ARRAY.clone()
}

fn item_count(value: &Value) -> usize {
    value.as_array().map_or(0, Vec::len)
}

impl Schema {
    /// Add schemas that elements may match in any position.
    ///
    /// # Errors
    ///
    /// Fails on non-array schemas.
    pub fn items(&self, schemas: impl IntoIterator<Item = Schema>) -> Result<Schema, SchemaError> {
        self.append_terms("items", schemas)
    }

    /// Add schemas matched against elements by position.
    ///
    /// # Errors
    ///
    /// Fails on non-array schemas.
    pub fn ordered(&self, schemas: impl IntoIterator<Item = Schema>) -> Result<Schema, SchemaError> {
        self.append_terms("ordered", schemas)
    }

    /// Keep positions whose result is absent, as `null`.
    pub fn sparse(&self, enabled: bool) -> Schema {
        self.set_flag("sparse", enabled)
    }

    fn append_terms(
        &self,
        name: &str,
        schemas: impl IntoIterator<Item = Schema>,
    ) -> Result<Schema, SchemaError> {
        self.ensure_term(name, name)?;
        let schemas: Vec<Term> = schemas.into_iter().map(Term::Schema).collect();
        Ok(self.modify(|inner| {
            inner
                .terms
                .entry(name.to_string())
                .or_default()
                .extend(schemas);
        }))
    }
}

fn split_pools(schema: &mut Schema) {
    let mut requireds = Vec::new();
    let mut inclusions = Vec::new();
    let mut exclusions = Vec::new();
    for item in schema.term_schemas("items") {
        match item.presence() {
            Presence::Required => {
                requireds.push(Term::Schema(item.clone()));
                inclusions.push(Term::Schema(item.clone()));
            }
            Presence::Forbidden => exclusions.push(Term::Schema(item.clone())),
            _ => inclusions.push(Term::Schema(item.clone())),
        }
    }
    schema.replace_terms(REQUIREDS, requireds);
    schema.replace_terms(INCLUSIONS, inclusions);
    schema.replace_terms(EXCLUSIONS, exclusions);
}

fn validate(value: &Value, helpers: &Helpers<'_>) -> Result<Verdict, SchemaError> {
    let Value::Array(elements) = value else {
        return helpers.fail(
            "array.base",
            Details::new().with("type", json_type_name(value)),
        );
    };

    let schema = helpers.schema();
    let options = helpers.options();
    if !options.recursive {
        return Ok(Verdict::Keep);
    }

    let ordered = schema.term_schemas("ordered");
    let inclusions = schema.term_schemas(INCLUSIONS);
    let exclusions = schema.term_schemas(EXCLUSIONS);
    let mut requireds = schema.term_schemas(REQUIREDS);
    let has_items = !schema.terms("items").is_empty();
    let sparse = schema.flag_bool("sparse");

    let mut next_ordered = 0;
    let mut out = Vec::with_capacity(elements.len());
    let mut errors: Vec<ValidationError> = Vec::new();

    macro_rules! reject {
        ($errors:expr) => {{
            errors.extend($errors);
            if options.abort_early {
                return Ok(Verdict::Errors(errors));
            }
        }};
    }

    for (pos, element) in elements.iter().enumerate() {
        let state = helpers.state().dive(value.clone(), Segment::Index(pos));
        let located = || Details::new().with("pos", pos).with("value", element.clone());

        let mut excluded = false;
        for exclusion in &exclusions {
            let probe =
                helpers.validate_with_presence(exclusion, Some(element), &state, Presence::Ignore)?;
            if probe.is_ok() {
                excluded = true;
                break;
            }
        }
        if excluded {
            reject!([helpers.error_at("array.forbidden", &state, located())?]);
            continue;
        }

        if let Some(positional) = ordered.get(next_ordered) {
            next_ordered += 1;
            let report = helpers.validate(positional, Some(element), &state)?;
            if !report.is_ok() {
                reject!(report.errors);
                continue;
            }
            if positional.is_strip() {
                continue;
            }
            if let Some(error) =
                write_back(&mut out, report.value, sparse, helpers, &state, located())?
            {
                reject!([error]);
            }
            continue;
        }

        if !has_items {
            if !ordered.is_empty() {
                reject!([helpers.error_at(
                    "array.orderedLength",
                    &state,
                    located().with("limit", ordered.len())
                )?]);
                continue;
            }
            out.push(element.clone());
            continue;
        }

        let mut matched = None;
        for (slot, required) in requireds.iter().enumerate() {
            let report = helpers.validate(required, Some(element), &state)?;
            if report.is_ok() {
                matched = Some((slot, report));
                break;
            }
        }
        if let Some((slot, report)) = matched {
            let consumed = requireds.remove(slot);
            if !consumed.is_strip() {
                if let Some(error) =
                    write_back(&mut out, report.value, sparse, helpers, &state, located())?
                {
                    reject!([error]);
                }
            }
            continue;
        }

        let mut found = false;
        let mut lone = None;
        for inclusion in &inclusions {
            let report = helpers.validate(inclusion, Some(element), &state)?;
            if report.is_ok() {
                if !inclusion.is_strip() {
                    if let Some(error) =
                        write_back(&mut out, report.value, sparse, helpers, &state, located())?
                    {
                        reject!([error]);
                    }
                }
                found = true;
                break;
            }
            // A lone candidate reports its own errors.
            if inclusions.len() == 1 {
                lone = Some(report.errors);
            }
        }
        if found || options.strip_unknown {
            continue;
        }
        match lone {
            Some(candidate_errors) => reject!(candidate_errors),
            None => reject!([helpers.error_at("array.required", &state, located())?]),
        }
    }

    let leftover = requireds
        .into_iter()
        .chain(
            ordered
                .iter()
                .skip(next_ordered)
                .copied()
                .filter(|s| s.presence() == Presence::Required),
        );
    if let Some(error) = missing_error(helpers, leftover)? {
        errors.push(error);
    }

    if errors.is_empty() {
        Ok(Verdict::Value(Some(Value::Array(out))))
    } else {
        Ok(Verdict::Errors(errors))
    }
}

/// Append an element's result. An absent result becomes `null` on sparse
/// arrays and an `array.sparse` error otherwise.
fn write_back(
    out: &mut Vec<Value>,
    result: Option<Value>,
    sparse: bool,
    helpers: &Helpers<'_>,
    state: &State,
    details: Details,
) -> Result<Option<ValidationError>, SchemaError> {
    match result {
        Some(value) => out.push(value),
        None if sparse => out.push(Value::Null),
        None => return helpers.error_at("array.sparse", state, details).map(Some),
    }
    Ok(None)
}

/// Aggregate error for required schemas no element satisfied.
fn missing_error<'s>(
    helpers: &Helpers<'_>,
    missing: impl Iterator<Item = &'s Schema>,
) -> Result<Option<ValidationError>, SchemaError> {
    let mut known = Vec::new();
    let mut unknown = 0usize;
    for schema in missing {
        match schema.label_str() {
            Some(label) => known.push(Value::String(label.to_string())),
            None => unknown += 1,
        }
    }
    let noun = if unknown == 1 { "value" } else { "values" };

    let error = match (known.is_empty(), unknown) {
        (true, 0) => return Ok(None),
        (false, 0) => helpers.error(
            "array.requiredKnowns",
            Details::new().with("knownMisses", known),
        )?,
        (true, n) => helpers.error(
            "array.requiredUnknowns",
            Details::new().with("unknownMisses", n).with("noun", noun),
        )?,
        (false, n) => helpers.error(
            "array.requiredBoth",
            Details::new()
                .with("knownMisses", known)
                .with("unknownMisses", n)
                .with("noun", noun),
        )?,
    };
    Ok(Some(error))
}
