//! The validation pipeline.
//!
//! Each schema node runs the same stages against its value:
//!
//! 1. conditions (`when`), resolved against the original input
//! 2. valid values, which short-circuit to success
//! 3. invalid values
//! 4. presence and defaults
//! 5. forbidden check
//! 6. coerce (non-strict only) and base validate
//! 7. rules, in order
//!
//! Structural types call back into the pipeline for their children through
//! [`Helpers::validate`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::definition::{RuleArgs, Verdict};
use crate::error::{SchemaError, ValidateError, ValidationError};
use crate::messages::{self, Details};
use crate::reference::Arg;
use crate::schema::{Flag, Schema, Term};
use crate::state::State;
use crate::types::{Presence, ValidateOptions};

/// Outcome of validating one value: the final value, or the errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    /// Final value; `None` when absent or when validation failed.
    pub value: Option<Value>,
    /// Errors, empty on success.
    pub errors: Vec<ValidationError>,
}

impl Report {
    pub fn ok(value: Option<Value>) -> Self {
        Self {
            value,
            errors: Vec::new(),
        }
    }

    pub fn failed(errors: Vec<ValidationError>) -> Self {
        Self {
            value: None,
            errors,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Option<Value>, ValidateError> {
        if self.errors.is_empty() {
            Ok(self.value)
        } else {
            Err(ValidateError::Invalid {
                errors: self.errors,
            })
        }
    }
}

/// What hooks and rules see of the running validation.
pub struct Helpers<'a> {
    schema: &'a Schema,
    state: &'a State,
    options: &'a ValidateOptions,
    original: Option<&'a Value>,
}

impl<'a> Helpers<'a> {
    /// Schema being validated, with conditions applied.
    pub fn schema(&self) -> &Schema {
        self.schema
    }

    pub fn state(&self) -> &State {
        self.state
    }

    pub fn options(&self) -> &ValidateOptions {
        self.options
    }

    pub fn context(&self) -> &Value {
        &self.options.context
    }

    /// Value as received, before defaults and coercion.
    pub fn original(&self) -> Option<&Value> {
        self.original
    }

    /// Error for `code` at the current state.
    pub fn error(&self, code: &str, details: Details) -> Result<ValidationError, SchemaError> {
        messages::build(
            self.schema,
            code,
            self.state,
            self.context(),
            &details,
            self.schema.label_str(),
        )
    }

    /// Error for `code` at a child state, labelled by the child's path.
    pub fn error_at(
        &self,
        code: &str,
        state: &State,
        details: Details,
    ) -> Result<ValidationError, SchemaError> {
        messages::build(self.schema, code, state, self.context(), &details, None)
    }

    /// Failing verdict with a single error.
    pub fn fail(&self, code: &str, details: Details) -> Result<Verdict, SchemaError> {
        Ok(Verdict::Errors(vec![self.error(code, details)?]))
    }

    /// Validate a nested value with the same options.
    pub fn validate(
        &self,
        schema: &Schema,
        value: Option<&Value>,
        state: &State,
    ) -> Result<Report, SchemaError> {
        run(schema, value, state, self.options, None)
    }

    /// Validate a nested value with a presence override.
    pub fn validate_with_presence(
        &self,
        schema: &Schema,
        value: Option<&Value>,
        state: &State,
        presence: Presence,
    ) -> Result<Report, SchemaError> {
        run(schema, value, state, self.options, Some(presence))
    }
}

impl Schema {
    /// Validate with default options.
    ///
    /// # Errors
    ///
    /// Returns `ValidateError::Invalid` with the collected errors, or
    /// `ValidateError::Schema` when the schema itself is unusable.
    pub fn validate(&self, value: &Value) -> Result<Option<Value>, ValidateError> {
        self.validate_with(Some(value), &ValidateOptions::default())
    }

    /// Validate a possibly absent value with explicit options.
    pub fn validate_with(
        &self,
        value: Option<&Value>,
        options: &ValidateOptions,
    ) -> Result<Option<Value>, ValidateError> {
        self.report(value, options)?.into_result()
    }

    /// Validate and return the final value together with the errors.
    ///
    /// # Errors
    ///
    /// Only usage errors are returned as `Err`; validation failures are data.
    pub fn report(
        &self,
        value: Option<&Value>,
        options: &ValidateOptions,
    ) -> Result<Report, SchemaError> {
        let report = run(self, value, &State::new(), options, None)?;
        if !report.is_ok() {
            tracing::debug!(
                kind = self.kind(),
                errors = report.errors.len(),
                first = %report.errors[0],
                "validation failed"
            );
        }
        Ok(report)
    }

    /// Validate and fail with the first error only.
    pub fn attempt(
        &self,
        value: Option<&Value>,
        options: &ValidateOptions,
    ) -> Result<Option<Value>, ValidateError> {
        let mut report = self.report(value, options)?;
        report.errors.truncate(1);
        report.into_result()
    }
}

/// Run the pipeline for one schema node.
pub(crate) fn run(
    schema: &Schema,
    value: Option<&Value>,
    state: &State,
    options: &ValidateOptions,
    presence: Option<Presence>,
) -> Result<Report, SchemaError> {
    tracing::trace!(kind = schema.kind(), path = ?state.dotted_path(), "validating");

    let schema = apply_conditions(schema, value, state, options)?;
    let schema = &schema;
    let helpers = Helpers {
        schema,
        state,
        options,
        original: value,
    };
    let ancestors = state.ancestors();
    let context = &options.context;
    let mut errors = Vec::new();

    macro_rules! reject {
        ($error:expr) => {{
            errors.push($error);
            if options.abort_early {
                return Ok(Report::failed(errors));
            }
        }};
    }

    if let Some(v) = value {
        let valids = schema.valids();
        if !valids.is_empty() && valids.has(v, ancestors, context)? {
            return Ok(Report::ok(Some(v.clone())));
        }
        if schema.is_only() {
            let grammar = if valids.len() == 1 { "" } else { "one of " };
            reject!(helpers.error(
                "any.only",
                Details::new()
                    .with("grammar", grammar)
                    .with_values("valids", valids)
            )?);
        }
        if !schema.invalids().is_empty() && schema.invalids().has(v, ancestors, context)? {
            reject!(helpers.error(
                "any.invalid",
                Details::new().with_values("invalids", schema.invalids())
            )?);
        }
    }

    let presence = presence.unwrap_or_else(|| schema.presence());
    let mut value = match value {
        Some(v) => v.clone(),
        None => match presence {
            Presence::Required => {
                errors.push(helpers.error("any.required", Details::new())?);
                return Ok(Report::failed(errors));
            }
            Presence::Forbidden | Presence::Ignore => return Ok(finish(None, errors)),
            Presence::Optional => match resolve_default(schema, &helpers)? {
                Fallback::Done(report) => {
                    errors.extend(report.errors);
                    return Ok(finish(report.value, errors));
                }
                Fallback::Container(empty) => empty,
            },
        },
    };

    if presence == Presence::Forbidden {
        errors.push(helpers.error("any.forbidden", Details::new())?);
        return Ok(Report::failed(errors));
    }

    let def = schema.def();
    if !options.strict {
        if let Some(coerce) = &def.coerce {
            match coerce(&value, &helpers)? {
                Verdict::Keep => {}
                Verdict::Value(Some(v)) => value = v,
                Verdict::Value(None) => return Ok(finish(None, errors)),
                Verdict::Errors(e) => {
                    errors.extend(e);
                    return Ok(Report::failed(errors));
                }
            }
        }
    }

    if let Some(validate) = &def.validate {
        match validate(&value, &helpers)? {
            Verdict::Keep => {}
            Verdict::Value(Some(v)) => value = v,
            Verdict::Value(None) => return Ok(finish(None, errors)),
            Verdict::Errors(e) => {
                errors.extend(e);
                return Ok(Report::failed(errors));
            }
        }
    }

    for call in schema.rules() {
        let rule = def.rule(&call.method).ok_or_else(|| SchemaError::UnknownRule {
            kind: schema.kind().to_string(),
            name: call.method.clone(),
        })?;
        let Some(validate) = &rule.validate else {
            continue;
        };

        let mut args = RuleArgs::default();
        let mut unresolved = None;
        for (name, arg) in call.args() {
            match arg {
                Arg::Value(v) => args.push(name, v.clone()),
                Arg::Ref(reference) => {
                    let resolved = reference
                        .resolve(Some(&value), ancestors, context)?
                        .unwrap_or(Value::Null);
                    let spec = rule.arg_def(name);
                    if spec.map_or(false, |s| !s.check(&resolved)) {
                        let reason = spec.map(|s| s.reason.clone()).unwrap_or_default();
                        unresolved = Some(
                            Details::new()
                                .with("arg", name.as_str())
                                .with_ref("ref", reference)
                                .with("reason", reason),
                        );
                        break;
                    }
                    args.push(name, resolved);
                }
            }
        }
        if let Some(details) = unresolved {
            reject!(helpers.error("any.ref", details)?);
            continue;
        }

        match validate(&value, &helpers, &args)? {
            Verdict::Keep => {}
            Verdict::Value(Some(v)) => value = v,
            Verdict::Value(None) => return Ok(finish(None, errors)),
            Verdict::Errors(e) => {
                for error in e {
                    reject!(error);
                }
            }
        }
    }

    Ok(finish(Some(value), errors))
}

fn finish(value: Option<Value>, errors: Vec<ValidationError>) -> Report {
    if errors.is_empty() {
        Report::ok(value)
    } else {
        Report::failed(errors)
    }
}

/// Merge `then`/`otherwise` branches of every condition into a working copy.
fn apply_conditions(
    schema: &Schema,
    value: Option<&Value>,
    state: &State,
    options: &ValidateOptions,
) -> Result<Schema, SchemaError> {
    let mut working = schema.clone();
    for term in schema.terms("whens") {
        let Term::When {
            reference,
            condition,
        } = term
        else {
            continue;
        };
        let target = reference.resolve(value, state.ancestors(), &options.context)?;
        let probe = run(&condition.is, target.as_ref(), state, options, None)?;
        let branch = if probe.is_ok() {
            condition.then.as_ref()
        } else {
            condition.otherwise.as_ref()
        };
        working = working.merge(branch)?;
    }
    Ok(working)
}

enum Fallback {
    Done(Report),
    /// Empty container for the type to fill with nested defaults.
    Container(Value),
}

fn resolve_default(schema: &Schema, helpers: &Helpers<'_>) -> Result<Fallback, SchemaError> {
    let state = helpers.state();
    let report = match schema.flag("default") {
        None => Report::ok(None),
        Some(Flag::Value(v)) => Report::ok(Some(v.clone())),
        Some(Flag::Ref(reference)) => Report::ok(reference.resolve(
            None,
            state.ancestors(),
            helpers.context(),
        )?),
        Some(Flag::Default(f)) => match f(state.parent()) {
            Ok(v) => Report::ok(Some(v)),
            Err(error) => Report::failed(vec![
                helpers.error("any.default", Details::new().with("error", error))?
            ]),
        },
        Some(Flag::Deep) => {
            let empty = if schema.kind() == "array" {
                Value::Array(Vec::new())
            } else {
                Value::Object(Map::new())
            };
            return Ok(Fallback::Container(empty));
        }
        Some(_) => Report::ok(None),
    };
    Ok(Fallback::Done(report))
}
