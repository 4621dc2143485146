//! Alternatives: a value must match some combination of candidate schemas.

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::definition::{TermDef, TypeSpec, Verdict};
use crate::error::SchemaError;
use crate::messages::Details;
use crate::schema::{Schema, Term};
use crate::validator::Helpers;

use super::any::any;

/// How many candidates must match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Match {
    /// The first matching candidate wins.
    Any,
    /// Exactly one candidate must match.
    One,
    /// Every candidate must match.
    All,
}

impl Match {
    pub fn as_str(&self) -> &'static str {
        match self {
            Match::Any => "any",
            Match::One => "one",
            Match::All => "all",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "any" => Some(Match::Any),
            "one" => Some(Match::One),
            "all" => Some(Match::All),
            _ => None,
        }
    }
}

static ALTERNATIVES: Lazy<Schema> = Lazy::new(|| {
    any().derive(
        TypeSpec::new("alternatives")
            .flag("match", Match::Any.as_str())
            .term("matches", TermDef::new())
            .message(
                "alternatives.match",
                "{#label} does not match any of the allowed types",
            )
            .message(
                "alternatives.one",
                "{#label} matches more than one allowed type",
            )
            .message(
                "alternatives.all",
                "{#label} does not match all of the required types",
            )
            .validate(validate),
    )
});

/// Schema matching a value against candidate schemas.
pub fn alternatives() -> Schema {
    ALTERNATIVES.clone()
}

impl Schema {
    /// Add candidate schemas, tried in order.
    ///
    /// # Errors
    ///
    /// Fails on non-alternatives schemas.
    pub fn candidates(
        &self,
        schemas: impl IntoIterator<Item = Schema>,
    ) -> Result<Schema, SchemaError> {
        self.ensure_term("matches", "candidates")?;
        let schemas: Vec<Term> = schemas.into_iter().map(Term::Schema).collect();
        Ok(self.modify(|inner| {
            inner
                .terms
                .entry("matches".to_string())
                .or_default()
                .extend(schemas);
        }))
    }

    /// Set the match mode.
    ///
    /// # Errors
    ///
    /// Fails on non-alternatives schemas.
    pub fn match_mode(&self, mode: Match) -> Result<Schema, SchemaError> {
        self.ensure_term("matches", "match_mode")?;
        Ok(self.set_flag("match", mode.as_str()))
    }
}

fn validate(value: &Value, helpers: &Helpers<'_>) -> Result<Verdict, SchemaError> {
    let schema = helpers.schema();
    let candidates = schema.term_schemas("matches");
    if candidates.is_empty() {
        return Ok(Verdict::Keep);
    }
    let mode = schema
        .flag_str("match")
        .and_then(Match::parse)
        .unwrap_or(Match::Any);
    let state = helpers.state();

    match mode {
        Match::Any => {
            for candidate in candidates {
                let report = helpers.validate(candidate, Some(value), state)?;
                if report.is_ok() {
                    return Ok(Verdict::Value(report.value));
                }
            }
            helpers.fail("alternatives.match", Details::new())
        }
        Match::One => {
            let mut matched = None;
            for candidate in candidates {
                let report = helpers.validate(candidate, Some(value), state)?;
                if !report.is_ok() {
                    continue;
                }
                if matched.is_some() {
                    return helpers.fail("alternatives.one", Details::new());
                }
                matched = Some(report.value);
            }
            match matched {
                Some(result) => Ok(Verdict::Value(result)),
                None => helpers.fail("alternatives.match", Details::new()),
            }
        }
        Match::All => {
            for candidate in candidates {
                let report = helpers.validate(candidate, Some(value), state)?;
                if !report.is_ok() {
                    return helpers.fail("alternatives.all", Details::new());
                }
            }
            Ok(Verdict::Keep)
        }
    }
}
