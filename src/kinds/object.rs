//! Object schemas: declared keys, peer dependencies and unknown-key policy.
//!
//! Keys are kept in dependency order: a key whose schema references a
//! sibling is validated after that sibling, so the reference sees the
//! sibling's final value.

use once_cell::sync::Lazy;
use serde_json::{json, Map, Value};

use crate::definition::{TermDef, TypeSpec, Verdict};
use crate::error::SchemaError;
use crate::messages::Details;
use crate::reference::lookup;
use crate::schema::{Schema, Term};
use crate::state::Segment;
use crate::types::json_type_name;
use crate::validator::Helpers;

use super::any::any;
use super::{parse_json_string, size_rule, Bound};

/// Relation enforced between a set of peer keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// All peers or none.
    And,
    /// Not all peers at once.
    Nand,
    /// At least one peer.
    Or,
    /// Exactly one peer.
    Xor,
    /// At most one peer.
    Oxor,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::And => "and",
            Relation::Nand => "nand",
            Relation::Or => "or",
            Relation::Xor => "xor",
            Relation::Oxor => "oxor",
        }
    }
}

/// A peer constraint over keys of the object itself.
#[derive(Debug, Clone, PartialEq)]
pub struct Dependency {
    relation: Relation,
    peers: Vec<String>,
}

impl Dependency {
    pub fn new<S: Into<String>>(relation: Relation, peers: impl IntoIterator<Item = S>) -> Self {
        Self {
            relation,
            peers: peers.into_iter().map(Into::into).collect(),
        }
    }

    pub fn relation(&self) -> Relation {
        self.relation
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn describe(&self) -> Value {
        json!({ "rel": self.relation.as_str(), "peers": self.peers })
    }

    /// Error code and details when the constraint does not hold for `object`.
    fn check(&self, object: &Map<String, Value>) -> Option<(&'static str, Details)> {
        let (present, missing): (Vec<&String>, Vec<&String>) = self.peers.iter().partition(|peer| {
            let path: Vec<String> = peer.split('.').map(String::from).collect();
            path.split_first()
                .and_then(|(head, tail)| object.get(head).and_then(|v| lookup(v, tail)))
                .is_some()
        });
        let list = |keys: &[&String]| {
            Value::Array(keys.iter().map(|k| Value::String(k.to_string())).collect())
        };

        match self.relation {
            Relation::And if !present.is_empty() && !missing.is_empty() => Some((
                "object.and",
                Details::new()
                    .with("present", list(&present))
                    .with("missing", list(&missing)),
            )),
            Relation::Nand if missing.is_empty() => {
                let (main, rest) = self.peers.split_first()?;
                Some((
                    "object.nand",
                    Details::new()
                        .with("main", main.as_str())
                        .with("peers", rest.to_vec()),
                ))
            }
            Relation::Or | Relation::Xor if present.is_empty() => Some((
                "object.missing",
                Details::new().with("peers", self.peers.clone()),
            )),
            Relation::Xor if present.len() > 1 => Some((
                "object.xor",
                Details::new()
                    .with("peers", self.peers.clone())
                    .with("present", list(&present)),
            )),
            Relation::Oxor if present.len() > 1 => Some((
                "object.oxor",
                Details::new()
                    .with("peers", self.peers.clone())
                    .with("present", list(&present)),
            )),
            _ => None,
        }
    }
}

static OBJECT: Lazy<Schema> = Lazy::new(|| {
    any().derive(
        TypeSpec::new("object")
            .flag("unknown", false)
            .term("keys", TermDef::new().depth(1).merge(merge_keys).describe(describe_keys))
            .term("dependencies", TermDef::new())
            .message("object.base", "{#label} must be of type object")
            .message("object.unknown", "{#label} is not allowed")
            .message(
                "object.and",
                "{#label} contains {present} without its required peers {missing}",
            )
            .message(
                "object.nand",
                "{#label} {main} must not exist simultaneously with {peers}",
            )
            .message("object.missing", "{#label} must contain at least one of {peers}")
            .message(
                "object.xor",
                "{#label} contains a conflict between exclusive peers {peers}",
            )
            .message(
                "object.oxor",
                "{#label} contains a conflict between optional exclusive peers {peers}",
            )
            .message("object.min", "{#label} must have at least {limit} keys")
            .message("object.max", "{#label} must have less than or equal to {limit} keys")
            .message("object.length", "{#label} must have {limit} keys")
            .rule(size_rule("object", Bound::Min, key_count))
            .rule(size_rule("object", Bound::Max, key_count))
            .rule(size_rule("object", Bound::Length, key_count))
            .coerce(|value, _| Ok(parse_json_string(value, Value::is_object)))
            .validate(validate)
            .rebuild(sort_keys),
    )
});

/// Schema for JSON objects. Without declared keys, any key is accepted.
pub fn object() -> Schema {
    OBJECT.clone()
}

fn key_count(value: &Value) -> usize {
    value.as_object().map_or(0, Map::len)
}

impl Schema {
    /// Declare child keys. Keys declared again merge into the existing schema.
    ///
    /// Calling with no keys makes every key unknown.
    ///
    /// # Errors
    ///
    /// Fails on non-object schemas or when a redeclared key's schemas cannot
    /// be merged.
    pub fn keys<K: Into<String>>(
        &self,
        keys: impl IntoIterator<Item = (K, Schema)>,
    ) -> Result<Schema, SchemaError> {
        self.ensure_term("keys", "keys")?;
        let incoming: Vec<Term> = keys
            .into_iter()
            .map(|(key, schema)| Term::Key {
                key: key.into(),
                schema,
            })
            .collect();
        let merged = merge_keys(self.terms("keys"), &incoming, self, self)?;
        Ok(self.modify(|inner| {
            inner.terms.insert("keys".to_string(), merged);
        }))
    }

    /// Keep unknown keys regardless of options.
    pub fn unknown(&self, allow: bool) -> Schema {
        self.set_flag("unknown", allow)
    }

    /// Add a peer constraint.
    ///
    /// # Errors
    ///
    /// Fails on non-object schemas.
    pub fn dependency(&self, dependency: Dependency) -> Result<Schema, SchemaError> {
        self.ensure_term("dependencies", dependency.relation.as_str())?;
        Ok(self.modify(|inner| {
            inner
                .terms
                .entry("dependencies".to_string())
                .or_default()
                .push(Term::Peers(dependency));
        }))
    }

    /// All of `peers` must be present together, or none of them.
    pub fn and<S: Into<String>>(
        &self,
        peers: impl IntoIterator<Item = S>,
    ) -> Result<Schema, SchemaError> {
        self.dependency(Dependency::new(Relation::And, peers))
    }

    /// `peers` must not all be present at once.
    pub fn nand<S: Into<String>>(
        &self,
        peers: impl IntoIterator<Item = S>,
    ) -> Result<Schema, SchemaError> {
        self.dependency(Dependency::new(Relation::Nand, peers))
    }

    /// At least one of `peers` must be present.
    pub fn or<S: Into<String>>(
        &self,
        peers: impl IntoIterator<Item = S>,
    ) -> Result<Schema, SchemaError> {
        self.dependency(Dependency::new(Relation::Or, peers))
    }

    /// Exactly one of `peers` must be present.
    pub fn xor<S: Into<String>>(
        &self,
        peers: impl IntoIterator<Item = S>,
    ) -> Result<Schema, SchemaError> {
        self.dependency(Dependency::new(Relation::Xor, peers))
    }

    /// At most one of `peers` may be present.
    pub fn oxor<S: Into<String>>(
        &self,
        peers: impl IntoIterator<Item = S>,
    ) -> Result<Schema, SchemaError> {
        self.dependency(Dependency::new(Relation::Oxor, peers))
    }
}

/// Append keys from `source`; keys present on both sides merge.
fn merge_keys(
    target: &[Term],
    source: &[Term],
    _: &Schema,
    _: &Schema,
) -> Result<Vec<Term>, SchemaError> {
    let mut merged = target.to_vec();
    for term in source {
        let Term::Key { key, schema } = term else {
            merged.push(term.clone());
            continue;
        };
        match merged.iter_mut().find(|t| t.key() == Some(key.as_str())) {
            Some(Term::Key {
                schema: existing, ..
            }) => *existing = existing.merge(Some(schema))?,
            _ => merged.push(term.clone()),
        }
    }
    Ok(merged)
}

fn describe_keys(terms: &[Term]) -> Value {
    let keys: Map<String, Value> = terms
        .iter()
        .filter_map(|term| match term {
            Term::Key { key, schema } => Some((key.clone(), schema.describe())),
            _ => None,
        })
        .collect();
    Value::Object(keys)
}

/// Reorder keys so that referenced siblings come first.
///
/// Keys caught in a reference cycle keep their current relative order.
fn sort_keys(schema: &mut Schema) {
    let terms = schema.terms("keys");
    if terms.len() < 2 {
        return;
    }
    let names: Vec<&str> = terms.iter().map(|t| t.key().unwrap_or("")).collect();
    let after: Vec<Vec<usize>> = terms
        .iter()
        .enumerate()
        .map(|(i, term)| {
            let Some(child) = term.schema() else {
                return Vec::new();
            };
            let mut deps: Vec<usize> = child
                .refs()
                .siblings()
                .filter_map(|root| names.iter().position(|n| *n == root))
                .filter(|j| *j != i)
                .collect();
            deps.sort_unstable();
            deps.dedup();
            deps
        })
        .collect();

    let mut placed = vec![false; terms.len()];
    let mut order = Vec::with_capacity(terms.len());
    while order.len() < terms.len() {
        let next = (0..terms.len())
            .find(|&i| !placed[i] && after[i].iter().all(|&j| placed[j]));
        match next {
            Some(i) => {
                placed[i] = true;
                order.push(i);
            }
            None => {
                let cycle: Vec<&str> = (0..terms.len())
                    .filter(|&i| !placed[i])
                    .map(|i| names[i])
                    .collect();
                tracing::debug!(keys = ?cycle, "cyclic key references, keeping declaration order");
                order.extend((0..terms.len()).filter(|&i| !placed[i]));
                break;
            }
        }
    }

    if order.iter().enumerate().all(|(pos, &i)| pos == i) {
        return;
    }
    let sorted = order.into_iter().map(|i| terms[i].clone()).collect();
    schema.replace_terms("keys", sorted);
}

fn validate(value: &Value, helpers: &Helpers<'_>) -> Result<Verdict, SchemaError> {
    let Value::Object(input) = value else {
        return helpers.fail(
            "object.base",
            Details::new().with("type", json_type_name(value)),
        );
    };

    let schema = helpers.schema();
    let options = helpers.options();
    let declared = schema.terms("keys");
    let mut out = input.clone();
    let mut errors = Vec::new();

    macro_rules! reject {
        ($errors:expr) => {{
            errors.extend($errors);
            if options.abort_early {
                return Ok(Verdict::Errors(errors));
            }
        }};
    }

    if options.recursive {
        for term in declared {
            let Term::Key { key, schema: child } = term else {
                continue;
            };
            let state = helpers
                .state()
                .dive(Value::Object(out.clone()), Segment::Key(key.clone()));
            let report = helpers.validate(child, out.get(key), &state)?;
            if !report.is_ok() {
                reject!(report.errors);
                continue;
            }

            if child.is_strip() {
                out.retain(|k, _| k != key);
            } else if let Some(result) = report.value {
                out.insert(key.clone(), result);
            } else if out.contains_key(key) {
                out.retain(|k, _| k != key);
            }
        }
    }

    for term in schema.terms("dependencies") {
        let Term::Peers(dependency) = term else {
            continue;
        };
        if let Some((code, details)) = dependency.check(&out) {
            reject!([helpers.error(code, details)?]);
        }
    }

    if schema.has_terms("keys") && !schema.flag_bool("unknown") {
        let unknown: Vec<String> = out
            .keys()
            .filter(|k| !declared.iter().any(|t| t.key() == Some(k.as_str())))
            .cloned()
            .collect();
        if options.strip_unknown {
            out.retain(|k, _| !unknown.contains(k));
        } else if !options.allow_unknown {
            for key in unknown {
                let state = helpers
                    .state()
                    .dive(Value::Object(out.clone()), Segment::Key(key.clone()));
                reject!([helpers.error_at(
                    "object.unknown",
                    &state,
                    Details::new().with("child", key.as_str())
                )?]);
            }
        }
    }

    if errors.is_empty() {
        Ok(Verdict::Value(Some(Value::Object(out))))
    } else {
        Ok(Verdict::Errors(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Ref;
    use crate::types::ValidateOptions;
    use crate::{number, string};

    fn key_order(schema: &Schema) -> Vec<&str> {
        schema.terms("keys").iter().filter_map(Term::key).collect()
    }

    #[test]
    fn keys_sorted_after_referenced_siblings() {
        let s = object()
            .keys([
                ("b", number().min(Ref::new("a")).unwrap()),
                ("c", number()),
                ("a", number()),
            ])
            .unwrap();
        assert_eq!(key_order(&s), vec!["c", "a", "b"]);
    }

    #[test]
    fn repeated_sibling_references_sort_once() {
        let s = object()
            .keys([
                (
                    "b",
                    number()
                        .min(Ref::new("a"))
                        .unwrap()
                        .max(Ref::new("c"))
                        .unwrap()
                        .invalid([Ref::new("a")]),
                ),
                ("c", number()),
                ("a", number()),
            ])
            .unwrap();
        assert_eq!(key_order(&s), vec!["c", "a", "b"]);
        assert!(s.validate(&json!({ "a": 1, "b": 2, "c": 3 })).is_ok());
    }

    #[test]
    fn cyclic_references_keep_declaration_order() {
        let s = object()
            .keys([
                ("x", number()),
                ("a", number().min(Ref::new("b")).unwrap()),
                ("b", number().min(Ref::new("a")).unwrap()),
            ])
            .unwrap();
        assert_eq!(key_order(&s), vec!["x", "a", "b"]);
    }

    #[test]
    fn redeclared_keys_merge() {
        let s = object()
            .keys([("a", number())])
            .unwrap()
            .keys([("a", number().required())])
            .unwrap();
        assert_eq!(key_order(&s), vec!["a"]);
        let err = s.validate(&json!({})).unwrap_err();
        assert_eq!(err.codes(), vec!["any.required"]);
    }

    #[test]
    fn object_refs_exclude_internal_siblings() {
        let s = object()
            .keys([("a", number()), ("b", number().min(Ref::new("a")).unwrap())])
            .unwrap();
        assert!(s.refs().siblings().next().is_none());
        assert_eq!(s.refs().iter().collect::<Vec<_>>(), vec![(0, "a")]);
    }

    #[test]
    fn absent_keys_are_not_written() {
        let s = object().keys([("a", string()), ("b", number())]).unwrap();
        assert_eq!(s.validate(&json!({})).unwrap(), Some(json!({})));
    }

    #[test]
    fn strip_keys_removed() {
        let s = object()
            .keys([("a", string()), ("secret", string().strip())])
            .unwrap();
        assert_eq!(
            s.validate(&json!({ "a": "x", "secret": "y" })).unwrap(),
            Some(json!({ "a": "x" }))
        );
    }

    #[test]
    fn unknown_key_policy() {
        let s = object().keys([("a", number())]).unwrap();
        let input = json!({ "a": 1, "extra": true });

        let err = s.validate(&input).unwrap_err();
        assert_eq!(err.codes(), vec!["object.unknown"]);
        assert_eq!(err.errors()[0].path.as_deref(), Some("extra"));
        assert_eq!(err.errors()[0].message, "\"extra\" is not allowed");

        let stripped = ValidateOptions::default().strip_unknown(true);
        assert_eq!(
            s.validate_with(Some(&input), &stripped).unwrap(),
            Some(json!({ "a": 1 }))
        );

        let allowed = ValidateOptions::default().allow_unknown(true);
        assert_eq!(s.validate_with(Some(&input), &allowed).unwrap(), Some(input.clone()));

        assert_eq!(s.unknown(true).validate(&input).unwrap(), Some(input.clone()));
        assert_eq!(object().validate(&input).unwrap(), Some(input.clone()));

        let err = object().keys(Vec::<(&str, Schema)>::new()).unwrap().validate(&input).unwrap_err();
        assert_eq!(err.codes(), vec!["object.unknown"]);
    }

    #[test]
    fn peer_relations() {
        let base = object().keys([("a", any()), ("b", any())]).unwrap();

        let and = base.and(["a", "b"]).unwrap();
        assert!(and.validate(&json!({})).is_ok());
        assert!(and.validate(&json!({ "a": 1, "b": 2 })).is_ok());
        let err = and.validate(&json!({ "a": 1 })).unwrap_err();
        assert_eq!(err.codes(), vec!["object.and"]);
        assert_eq!(err.errors()[0].message, "\"unknown\" contains a without its required peers b");

        let nand = base.nand(["a", "b"]).unwrap();
        assert_eq!(
            nand.validate(&json!({ "a": 1, "b": 2 })).unwrap_err().codes(),
            vec!["object.nand"]
        );

        let or = base.or(["a", "b"]).unwrap();
        assert_eq!(or.validate(&json!({})).unwrap_err().codes(), vec!["object.missing"]);

        let xor = base.xor(["a", "b"]).unwrap();
        assert_eq!(xor.validate(&json!({})).unwrap_err().codes(), vec!["object.missing"]);
        assert_eq!(
            xor.validate(&json!({ "a": 1, "b": 2 })).unwrap_err().codes(),
            vec!["object.xor"]
        );
        assert!(xor.validate(&json!({ "b": 2 })).is_ok());

        let oxor = base.oxor(["a", "b"]).unwrap();
        assert!(oxor.validate(&json!({})).is_ok());
        assert_eq!(
            oxor.validate(&json!({ "a": 1, "b": 2 })).unwrap_err().codes(),
            vec!["object.oxor"]
        );
    }

    #[test]
    fn sibling_reference_sees_validated_value() {
        let s = object()
            .keys([
                ("b", number().min(Ref::new("a")).unwrap()),
                ("a", number().default(10)),
            ])
            .unwrap();
        let err = s.validate(&json!({ "b": 3 })).unwrap_err();
        assert_eq!(err.codes(), vec!["number.min"]);
        assert_eq!(err.errors()[0].message, "\"b\" must be greater than or equal to 10");
    }

    #[test]
    fn key_count_rules() {
        let s = object().min(1).unwrap().max(2).unwrap();
        assert_eq!(s.validate(&json!({})).unwrap_err().codes(), vec!["object.min"]);
        assert_eq!(
            s.validate(&json!({ "a": 1, "b": 2, "c": 3 })).unwrap_err().codes(),
            vec!["object.max"]
        );
        assert!(object().length(1).unwrap().validate(&json!({ "a": 1 })).is_ok());
    }

    #[test]
    fn coerces_json_strings_when_not_strict() {
        let loose = ValidateOptions::default().strict(false);
        let s = object().keys([("a", number())]).unwrap();
        assert_eq!(
            s.validate_with(Some(&json!("{\"a\": 1}")), &loose).unwrap(),
            Some(json!({ "a": 1 }))
        );
        assert_eq!(
            s.validate(&json!("{\"a\": 1}")).unwrap_err().codes(),
            vec!["object.base"]
        );
    }

    #[test]
    fn abort_early_off_collects_every_key() {
        let s = object()
            .keys([("a", number()), ("b", string())])
            .unwrap();
        let opts = ValidateOptions::default().abort_early(false);
        let err = s
            .validate_with(Some(&json!({ "a": "x", "b": 1, "c": 0 })), &opts)
            .unwrap_err();
        assert_eq!(err.codes(), vec!["number.base", "string.base", "object.unknown"]);
    }

    #[test]
    fn wrong_kind_errors() {
        assert!(matches!(
            number().and(["a"]),
            Err(SchemaError::WrongKind { .. })
        ));
    }
}
