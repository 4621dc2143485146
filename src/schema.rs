//! The immutable schema value and its algebra.
//!
//! A [`Schema`] is a cheap handle to shared instance data. Builder calls never
//! change the receiver: they copy the instance data, apply the change, and
//! return the rebuilt copy. Nested schemas (in flags and terms) are shared,
//! not copied.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::definition::{Merge, RuleCall, TypeDef, TypeSpec};
use crate::error::SchemaError;
use crate::kinds::object::Dependency;
use crate::reference::{Arg, Ref, RefSet};
use crate::state::State;
use crate::types::{Presence, ANY};
use crate::values::Values;

/// Default computed from the value's parent when the value is absent.
pub type DefaultFn = Arc<dyn Fn(Option<&Value>) -> Result<Value, String> + Send + Sync>;
/// Message customizer.
pub type ErrorFn = Arc<dyn Fn(&ErrorReport<'_>) -> String + Send + Sync>;

/// What an error customizer is told about a failure.
#[derive(Debug)]
pub struct ErrorReport<'a> {
    pub code: &'a str,
    pub state: &'a State,
    pub context: &'a Value,
    pub details: &'a Map<String, Value>,
}

/// Replacement for template-based error messages.
#[derive(Clone)]
pub enum ErrorOverride {
    Message(String),
    Error(Arc<dyn std::error::Error + Send + Sync>),
    Func(ErrorFn),
}

impl ErrorOverride {
    pub fn func(f: impl Fn(&ErrorReport<'_>) -> String + Send + Sync + 'static) -> Self {
        ErrorOverride::Func(Arc::new(f))
    }

    pub(crate) fn render(&self, report: &ErrorReport<'_>) -> String {
        match self {
            ErrorOverride::Message(message) => message.clone(),
            ErrorOverride::Error(error) => error.to_string(),
            ErrorOverride::Func(f) => f(report),
        }
    }
}

impl PartialEq for ErrorOverride {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ErrorOverride::Message(a), ErrorOverride::Message(b)) => a == b,
            (ErrorOverride::Error(a), ErrorOverride::Error(b)) => Arc::ptr_eq(a, b),
            (ErrorOverride::Func(a), ErrorOverride::Func(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Value of a schema flag.
#[derive(Clone)]
pub enum Flag {
    Value(Value),
    Ref(Ref),
    Schema(Schema),
    Default(DefaultFn),
    /// Substitute an empty container and let per-key defaults fill it.
    Deep,
    Error(ErrorOverride),
}

impl Flag {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Flag::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn describe(&self) -> Value {
        match self {
            Flag::Value(v) => v.clone(),
            Flag::Ref(r) => r.describe(),
            Flag::Schema(s) => s.describe(),
            Flag::Default(_) => json!({ "special": "function" }),
            Flag::Deep => json!({ "special": "deep" }),
            Flag::Error(ErrorOverride::Message(m)) => Value::String(m.clone()),
            Flag::Error(ErrorOverride::Error(e)) => Value::String(e.to_string()),
            Flag::Error(ErrorOverride::Func(_)) => json!({ "special": "function" }),
        }
    }

    fn register(&self, refs: &mut RefSet) {
        match self {
            Flag::Ref(r) => refs.register(r, 0),
            Flag::Schema(s) => refs.register_set(s.refs(), 0),
            _ => {}
        }
    }
}

impl PartialEq for Flag {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Flag::Value(a), Flag::Value(b)) => a == b,
            (Flag::Ref(a), Flag::Ref(b)) => a == b,
            (Flag::Schema(a), Flag::Schema(b)) => a.same(b),
            (Flag::Default(a), Flag::Default(b)) => Arc::ptr_eq(a, b),
            (Flag::Deep, Flag::Deep) => true,
            (Flag::Error(a), Flag::Error(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Flag::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Flag::Ref(r) => f.debug_tuple("Ref").field(r).finish(),
            Flag::Schema(s) => f.debug_tuple("Schema").field(s).finish(),
            Flag::Default(_) => f.write_str("Default(..)"),
            Flag::Deep => f.write_str("Deep"),
            Flag::Error(_) => f.write_str("Error(..)"),
        }
    }
}

impl From<Value> for Flag {
    fn from(value: Value) -> Self {
        Flag::Value(value)
    }
}

impl From<bool> for Flag {
    fn from(value: bool) -> Self {
        Flag::Value(Value::Bool(value))
    }
}

impl From<&str> for Flag {
    fn from(value: &str) -> Self {
        Flag::Value(Value::String(value.to_string()))
    }
}

impl From<Ref> for Flag {
    fn from(reference: Ref) -> Self {
        Flag::Ref(reference)
    }
}

impl From<Schema> for Flag {
    fn from(schema: Schema) -> Self {
        Flag::Schema(schema)
    }
}

impl From<Arg> for Flag {
    fn from(arg: Arg) -> Self {
        match arg {
            Arg::Value(v) => Flag::Value(v),
            Arg::Ref(r) => Flag::Ref(r),
        }
    }
}

/// Branches applied when a referenced value matches `is`.
#[derive(Debug, Clone)]
pub struct Condition {
    pub(crate) is: Schema,
    pub(crate) then: Option<Schema>,
    pub(crate) otherwise: Option<Schema>,
}

impl Condition {
    pub fn is(schema: Schema) -> Self {
        Self {
            is: schema,
            then: None,
            otherwise: None,
        }
    }

    pub fn then(mut self, schema: Schema) -> Self {
        self.then = Some(schema);
        self
    }

    pub fn otherwise(mut self, schema: Schema) -> Self {
        self.otherwise = Some(schema);
        self
    }
}

/// Entry of a named term list.
#[derive(Debug, Clone)]
pub enum Term {
    Schema(Schema),
    Key { key: String, schema: Schema },
    When { reference: Ref, condition: Condition },
    Peers(Dependency),
}

impl Term {
    pub fn schema(&self) -> Option<&Schema> {
        match self {
            Term::Schema(schema) | Term::Key { schema, .. } => Some(schema),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match self {
            Term::Key { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn describe(&self) -> Value {
        match self {
            Term::Schema(schema) => schema.describe(),
            Term::Key { key, schema } => json!({ "key": key, "schema": schema.describe() }),
            Term::When {
                reference,
                condition,
            } => {
                let mut out = Map::new();
                out.insert("ref".into(), reference.describe());
                out.insert("is".into(), condition.is.describe());
                if let Some(then) = &condition.then {
                    out.insert("then".into(), then.describe());
                }
                if let Some(otherwise) = &condition.otherwise {
                    out.insert("otherwise".into(), otherwise.describe());
                }
                Value::Object(out)
            }
            Term::Peers(dependency) => dependency.describe(),
        }
    }

    fn register(&self, refs: &mut RefSet, depth: usize) {
        match self {
            Term::Schema(schema) | Term::Key { schema, .. } => {
                refs.register_set(schema.refs(), depth)
            }
            Term::When {
                reference,
                condition,
            } => {
                refs.register(reference, depth);
                refs.register_set(condition.is.refs(), depth);
                for branch in condition.then.iter().chain(&condition.otherwise) {
                    refs.register_set(branch.refs(), depth);
                }
            }
            // Peers address keys of the owning object, never outside it.
            Term::Peers(_) => {}
        }
    }
}

#[derive(Clone)]
pub(crate) struct Inner {
    pub(crate) def: Arc<TypeDef>,
    pub(crate) flags: BTreeMap<String, Flag>,
    pub(crate) rules: Vec<RuleCall>,
    pub(crate) valids: Values,
    pub(crate) invalids: Values,
    pub(crate) terms: BTreeMap<String, Vec<Term>>,
    pub(crate) refs: RefSet,
}

/// An immutable description of the constraints a value must satisfy.
#[derive(Clone)]
pub struct Schema {
    inner: Arc<Inner>,
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("kind", &self.kind())
            .field("flags", &self.inner.flags)
            .field("rules", &self.inner.rules)
            .finish_non_exhaustive()
    }
}

impl Schema {
    pub(crate) fn from_def(def: TypeDef) -> Schema {
        let mut schema = Schema {
            inner: Arc::new(Inner {
                def: Arc::new(def),
                flags: BTreeMap::new(),
                rules: Vec::new(),
                valids: Values::new(),
                invalids: Values::new(),
                terms: BTreeMap::new(),
                refs: RefSet::new(),
            }),
        };
        schema.rebuild();
        schema
    }

    fn mutate(&mut self) -> &mut Inner {
        Arc::make_mut(&mut self.inner)
    }

    /// Apply `change` to a copy and rebuild it.
    pub(crate) fn modify(&self, change: impl FnOnce(&mut Inner)) -> Schema {
        let mut next = self.clone();
        change(next.mutate());
        next.rebuild();
        next
    }

    /// Whether both handles point at the same instance data.
    pub fn same(&self, other: &Schema) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // --- Introspection ---

    pub fn kind(&self) -> &str {
        &self.inner.def.kind
    }

    pub fn def(&self) -> &TypeDef {
        &self.inner.def
    }

    pub fn flag(&self, name: &str) -> Option<&Flag> {
        self.inner.flags.get(name)
    }

    /// Boolean flag value, falling back to the type's default.
    pub fn flag_bool(&self, name: &str) -> bool {
        self.flag(name)
            .or_else(|| self.def().flag_default(name))
            .and_then(Flag::as_value)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// String flag value, falling back to the type's default.
    pub fn flag_str(&self, name: &str) -> Option<&str> {
        self.flag(name)
            .or_else(|| self.def().flag_default(name))
            .and_then(Flag::as_value)
            .and_then(Value::as_str)
    }

    pub fn presence(&self) -> Presence {
        self.flag_str("presence")
            .and_then(Presence::parse)
            .unwrap_or_default()
    }

    /// Label set with [`Schema::label`], if any.
    pub fn label_str(&self) -> Option<&str> {
        self.flag_str("label")
    }

    pub fn is_strip(&self) -> bool {
        self.flag_bool("strip")
    }

    pub fn is_only(&self) -> bool {
        self.flag_bool("only")
    }

    pub fn rules(&self) -> &[RuleCall] {
        &self.inner.rules
    }

    pub fn valids(&self) -> &Values {
        &self.inner.valids
    }

    pub fn invalids(&self) -> &Values {
        &self.inner.invalids
    }

    /// Whether the term list `name` was ever set, even to an empty list.
    pub fn has_terms(&self, name: &str) -> bool {
        self.inner.terms.contains_key(name)
    }

    pub fn terms(&self, name: &str) -> &[Term] {
        self.inner.terms.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Schemas of a term list, skipping non-schema terms.
    pub fn term_schemas(&self, name: &str) -> Vec<&Schema> {
        self.terms(name).iter().filter_map(Term::schema).collect()
    }

    pub fn refs(&self) -> &RefSet {
        &self.inner.refs
    }

    // --- Core algebra ---

    /// Replace a term list in place. For rebuild hooks.
    pub fn replace_terms(&mut self, name: &str, terms: Vec<Term>) {
        self.mutate().terms.insert(name.to_string(), terms);
    }

    /// Recompute references and run the type's rebuild hook.
    pub(crate) fn rebuild(&mut self) {
        let def = self.inner.def.clone();
        let inner = self.mutate();
        let mut refs = RefSet::new();

        for flag in inner.flags.values() {
            flag.register(&mut refs);
        }
        for rule in &inner.rules {
            for (_, arg) in &rule.args {
                if let Arg::Ref(r) = arg {
                    refs.register(r, 0);
                }
            }
        }
        for r in inner.valids.refs().iter().chain(inner.invalids.refs()) {
            refs.register(r, 0);
        }
        for (name, terms) in &inner.terms {
            let depth = def.terms.get(name).map_or(0, |t| t.depth);
            for term in terms {
                term.register(&mut refs, depth);
            }
        }
        inner.refs = refs;

        if let Some(rebuild) = &def.rebuild {
            rebuild(self);
        }
    }

    /// Set a flag. Setting a flag to its default removes it.
    pub fn set_flag(&self, name: &str, value: impl Into<Flag>) -> Schema {
        let value = value.into();
        let is_default = self.def().flag_default(name) == Some(&value);
        match self.flag(name) {
            Some(current) if *current == value => return self.clone(),
            None if is_default => return self.clone(),
            _ => {}
        }
        self.modify(|inner| {
            if is_default {
                inner.flags.remove(name);
            } else {
                inner.flags.insert(name.to_string(), value);
            }
        })
    }

    /// Record a rule invocation.
    ///
    /// # Errors
    ///
    /// Fails when the rule is unknown to this type, a reference is passed to
    /// an argument that does not accept one, or a literal argument fails its
    /// assertion.
    pub fn add_rule(&self, call: RuleCall) -> Result<Schema, SchemaError> {
        let def = self
            .inner
            .def
            .rules
            .get(&call.method)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownRule {
                kind: self.kind().to_string(),
                name: call.method.clone(),
            })?;

        for spec in &def.args {
            match call.get(&spec.name) {
                Some(Arg::Ref(_)) if spec.refs => {}
                Some(Arg::Ref(_)) => {
                    return Err(SchemaError::RefNotAllowed {
                        rule: call.name.clone(),
                        arg: spec.name.clone(),
                    })
                }
                Some(Arg::Value(v)) if spec.check(v) => {}
                None if spec.check(&Value::Null) => {}
                _ => {
                    return Err(SchemaError::InvalidArgument {
                        rule: call.name.clone(),
                        arg: spec.name.clone(),
                        reason: spec.reason.clone(),
                    })
                }
            }
        }

        Ok(self.modify(|inner| {
            if !def.multi {
                inner.rules.retain(|r| r.name != call.name);
            }
            if def.priority {
                inner.rules.insert(0, call);
            } else {
                inner.rules.push(call);
            }
        }))
    }

    /// Invoke a rule method registered on this type by name or alias.
    ///
    /// # Errors
    ///
    /// Fails when no such method exists or the method rejects its arguments.
    pub fn rule(&self, name: &str, args: &[Arg]) -> Result<Schema, SchemaError> {
        let method = self
            .def()
            .methods
            .get(name)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownRule {
                kind: self.kind().to_string(),
                name: name.to_string(),
            })?;
        method(self, args)
    }

    /// Merge `source` into this schema. `None` returns this schema.
    ///
    /// # Errors
    ///
    /// Fails when both schemas have different concrete kinds, or when a
    /// custom term merge fails.
    pub fn merge(&self, source: Option<&Schema>) -> Result<Schema, SchemaError> {
        let Some(source) = source else {
            return Ok(self.clone());
        };
        if self.same(source) {
            return Ok(self.clone());
        }
        if self.kind() != ANY && source.kind() != ANY && self.kind() != source.kind() {
            return Err(SchemaError::KindConflict {
                target: self.kind().to_string(),
                other: source.kind().to_string(),
            });
        }
        tracing::trace!(target_kind = self.kind(), source_kind = source.kind(), "merging schemas");

        let mut merged = self.clone();
        {
            let inner = merged.mutate();
            let (base, other) = if inner.def.kind == ANY && source.kind() != ANY {
                (&source.inner.def, &self.inner.def)
            } else {
                (&self.inner.def, &source.inner.def)
            };
            inner.def = if Arc::ptr_eq(base, other) {
                base.clone()
            } else {
                // Rules recorded by either side must stay resolvable.
                Arc::new(base.absorb(other))
            };

            for call in &source.inner.rules {
                let multi = source
                    .def()
                    .rule(&call.method)
                    .or_else(|| inner.def.rule(&call.method))
                    .map_or(false, |d| d.multi);
                if !multi {
                    inner.rules.retain(|r| r.name != call.name);
                }
            }
            inner.rules.extend(source.inner.rules.iter().cloned());

            for (name, flag) in &source.inner.flags {
                let next = match (inner.flags.get(name), flag) {
                    (Some(Flag::Schema(a)), Flag::Schema(b)) => Flag::Schema(a.merge(Some(b))?),
                    _ => flag.clone(),
                };
                inner.flags.insert(name.clone(), next);
            }

            inner.valids.merge(&source.inner.valids, &source.inner.invalids);
            inner.invalids.merge(&source.inner.invalids, &source.inner.valids);

            for (name, terms) in &source.inner.terms {
                let merge = inner
                    .def
                    .terms
                    .get(name)
                    .map_or(Merge::Concat, |t| t.merge.clone());
                let list = inner.terms.entry(name.clone()).or_default();
                match merge {
                    Merge::Concat => list.extend(terms.iter().cloned()),
                    Merge::Custom(f) => *list = f(list, terms, self, source)?,
                    Merge::Untouched => {}
                }
            }
        }
        merged.rebuild();
        Ok(merged)
    }

    /// Merge a concrete schema into this one.
    pub fn concat(&self, source: &Schema) -> Result<Schema, SchemaError> {
        self.merge(Some(source))
    }

    /// Derive a new type from this schema.
    ///
    /// The new type keeps this schema's instance data (flags, rules, terms)
    /// and gets its own copy of the type descriptor.
    ///
    /// # Errors
    ///
    /// Fails when `spec` redefines a flag, message, rule or term list that
    /// the type already has.
    pub fn extend(&self, spec: TypeSpec) -> Result<Schema, SchemaError> {
        self.def().check_collisions(&spec)?;
        Ok(self.derive(spec))
    }

    /// `extend` without collision checks, for built-in types.
    pub(crate) fn derive(&self, spec: TypeSpec) -> Schema {
        let def = self.def().derive(spec);
        self.modify(|inner| inner.def = Arc::new(def))
    }

    /// Fail unless this schema's type defines the term list `term`.
    pub(crate) fn ensure_term(&self, term: &str, method: &str) -> Result<(), SchemaError> {
        if self.def().terms.contains_key(term) {
            Ok(())
        } else {
            Err(SchemaError::WrongKind {
                method: method.to_string(),
                kind: self.kind().to_string(),
            })
        }
    }

    // --- Builders shared by every type ---

    /// Add values that always pass, bypassing every other check.
    pub fn valid<A: Into<Arg>>(&self, items: impl IntoIterator<Item = A>) -> Schema {
        let items: Vec<Arg> = items.into_iter().map(Into::into).collect();
        self.modify(|inner| {
            for item in &items {
                inner.valids.add(item);
                inner.invalids.remove(item);
            }
        })
    }

    /// Add values that always fail.
    pub fn invalid<A: Into<Arg>>(&self, items: impl IntoIterator<Item = A>) -> Schema {
        let items: Vec<Arg> = items.into_iter().map(Into::into).collect();
        self.modify(|inner| {
            for item in &items {
                inner.invalids.add(item);
                inner.valids.remove(item);
            }
        })
    }

    /// Only values of the valid set pass.
    pub fn only(&self) -> Schema {
        self.set_flag("only", true)
    }

    pub fn required(&self) -> Schema {
        self.set_flag("presence", Presence::Required.as_str())
    }

    pub fn optional(&self) -> Schema {
        self.set_flag("presence", Presence::Optional.as_str())
    }

    pub fn forbidden(&self) -> Schema {
        self.set_flag("presence", Presence::Forbidden.as_str())
    }

    /// Default used when the value is absent: a literal or a reference.
    pub fn default(&self, value: impl Into<Arg>) -> Schema {
        let value: Arg = value.into();
        self.set_flag("default", value)
    }

    /// Default computed from the parent value.
    pub fn default_fn(
        &self,
        f: impl Fn(Option<&Value>) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Schema {
        self.set_flag("default", Flag::Default(Arc::new(f)))
    }

    /// Default to an empty container filled by nested defaults.
    pub fn default_deep(&self) -> Schema {
        self.set_flag("default", Flag::Deep)
    }

    pub fn label(&self, label: &str) -> Schema {
        self.set_flag("label", label)
    }

    /// Remove the value from its parent after successful validation.
    pub fn strip(&self) -> Schema {
        self.set_flag("strip", true)
    }

    pub fn error(&self, error: ErrorOverride) -> Schema {
        self.set_flag("error", Flag::Error(error))
    }

    /// Merge `then` or `otherwise` depending on whether the referenced value
    /// matches `is`. A condition without an explicit presence requires the
    /// referenced value to exist.
    pub fn when(&self, reference: impl Into<Ref>, condition: Condition) -> Schema {
        let mut condition = condition;
        if condition.is.flag("presence").is_none() {
            condition.is = condition.is.required();
        }
        let reference = reference.into();
        self.modify(|inner| {
            inner
                .terms
                .entry("whens".to_string())
                .or_default()
                .push(Term::When {
                    reference,
                    condition,
                });
        })
    }

    /// Sugar for the `min` rule of this type.
    pub fn min(&self, limit: impl Into<Arg>) -> Result<Schema, SchemaError> {
        self.rule("min", &[limit.into()])
    }

    /// Sugar for the `max` rule of this type.
    pub fn max(&self, limit: impl Into<Arg>) -> Result<Schema, SchemaError> {
        self.rule("max", &[limit.into()])
    }

    /// Sugar for the `length` rule of this type.
    pub fn length(&self, limit: impl Into<Arg>) -> Result<Schema, SchemaError> {
        self.rule("length", &[limit.into()])
    }

    // --- Introspection dump ---

    /// Serializable structural dump of the schema.
    pub fn describe(&self) -> Value {
        let mut out = Map::new();
        out.insert("type".into(), Value::String(self.kind().to_string()));

        if !self.inner.flags.is_empty() {
            let flags: Map<String, Value> = self
                .inner
                .flags
                .iter()
                .map(|(name, flag)| (name.clone(), flag.describe()))
                .collect();
            out.insert("flags".into(), Value::Object(flags));
        }

        if !self.inner.rules.is_empty() {
            let rules = self
                .inner
                .rules
                .iter()
                .map(|call| {
                    let mut rule = Map::new();
                    rule.insert("name".into(), Value::String(call.name.clone()));
                    if !call.args.is_empty() {
                        let args: Map<String, Value> = call
                            .args
                            .iter()
                            .map(|(name, arg)| (name.clone(), arg.describe()))
                            .collect();
                        rule.insert("args".into(), Value::Object(args));
                    }
                    Value::Object(rule)
                })
                .collect();
            out.insert("rules".into(), Value::Array(rules));
        }

        if !self.inner.valids.is_empty() {
            out.insert("allow".into(), Value::Array(self.inner.valids.describe()));
        }
        if !self.inner.invalids.is_empty() {
            out.insert("invalid".into(), Value::Array(self.inner.invalids.describe()));
        }

        for (name, terms) in &self.inner.terms {
            let def = self.def().terms.get(name);
            if def.map_or(false, |d| d.hidden) {
                continue;
            }
            // Empty lists render only through a custom renderer.
            if terms.is_empty() && def.map_or(true, |d| d.describe.is_none()) {
                continue;
            }
            let rendered = match def.and_then(|d| d.describe.as_ref()) {
                Some(describe) => describe(terms),
                None => Value::Array(terms.iter().map(Term::describe).collect()),
            };
            out.insert(name.clone(), rendered);
        }

        Value::Object(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{any, number, object, string};
    use serde_json::json;

    #[test]
    fn builders_never_mutate_receiver() {
        let base = string();
        let before = base.describe();
        let _ = base.required().label("name").valid(["a"]);
        assert_eq!(base.describe(), before);
    }

    #[test]
    fn clone_is_idempotent() {
        let s = number().min(1).unwrap().valid([5]).label("n");
        let once = s.clone();
        let twice = once.clone();
        assert_eq!(once.describe(), twice.describe());
        assert_eq!(s.describe(), once.describe());
    }

    #[test]
    fn set_flag_default_is_absent() {
        let s = any().required().optional();
        assert!(s.flag("presence").is_none());
        assert_eq!(s.describe(), json!({ "type": "any" }));
    }

    #[test]
    fn set_flag_same_value_returns_same_schema() {
        let s = any().required();
        assert!(s.required().same(&s));
        assert!(any().optional().same(&any()));
    }

    #[test]
    fn valid_removes_from_invalid() {
        let s = any().invalid(["x"]).valid(["x"]);
        assert_eq!(s.valids().len(), 1);
        assert!(s.invalids().is_empty());

        let s = s.invalid(["x"]);
        assert!(s.valids().is_empty());
        assert_eq!(s.invalids().len(), 1);
    }

    #[test]
    fn merge_none_and_self_are_identity() {
        let s = string().min(2).unwrap();
        assert!(s.merge(None).unwrap().same(&s));
        assert!(s.merge(Some(&s)).unwrap().same(&s));
    }

    #[test]
    fn merge_kind_conflict_errors() {
        let result = string().concat(&number());
        assert!(matches!(
            result,
            Err(SchemaError::KindConflict { target, other }) if target == "string" && other == "number"
        ));
    }

    #[test]
    fn merge_any_adopts_concrete_kind() {
        let merged = any().required().concat(&number().min(3).unwrap()).unwrap();
        assert_eq!(merged.kind(), "number");
        assert_eq!(merged.presence(), Presence::Required);
        assert_eq!(merged.rules().len(), 1);
    }

    #[test]
    fn merge_single_rule_replaces() {
        let merged = number()
            .min(1)
            .unwrap()
            .concat(&number().min(5).unwrap())
            .unwrap();
        assert_eq!(merged.rules().len(), 1);
        assert_eq!(merged.rules()[0].get("limit"), Some(&Arg::from(5)));
    }

    #[test]
    fn merge_value_sets_cross_remove() {
        let target = any().valid([1, 2]).invalid([3]);
        let source = any().valid([3]).invalid([1]);
        let merged = target.concat(&source).unwrap();
        assert_eq!(merged.valids().literals(), &[json!(2), json!(3)]);
        assert_eq!(merged.invalids().literals(), &[json!(1)]);
    }

    #[test]
    fn merge_flags_override_and_nested_schemas_merge() {
        let target = any()
            .label("a")
            .set_flag("probe", Flag::Schema(string().min(1).unwrap()));
        let source = any()
            .label("b")
            .set_flag("probe", Flag::Schema(string().max(4).unwrap()));
        let merged = target.concat(&source).unwrap();
        assert_eq!(merged.label_str(), Some("b"));
        match merged.flag("probe") {
            Some(Flag::Schema(probe)) => assert_eq!(probe.rules().len(), 2),
            other => panic!("expected schema flag, got {:?}", other),
        }
    }

    #[test]
    fn merge_recomputes_refs() {
        let target = any();
        let source = any().default(Ref::new("a.b"));
        let merged = target.concat(&source).unwrap();
        assert_eq!(merged.refs().iter().collect::<Vec<_>>(), vec![(1, "a")]);
    }

    #[test]
    fn add_rule_rejects_bad_literal() {
        let result = string().min("three");
        assert!(matches!(
            result,
            Err(SchemaError::InvalidArgument { rule, arg, .. }) if rule == "min" && arg == "limit"
        ));
    }

    #[test]
    fn add_rule_defers_refs_and_registers_them() {
        let s = number().min(Ref::new("floor")).unwrap();
        assert_eq!(s.refs().siblings().collect::<Vec<_>>(), vec!["floor"]);
        assert_eq!(
            s.describe()["rules"][0]["args"]["limit"]["ref"],
            json!("value")
        );
    }

    #[test]
    fn unknown_rule_errors() {
        assert!(matches!(
            any().rule("nope", &[]),
            Err(SchemaError::UnknownRule { .. })
        ));
    }

    #[test]
    fn wrong_kind_builder_errors() {
        assert!(matches!(
            string().keys([("a", any())]),
            Err(SchemaError::WrongKind { .. })
        ));
    }

    #[test]
    fn when_requires_is_by_default() {
        let s = any().when("a", Condition::is(string()).then(any().required()));
        match &s.terms("whens")[0] {
            Term::When { condition, .. } => {
                assert_eq!(condition.is.presence(), Presence::Required)
            }
            other => panic!("expected condition, got {:?}", other),
        }
        assert_eq!(s.refs().siblings().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn describe_object_renders_keys_map() {
        let s = object()
            .keys([("a", number().required()), ("b", string())])
            .unwrap();
        let d = s.describe();
        assert_eq!(d["type"], "object");
        assert_eq!(d["keys"]["a"]["flags"]["presence"], "required");
        assert_eq!(d["keys"]["b"], json!({ "type": "string" }));
    }
}
