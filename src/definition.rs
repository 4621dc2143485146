//! Type descriptors and the extension API.
//!
//! Every schema carries a shared [`TypeDef`]: the message templates, rule
//! definitions, flag defaults, term-list definitions and lifecycle hooks of
//! its type. Descriptors are never mutated once shared; `Schema::extend`
//! copies the parent descriptor and applies a [`TypeSpec`] to the copy.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{SchemaError, ValidationError};
use crate::reference::Arg;
use crate::schema::{Flag, Schema, Term};
use crate::validator::Helpers;

/// Result of a hook or rule.
#[derive(Debug, Clone)]
pub enum Verdict {
    /// Value passes unchanged.
    Keep,
    /// Value passes and is replaced.
    Value(Option<Value>),
    /// Value fails.
    Errors(Vec<ValidationError>),
}

/// Coerce and base-validate hooks.
pub type HookFn = Arc<dyn Fn(&Value, &Helpers<'_>) -> Result<Verdict, SchemaError> + Send + Sync>;
/// Validation function of a rule, called with its resolved arguments.
pub type RuleFn =
    Arc<dyn Fn(&Value, &Helpers<'_>, &RuleArgs) -> Result<Verdict, SchemaError> + Send + Sync>;
/// Post-change hook that may reorganise a schema's terms.
pub type RebuildFn = Arc<dyn Fn(&mut Schema) + Send + Sync>;
/// Builder method attached to a type under a rule name.
pub type MethodFn = Arc<dyn Fn(&Schema, &[Arg]) -> Result<Schema, SchemaError> + Send + Sync>;
/// Argument assertion.
pub type AssertFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
/// Custom term-list merge: `(target, source, target schema, source schema)`.
pub type MergeFn =
    Arc<dyn Fn(&[Term], &[Term], &Schema, &Schema) -> Result<Vec<Term>, SchemaError> + Send + Sync>;
/// Custom introspection rendering of a term list.
pub type DescribeFn = Arc<dyn Fn(&[Term]) -> Value + Send + Sync>;

/// Declared argument of a rule.
#[derive(Clone)]
pub struct ArgDef {
    pub(crate) name: String,
    pub(crate) assert: Option<AssertFn>,
    pub(crate) reason: String,
    pub(crate) refs: bool,
}

impl ArgDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            assert: None,
            reason: String::new(),
            refs: false,
        }
    }

    /// Require literal and resolved values to satisfy `assert`.
    ///
    /// `reason` completes the sentence "argument X ...", e.g. "must be a number".
    pub fn assert(
        mut self,
        assert: impl Fn(&Value) -> bool + Send + Sync + 'static,
        reason: impl Into<String>,
    ) -> Self {
        self.assert = Some(Arc::new(assert));
        self.reason = reason.into();
        self
    }

    /// Accept references, resolved at validation time.
    pub fn refs(mut self) -> Self {
        self.refs = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn check(&self, value: &Value) -> bool {
        self.assert.as_ref().map_or(true, |assert| assert(value))
    }
}

impl fmt::Debug for ArgDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArgDef")
            .field("name", &self.name)
            .field("refs", &self.refs)
            .finish_non_exhaustive()
    }
}

/// Definition of a rule: its arguments, validation function and method.
#[derive(Clone)]
pub struct RuleDef {
    pub(crate) name: String,
    pub(crate) args: Vec<ArgDef>,
    pub(crate) validate: Option<RuleFn>,
    pub(crate) method: Option<MethodFn>,
    pub(crate) aliases: Vec<String>,
    pub(crate) multi: bool,
    pub(crate) priority: bool,
}

impl RuleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            validate: None,
            method: None,
            aliases: Vec::new(),
            multi: false,
            priority: false,
        }
    }

    pub fn arg(mut self, arg: ArgDef) -> Self {
        self.args.push(arg);
        self
    }

    pub fn validate(
        mut self,
        validate: impl Fn(&Value, &Helpers<'_>, &RuleArgs) -> Result<Verdict, SchemaError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    /// Builder method bound under the rule's name.
    ///
    /// Without one, a method that records an invocation is generated.
    pub fn method(
        mut self,
        method: impl Fn(&Schema, &[Arg]) -> Result<Schema, SchemaError> + Send + Sync + 'static,
    ) -> Self {
        self.method = Some(Arc::new(method));
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Allow several invocations to coexist instead of the last one winning.
    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    /// Insert invocations in front of existing rules.
    pub fn priority(mut self) -> Self {
        self.priority = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn arg_def(&self, name: &str) -> Option<&ArgDef> {
        self.args.iter().find(|a| a.name == name)
    }

    /// Method that records an invocation, mapping positional arguments onto
    /// the declared argument names.
    fn recorder(&self) -> MethodFn {
        let name = self.name.clone();
        let names: Vec<String> = self.args.iter().map(|a| a.name.clone()).collect();
        Arc::new(move |schema: &Schema, args: &[Arg]| {
            let call = names
                .iter()
                .zip(args)
                .fold(RuleCall::new(&name), |call, (n, a)| call.arg(n, a.clone()));
            schema.add_rule(call)
        })
    }
}

impl fmt::Debug for RuleDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDef")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("multi", &self.multi)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// One invocation of a rule recorded on a schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCall {
    pub(crate) name: String,
    pub(crate) method: String,
    pub(crate) args: Vec<(String, Arg)>,
}

impl RuleCall {
    /// Invocation of the rule definition with the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            method: name.clone(),
            name,
            args: Vec::new(),
        }
    }

    /// Use a differently named rule definition.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn arg(mut self, name: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.args.push((name.into(), value.into()));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&Arg> {
        self.args.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    pub fn args(&self) -> &[(String, Arg)] {
        &self.args
    }
}

/// Rule arguments with references resolved.
#[derive(Debug, Clone, Default)]
pub struct RuleArgs {
    values: Vec<(String, Value)>,
}

impl RuleArgs {
    pub(crate) fn push(&mut self, name: &str, value: Value) {
        self.values.push((name.to_string(), value));
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn f64(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(Value::as_f64)
    }
}

/// How two schemas' lists under the same term name combine.
#[derive(Clone)]
pub enum Merge {
    Concat,
    Custom(MergeFn),
    /// Keep the target's list; used for lists derived by `rebuild`.
    Untouched,
}

/// Definition of a named term list.
#[derive(Clone)]
pub struct TermDef {
    pub(crate) merge: Merge,
    pub(crate) depth: usize,
    pub(crate) hidden: bool,
    pub(crate) describe: Option<DescribeFn>,
}

impl Default for TermDef {
    fn default() -> Self {
        Self {
            merge: Merge::Concat,
            depth: 0,
            hidden: false,
            describe: None,
        }
    }
}

impl TermDef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn merge(
        mut self,
        merge: impl Fn(&[Term], &[Term], &Schema, &Schema) -> Result<Vec<Term>, SchemaError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.merge = Merge::Custom(Arc::new(merge));
        self
    }

    pub fn untouched(mut self) -> Self {
        self.merge = Merge::Untouched;
        self
    }

    /// Schemas in this list validate values `depth` levels below the owner.
    pub fn depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    /// Leave the list out of `describe()`.
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn describe(mut self, describe: impl Fn(&[Term]) -> Value + Send + Sync + 'static) -> Self {
        self.describe = Some(Arc::new(describe));
        self
    }
}

/// Options for deriving a new type with `Schema::extend`.
#[derive(Default)]
pub struct TypeSpec {
    pub(crate) kind: Option<String>,
    pub(crate) messages: Vec<(String, String)>,
    pub(crate) flags: Vec<(String, Flag)>,
    pub(crate) terms: Vec<(String, TermDef)>,
    pub(crate) rules: Vec<RuleDef>,
    pub(crate) coerce: Option<HookFn>,
    pub(crate) validate: Option<HookFn>,
    pub(crate) rebuild: Option<RebuildFn>,
}

impl TypeSpec {
    /// Derive a type with a new kind tag.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            ..Self::default()
        }
    }

    /// Derive a type that keeps the parent's kind tag.
    pub fn inherit() -> Self {
        Self::default()
    }

    pub fn message(mut self, code: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages.push((code.into(), template.into()));
        self
    }

    pub fn flag(mut self, name: impl Into<String>, default: impl Into<Flag>) -> Self {
        self.flags.push((name.into(), default.into()));
        self
    }

    pub fn term(mut self, name: impl Into<String>, def: TermDef) -> Self {
        self.terms.push((name.into(), def));
        self
    }

    pub fn rule(mut self, rule: RuleDef) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn coerce(
        mut self,
        coerce: impl Fn(&Value, &Helpers<'_>) -> Result<Verdict, SchemaError> + Send + Sync + 'static,
    ) -> Self {
        self.coerce = Some(Arc::new(coerce));
        self
    }

    pub fn validate(
        mut self,
        validate: impl Fn(&Value, &Helpers<'_>) -> Result<Verdict, SchemaError> + Send + Sync + 'static,
    ) -> Self {
        self.validate = Some(Arc::new(validate));
        self
    }

    pub fn rebuild(mut self, rebuild: impl Fn(&mut Schema) + Send + Sync + 'static) -> Self {
        self.rebuild = Some(Arc::new(rebuild));
        self
    }
}

/// Shared, immutable description of a schema type.
#[derive(Clone, Default)]
pub struct TypeDef {
    pub(crate) kind: String,
    pub(crate) messages: BTreeMap<String, String>,
    pub(crate) rules: BTreeMap<String, Arc<RuleDef>>,
    pub(crate) methods: BTreeMap<String, MethodFn>,
    pub(crate) flags: BTreeMap<String, Flag>,
    pub(crate) terms: BTreeMap<String, TermDef>,
    pub(crate) coerce: Option<HookFn>,
    pub(crate) validate: Option<HookFn>,
    pub(crate) rebuild: Option<RebuildFn>,
}

impl TypeDef {
    pub(crate) fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self, code: &str) -> Option<&str> {
        self.messages.get(code).map(String::as_str)
    }

    pub fn rule(&self, name: &str) -> Option<&RuleDef> {
        self.rules.get(name).map(Arc::as_ref)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn flag_default(&self, name: &str) -> Option<&Flag> {
        self.flags.get(name)
    }

    /// Reject a `TypeSpec` that redefines anything this type already has.
    pub(crate) fn check_collisions(&self, spec: &TypeSpec) -> Result<(), SchemaError> {
        let kind = || self.kind.clone();
        if let Some((code, _)) = spec.messages.iter().find(|(c, _)| self.messages.contains_key(c)) {
            return Err(SchemaError::MessageCollision {
                kind: kind(),
                code: code.clone(),
            });
        }
        if let Some((name, _)) = spec.flags.iter().find(|(n, _)| self.flags.contains_key(n)) {
            return Err(SchemaError::FlagCollision {
                kind: kind(),
                name: name.clone(),
            });
        }
        if let Some((name, _)) = spec.terms.iter().find(|(n, _)| self.terms.contains_key(n)) {
            return Err(SchemaError::TermCollision {
                kind: kind(),
                name: name.clone(),
            });
        }
        if let Some(rule) = spec
            .rules
            .iter()
            .find(|r| self.rules.contains_key(&r.name) || self.methods.contains_key(&r.name))
        {
            return Err(SchemaError::RuleCollision {
                kind: kind(),
                name: rule.name.clone(),
            });
        }
        Ok(())
    }

    /// Copy of this descriptor that also knows the rules, methods, messages,
    /// flag defaults and term lists of `other`. Entries already present win;
    /// hooks are not copied.
    pub(crate) fn absorb(&self, other: &TypeDef) -> TypeDef {
        let mut def = self.clone();
        for (code, template) in &other.messages {
            def.messages
                .entry(code.clone())
                .or_insert_with(|| template.clone());
        }
        for (name, rule) in &other.rules {
            def.rules.entry(name.clone()).or_insert_with(|| rule.clone());
        }
        for (name, method) in &other.methods {
            def.methods
                .entry(name.clone())
                .or_insert_with(|| method.clone());
        }
        for (name, flag) in &other.flags {
            def.flags.entry(name.clone()).or_insert_with(|| flag.clone());
        }
        for (name, term) in &other.terms {
            def.terms.entry(name.clone()).or_insert_with(|| term.clone());
        }
        def
    }

    /// Copy of this descriptor with `spec` applied on top.
    pub(crate) fn derive(&self, spec: TypeSpec) -> TypeDef {
        let mut def = self.clone();
        if let Some(kind) = spec.kind {
            def.kind = kind;
        }
        def.messages.extend(spec.messages);
        def.flags.extend(spec.flags);
        def.terms.extend(spec.terms);
        def.coerce = sequence(def.coerce.take(), spec.coerce);
        def.validate = sequence(def.validate.take(), spec.validate);
        def.rebuild = match (def.rebuild.take(), spec.rebuild) {
            (Some(first), Some(next)) => Some(Arc::new(move |schema: &mut Schema| {
                first(schema);
                next(schema);
            })),
            (first, next) => first.or(next),
        };

        for rule in spec.rules {
            let method = match (&rule.method, &rule.validate) {
                (Some(method), _) => Some(method.clone()),
                (None, Some(_)) => Some(rule.recorder()),
                (None, None) => None,
            };
            if let Some(method) = method {
                for alias in &rule.aliases {
                    def.methods.insert(alias.clone(), method.clone());
                }
                def.methods.insert(rule.name.clone(), method);
            }
            def.rules.insert(rule.name.clone(), Arc::new(rule));
        }
        def
    }
}

impl fmt::Debug for TypeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDef")
            .field("kind", &self.kind)
            .field("messages", &self.messages.keys().collect::<Vec<_>>())
            .field("rules", &self.rules.keys().collect::<Vec<_>>())
            .field("flags", &self.flags.keys().collect::<Vec<_>>())
            .field("terms", &self.terms.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Run `first`, then `next` on its output; the first failure wins.
fn sequence(first: Option<HookFn>, next: Option<HookFn>) -> Option<HookFn> {
    match (first, next) {
        (Some(first), Some(next)) => Some(Arc::new(move |value: &Value, helpers: &Helpers<'_>| {
            match first(value, helpers)? {
                Verdict::Keep => next(value, helpers),
                Verdict::Value(Some(replaced)) => match next(&replaced, helpers)? {
                    Verdict::Keep => Ok(Verdict::Value(Some(replaced))),
                    other => Ok(other),
                },
                done => Ok(done),
            }
        })),
        (first, next) => first.or(next),
    }
}
