//! References to sibling, ancestor and context values.
//!
//! A reference is written as a path over a separator (default `.`):
//!
//! | Key | Target |
//! |-----|--------|
//! | `a.b` | property `a.b` of the enclosing container (ancestor 1) |
//! | `.a` | property `a` of the value itself (ancestor 0) |
//! | `..a` | property `a` of the container's container (ancestor 1 + 1) |
//! | `$a.b` | property `a.b` of the validation context |
//!
//! Every extra leading separator beyond the first moves one ancestor up.

use serde_json::{json, Value};

use crate::error::SchemaError;

pub const DEFAULT_SEPARATOR: char = '.';
pub const CONTEXT_PREFIX: char = '$';

/// What a reference is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// The validation context supplied with the options.
    Context,
    /// An entry of the ancestor stack; 0 is the value itself.
    Ancestor(usize),
}

/// A lazily resolved address of another value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ref {
    key: String,
    target: Target,
    path: Vec<String>,
}

impl Ref {
    /// Parse a reference using the default separator.
    pub fn new(key: impl AsRef<str>) -> Self {
        Self::with_separator(key, DEFAULT_SEPARATOR)
    }

    /// Parse a reference with a custom path separator.
    pub fn with_separator(key: impl AsRef<str>, separator: char) -> Self {
        let key = key.as_ref();
        if let Some(rest) = key.strip_prefix(CONTEXT_PREFIX) {
            return Self {
                key: key.to_string(),
                target: Target::Context,
                path: split(rest, separator),
            };
        }

        let run = key.chars().take_while(|c| *c == separator).count();
        let rest = &key[run * separator.len_utf8()..];
        let ancestor = match run {
            0 => 1,
            1 => 0,
            n => n - 1,
        };

        Self {
            key: key.to_string(),
            target: Target::Ancestor(ancestor),
            path: split(rest, separator),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn target(&self) -> Target {
        self.target
    }

    /// Ancestor offset, `None` for context references.
    pub fn ancestor(&self) -> Option<usize> {
        match self.target {
            Target::Ancestor(n) => Some(n),
            Target::Context => None,
        }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// First path segment, or `""` when the reference addresses its target whole.
    pub fn root(&self) -> &str {
        self.path.first().map(String::as_str).unwrap_or("")
    }

    /// Rendering used inside error messages.
    pub fn display(&self) -> String {
        format!("ref:{}", self.key)
    }

    /// Introspection descriptor.
    pub fn describe(&self) -> Value {
        match self.target {
            Target::Context => json!({
                "ref": "context",
                "key": self.key,
                "path": self.path,
            }),
            Target::Ancestor(n) => json!({
                "ref": "value",
                "key": self.key,
                "path": self.path,
                "ancestor": n,
            }),
        }
    }

    /// Resolve against the value being validated, its ancestors (nearest
    /// first) and the validation context.
    ///
    /// Missing properties resolve to `None`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::RefOutOfRange` when the reference climbs past the
    /// available ancestors.
    pub fn resolve(
        &self,
        value: Option<&Value>,
        ancestors: &[Value],
        context: &Value,
    ) -> Result<Option<Value>, SchemaError> {
        let target = match self.target {
            Target::Context => Some(context),
            Target::Ancestor(0) => value,
            Target::Ancestor(n) => {
                if n > ancestors.len() {
                    return Err(SchemaError::RefOutOfRange {
                        reference: self.display(),
                        ancestor: n,
                        available: ancestors.len(),
                    });
                }
                Some(&ancestors[n - 1])
            }
        };

        Ok(target.and_then(|t| lookup(t, &self.path)).cloned())
    }
}

impl From<&str> for Ref {
    fn from(key: &str) -> Self {
        Ref::new(key)
    }
}

impl From<String> for Ref {
    fn from(key: String) -> Self {
        Ref::new(key)
    }
}

fn split(rest: &str, separator: char) -> Vec<String> {
    if rest.is_empty() {
        return Vec::new();
    }
    rest.split(separator).map(String::from).collect()
}

pub(crate) fn lookup<'a>(value: &'a Value, path: &[String]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// A rule argument, value-set member or default: a literal or a reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Value(Value),
    Ref(Ref),
}

impl Arg {
    pub fn as_reference(&self) -> Option<&Ref> {
        match self {
            Arg::Ref(r) => Some(r),
            Arg::Value(_) => None,
        }
    }

    pub fn describe(&self) -> Value {
        match self {
            Arg::Value(v) => v.clone(),
            Arg::Ref(r) => r.describe(),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Arg::Value(v) => crate::types::display_value(v),
            Arg::Ref(r) => r.display(),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<Ref> for Arg {
    fn from(reference: Ref) -> Self {
        Arg::Ref(reference)
    }
}

impl From<&Ref> for Arg {
    fn from(reference: &Ref) -> Self {
        Arg::Ref(reference.clone())
    }
}

macro_rules! arg_from_literal {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Arg::Value(Value::from(value))
                }
            }
        )*
    };
}

arg_from_literal!(&str, String, bool, i32, i64, u32, u64, usize, f64);

/// References collected from a schema, as `(ancestor offset, root key)`.
///
/// Context references never take part: they cannot create ordering
/// dependencies between values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefSet {
    refs: Vec<(usize, String)>,
}

impl RefSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reference found `depth` levels below the owning schema.
    ///
    /// References that do not climb out of that depth are dropped.
    pub fn register(&mut self, reference: &Ref, depth: usize) {
        if let Target::Ancestor(ancestor) = reference.target {
            if ancestor >= depth {
                self.push(ancestor - depth, reference.root());
            }
        }
    }

    /// Register every reference of a nested schema sitting `depth` levels below.
    pub fn register_set(&mut self, other: &RefSet, depth: usize) {
        for (ancestor, root) in &other.refs {
            if *ancestor >= depth {
                self.push(ancestor - depth, root);
            }
        }
    }

    /// Root keys of references to siblings (ancestor offset 1).
    pub fn siblings(&self) -> impl Iterator<Item = &str> {
        self.refs
            .iter()
            .filter(|(ancestor, _)| *ancestor == 1)
            .map(|(_, root)| root.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.refs.iter().map(|(a, r)| (*a, r.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    fn push(&mut self, ancestor: usize, root: &str) {
        if !self.refs.iter().any(|(a, r)| *a == ancestor && r == root) {
            self.refs.push((ancestor, root.to_string()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sibling() {
        let r = Ref::new("a.b");
        assert_eq!(r.target(), Target::Ancestor(1));
        assert_eq!(r.path(), ["a", "b"]);
        assert_eq!(r.root(), "a");
    }

    #[test]
    fn parse_self_and_ancestors() {
        assert_eq!(Ref::new(".a").target(), Target::Ancestor(0));
        assert_eq!(Ref::new("..a").target(), Target::Ancestor(1));
        assert_eq!(Ref::new("...a").target(), Target::Ancestor(2));
        assert_eq!(Ref::new("...a").path(), ["a"]);
    }

    #[test]
    fn parse_context() {
        let r = Ref::new("$user.role");
        assert_eq!(r.target(), Target::Context);
        assert_eq!(r.ancestor(), None);
        assert_eq!(r.path(), ["user", "role"]);
    }

    #[test]
    fn parse_custom_separator() {
        let r = Ref::with_separator("//a/b", '/');
        assert_eq!(r.target(), Target::Ancestor(1));
        assert_eq!(r.path(), ["a", "b"]);
    }

    #[test]
    fn resolve_sibling_and_context() {
        let parent = json!({ "a": { "b": 7 } });
        let context = json!({ "role": "admin" });

        let sibling = Ref::new("a.b").resolve(None, &[parent], &context).unwrap();
        assert_eq!(sibling, Some(json!(7)));

        let role = Ref::new("$role").resolve(None, &[], &context).unwrap();
        assert_eq!(role, Some(json!("admin")));
    }

    #[test]
    fn resolve_self() {
        let value = json!({ "x": [1, 2, 3] });
        let r = Ref::new(".x.1");
        assert_eq!(r.resolve(Some(&value), &[], &json!({})).unwrap(), Some(json!(2)));
    }

    #[test]
    fn resolve_missing_segment_is_none() {
        let parent = json!({ "a": 1 });
        let r = Ref::new("a.b.c");
        assert_eq!(r.resolve(None, &[parent], &json!({})).unwrap(), None);
    }

    #[test]
    fn resolve_out_of_range_errors() {
        let r = Ref::new("...a");
        let result = r.resolve(None, &[json!({})], &json!({}));
        assert!(matches!(
            result,
            Err(SchemaError::RefOutOfRange {
                ancestor: 2,
                available: 1,
                ..
            })
        ));
    }

    #[test]
    fn ref_set_shifts_and_dedupes() {
        let mut inner = RefSet::new();
        inner.register(&Ref::new("a"), 0);
        inner.register(&Ref::new("a.b"), 0);
        inner.register(&Ref::new("...z"), 0);
        inner.register(&Ref::new("$ctx"), 0);
        assert_eq!(inner.len(), 2);

        let mut outer = RefSet::new();
        outer.register_set(&inner, 1);
        let entries: Vec<_> = outer.iter().collect();
        assert_eq!(entries, vec![(0, "a"), (1, "z")]);
        assert_eq!(outer.siblings().collect::<Vec<_>>(), vec!["z"]);
    }

    #[test]
    fn describe_ref() {
        let d = Ref::new("a").describe();
        assert_eq!(d["ref"], "value");
        assert_eq!(d["ancestor"], 1);
        assert_eq!(Ref::new("$a").describe()["ref"], "context");
    }
}
