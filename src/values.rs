//! Allow and deny lists.

use serde_json::Value;

use crate::error::SchemaError;
use crate::reference::{Arg, Ref};
use crate::types::{deep_equal, display_value};

/// A set of literal values and references.
///
/// References are resolved each time membership is tested, so a list can
/// allow "whatever the sibling `password` holds".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Values {
    values: Vec<Value>,
    refs: Vec<Ref>,
}

impl Values {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len() + self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.refs.is_empty()
    }

    pub fn refs(&self) -> &[Ref] {
        &self.refs
    }

    pub fn literals(&self) -> &[Value] {
        &self.values
    }

    pub fn add(&mut self, item: &Arg) {
        match item {
            Arg::Value(v) => {
                if !self.values.iter().any(|x| deep_equal(x, v)) {
                    self.values.push(v.clone());
                }
            }
            Arg::Ref(r) => {
                if !self.refs.contains(r) {
                    self.refs.push(r.clone());
                }
            }
        }
    }

    pub fn remove(&mut self, item: &Arg) {
        match item {
            Arg::Value(v) => self.values.retain(|x| !deep_equal(x, v)),
            Arg::Ref(r) => self.refs.retain(|x| x != r),
        }
    }

    /// Whether `value` equals a literal or the current target of a reference.
    ///
    /// # Errors
    ///
    /// Propagates reference resolution errors.
    pub fn has(
        &self,
        value: &Value,
        ancestors: &[Value],
        context: &Value,
    ) -> Result<bool, SchemaError> {
        if self.values.iter().any(|x| deep_equal(x, value)) {
            return Ok(true);
        }
        for reference in &self.refs {
            if let Some(resolved) = reference.resolve(Some(value), ancestors, context)? {
                if deep_equal(&resolved, value) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Add every item of `add`, then drop every item of `remove`.
    pub fn merge(&mut self, add: &Values, remove: &Values) {
        for item in add.items() {
            self.add(&item);
        }
        for item in remove.items() {
            self.remove(&item);
        }
    }

    pub fn items(&self) -> impl Iterator<Item = Arg> + '_ {
        self.values
            .iter()
            .cloned()
            .map(Arg::Value)
            .chain(self.refs.iter().cloned().map(Arg::Ref))
    }

    /// Comma-separated rendering for error messages.
    pub fn display(&self) -> String {
        self.values
            .iter()
            .map(display_value)
            .chain(self.refs.iter().map(Ref::display))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn describe(&self) -> Vec<Value> {
        self.items().map(|item| item.describe()).collect()
    }
}
