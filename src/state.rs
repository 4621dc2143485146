//! Validation cursor threaded through nested validation.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// One step of a value path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(i) => write!(f, "{}", i),
        }
    }
}

/// Position of the value under validation.
///
/// Immutable: descending into a child produces a new state.
#[derive(Debug, Clone, Default)]
pub struct State {
    ancestors: Vec<Value>,
    path: Vec<Segment>,
    depth: usize,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// State of a child of the current value.
    ///
    /// `container` becomes the nearest ancestor and `segment` is appended to
    /// the path.
    pub fn dive(&self, container: Value, segment: Segment) -> State {
        let mut ancestors = Vec::with_capacity(self.ancestors.len() + 1);
        ancestors.push(container);
        ancestors.extend(self.ancestors.iter().cloned());

        let mut path = self.path.clone();
        path.push(segment);

        State {
            ancestors,
            path,
            depth: self.depth + 1,
        }
    }

    /// Enclosing values, nearest first.
    pub fn ancestors(&self) -> &[Value] {
        &self.ancestors
    }

    pub fn parent(&self) -> Option<&Value> {
        self.ancestors.first()
    }

    pub fn path(&self) -> &[Segment] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Path joined with dots, `None` at the root.
    pub fn dotted_path(&self) -> Option<String> {
        if self.path.is_empty() {
            return None;
        }
        Some(
            self.path
                .iter()
                .map(Segment::to_string)
                .collect::<Vec<_>>()
                .join("."),
        )
    }
}
