//! Shape Schema
//!
//! Composable runtime schemas for validating, coercing and transforming JSON
//! values.
//!
//! Schemas are immutable values built with chained builder calls. Every call
//! returns a new schema and leaves the receiver untouched.
//!
//! # Example
//!
//! ```
//! use shape_schema::{number, object, reference, string};
//! use serde_json::json;
//!
//! let schema = object()
//!     .keys([
//!         ("name", string().min(3).unwrap().required()),
//!         ("min", number()),
//!         ("max", number().min(reference("min")).unwrap()),
//!     ])
//!     .unwrap();
//!
//! assert!(schema.validate(&json!({ "name": "bolt", "min": 1, "max": 4 })).is_ok());
//!
//! let err = schema.validate(&json!({ "name": "bolt", "min": 5, "max": 4 })).unwrap_err();
//! assert_eq!(err.codes(), vec!["number.min"]);
//! assert_eq!(err.to_string(), "validation failed with 1 error(s)");
//! ```
//!
//! # References
//!
//! | Key | Resolves to |
//! |-----|-------------|
//! | `"a.b"` | property `a.b` of the enclosing value |
//! | `".a"` | property `a` of the value itself |
//! | `"..a"` | property `a` two levels up |
//! | `"$a"` | property `a` of the validation context |
//!
//! # Custom types
//!
//! New types derive from existing ones with [`Schema::extend`]:
//!
//! ```
//! use shape_schema::{string, RuleDef, TypeSpec, Verdict, Details};
//! use serde_json::json;
//!
//! let slug = string()
//!     .extend(
//!         TypeSpec::new("slug")
//!             .message("slug.lowercase", "{#label} must be lowercase")
//!             .rule(RuleDef::new("lowercase").validate(|value, helpers, _| {
//!                 match value.as_str() {
//!                     Some(s) if s.chars().any(char::is_uppercase) => {
//!                         helpers.fail("slug.lowercase", Details::new())
//!                     }
//!                     _ => Ok(Verdict::Keep),
//!                 }
//!             })),
//!     )
//!     .unwrap()
//!     .rule("lowercase", &[])
//!     .unwrap();
//!
//! assert!(slug.validate(&json!("rust-lang")).is_ok());
//! assert_eq!(slug.validate(&json!("Rust")).unwrap_err().codes(), vec!["slug.lowercase"]);
//! ```

mod definition;
mod error;
mod kinds;
mod messages;
mod reference;
mod schema;
mod state;
mod types;
mod validator;
mod values;

pub use definition::{
    ArgDef, RuleArgs, RuleCall, RuleDef, TermDef, TypeDef, TypeSpec, Verdict,
};
pub use error::{SchemaError, ValidateError, ValidationError};
pub use kinds::alternatives::{alternatives, Match};
pub use kinds::any::any;
pub use kinds::array::array;
pub use kinds::boolean::boolean;
pub use kinds::number::number;
pub use kinds::object::{object, Dependency, Relation};
pub use kinds::string::string;
pub use messages::{Detail, Details};
pub use reference::{Arg, Ref, RefSet, Target};
pub use schema::{Condition, ErrorOverride, ErrorReport, Flag, Schema, Term};
pub use state::{Segment, State};
pub use types::{json_type_name, Presence, ValidateOptions};
pub use validator::{Helpers, Report};
pub use values::Values;

/// Reference to another value, resolved at validation time.
pub fn reference(key: &str) -> Ref {
    Ref::new(key)
}
