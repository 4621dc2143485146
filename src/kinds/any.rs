//! The root type every schema derives from.

use once_cell::sync::Lazy;

use crate::definition::{TermDef, TypeDef, TypeSpec};
use crate::schema::Schema;
use crate::types::{Presence, ANY};

static ROOT: Lazy<Schema> = Lazy::new(|| {
    let spec = TypeSpec::inherit()
        .flag("presence", Presence::Optional.as_str())
        .flag("only", false)
        .flag("strip", false)
        .term("whens", TermDef::new())
        .message("any.required", "{#label} is required")
        .message("any.forbidden", "{#label} is not allowed")
        .message("any.invalid", "{#label} contains an invalid value")
        .message("any.only", "{#label} must be {grammar}{valids}")
        .message(
            "any.default",
            "{#label} threw an error when running default method: {error}",
        )
        .message("any.ref", "{#label} {arg} references {ref} which {reason}");
    Schema::from_def(TypeDef::new(ANY).derive(spec))
});

/// Schema accepting any value.
pub fn any() -> Schema {
    ROOT.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn root_is_shared() {
        assert!(any().same(&any()));
        assert_eq!(any().kind(), "any");
        assert_eq!(any().describe(), json!({ "type": "any" }));
    }

    #[test]
    fn accepts_everything() {
        for value in [json!(null), json!(1), json!("x"), json!([1]), json!({ "a": 1 })] {
            assert_eq!(any().validate(&value).unwrap(), Some(value));
        }
    }
}
