//! Booleans.

use once_cell::sync::Lazy;
use serde_json::Value;

use crate::definition::{TypeSpec, Verdict};
use crate::messages::Details;
use crate::schema::Schema;

use super::any::any;

static BOOLEAN: Lazy<Schema> = Lazy::new(|| {
    any().derive(
        TypeSpec::new("boolean")
            .message("boolean.base", "{#label} must be a boolean")
            .coerce(|value, _| {
                let coerced = match value.as_str().map(str::to_ascii_lowercase).as_deref() {
                    Some("true") => Verdict::Value(Some(Value::Bool(true))),
                    Some("false") => Verdict::Value(Some(Value::Bool(false))),
                    _ => Verdict::Keep,
                };
                Ok(coerced)
            })
            .validate(|value, helpers| {
                if value.is_boolean() {
                    Ok(Verdict::Keep)
                } else {
                    helpers.fail("boolean.base", Details::new())
                }
            }),
    )
});

pub fn boolean() -> Schema {
    BOOLEAN.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValidateOptions;
    use serde_json::json;

    #[test]
    fn strict_and_loose() {
        assert!(boolean().validate(&json!(false)).is_ok());
        assert_eq!(
            boolean().validate(&json!("true")).unwrap_err().codes(),
            vec!["boolean.base"]
        );
        let loose = ValidateOptions::default().strict(false);
        assert_eq!(
            boolean().validate_with(Some(&json!("TRUE")), &loose).unwrap(),
            Some(json!(true))
        );
    }
}
