//! Checks `Schema::describe()` output against a JSON Schema of the
//! description format.

use serde_json::{json, Value};
use shape_schema::{
    alternatives, any, array, boolean, number, object, reference, string, Condition,
    ErrorOverride, Match, Schema,
};

/// JSON Schema for a described schema.
fn description_schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$ref": "#/$defs/description",
        "$defs": {
            "ref": {
                "type": "object",
                "required": ["ref", "key", "path"],
                "properties": {
                    "ref": { "enum": ["value", "context"] },
                    "key": { "type": "string" },
                    "path": { "type": "array", "items": { "type": "string" } },
                    "ancestor": { "type": "integer", "minimum": 0 }
                }
            },
            "rule": {
                "type": "object",
                "required": ["name"],
                "additionalProperties": false,
                "properties": {
                    "name": { "type": "string" },
                    "args": { "type": "object" }
                }
            },
            "when": {
                "type": "object",
                "required": ["ref", "is"],
                "additionalProperties": false,
                "properties": {
                    "ref": { "$ref": "#/$defs/ref" },
                    "is": { "$ref": "#/$defs/description" },
                    "then": { "$ref": "#/$defs/description" },
                    "otherwise": { "$ref": "#/$defs/description" }
                }
            },
            "dependency": {
                "type": "object",
                "required": ["rel", "peers"],
                "additionalProperties": false,
                "properties": {
                    "rel": { "enum": ["and", "nand", "or", "xor", "oxor"] },
                    "peers": { "type": "array", "items": { "type": "string" } }
                }
            },
            "description": {
                "type": "object",
                "required": ["type"],
                "properties": {
                    "type": { "type": "string" },
                    "flags": {
                        "type": "object",
                        "properties": {
                            "presence": { "enum": ["optional", "required", "forbidden"] },
                            "only": { "type": "boolean" },
                            "strip": { "type": "boolean" },
                            "label": { "type": "string" },
                            "unknown": { "type": "boolean" },
                            "sparse": { "type": "boolean" },
                            "match": { "enum": ["any", "one", "all"] }
                        }
                    },
                    "rules": { "type": "array", "items": { "$ref": "#/$defs/rule" } },
                    "allow": { "type": "array" },
                    "invalid": { "type": "array" },
                    "keys": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/description" }
                    },
                    "items": { "type": "array", "items": { "$ref": "#/$defs/description" } },
                    "ordered": { "type": "array", "items": { "$ref": "#/$defs/description" } },
                    "matches": { "type": "array", "items": { "$ref": "#/$defs/description" } },
                    "whens": { "type": "array", "items": { "$ref": "#/$defs/when" } },
                    "dependencies": { "type": "array", "items": { "$ref": "#/$defs/dependency" } }
                },
                "not": {
                    "anyOf": [
                        { "required": ["_requireds"] },
                        { "required": ["_inclusions"] },
                        { "required": ["_exclusions"] }
                    ]
                }
            }
        }
    })
}

fn assert_conforms(schema: &Schema) {
    let validator = jsonschema::validator_for(&description_schema())
        .expect("description schema should compile");
    let described = schema.describe();
    let problems: Vec<String> = validator
        .iter_errors(&described)
        .map(|e| format!("{} at {}", e, e.instance_path))
        .collect();
    assert!(
        problems.is_empty(),
        "description does not conform: {problems:?}\n{described:#}"
    );
}

// === Conformance Tests ===

mod conformance {
    use super::*;

    #[test]
    fn built_in_types() {
        for schema in [any(), string(), number(), boolean(), object(), array(), alternatives()] {
            assert_conforms(&schema);
        }
    }

    #[test]
    fn flags_rules_and_values() {
        assert_conforms(
            &number()
                .min(1)
                .unwrap()
                .max(reference("$ceiling"))
                .unwrap()
                .valid([0])
                .invalid([13])
                .label("count")
                .required(),
        );
        assert_conforms(&string().valid(["a", "b"]).only().strip());
        assert_conforms(&any().error(ErrorOverride::Message("nope".into())));
        assert_conforms(&any().default_deep());
        assert_conforms(&any().default_fn(|_| Ok(json!(1))));
    }

    #[test]
    fn nested_structures() {
        let schema = object()
            .keys([
                ("id", string().required()),
                (
                    "tags",
                    array()
                        .items([string().required(), number()])
                        .unwrap()
                        .items([boolean().forbidden()])
                        .unwrap()
                        .sparse(true),
                ),
                (
                    "point",
                    array().ordered([number(), number()]).unwrap(),
                ),
                (
                    "value",
                    alternatives()
                        .candidates([string(), number()])
                        .unwrap()
                        .match_mode(Match::One)
                        .unwrap(),
                ),
            ])
            .unwrap()
            .and(["id", "value"])
            .unwrap()
            .unknown(true);
        assert_conforms(&schema);
    }

    #[test]
    fn conditions() {
        let schema = any().when(
            "kind",
            Condition::is(string().valid(["a"]))
                .then(number())
                .otherwise(string()),
        );
        assert_conforms(&schema);
        assert_conforms(&any().when("$mode", Condition::is(boolean())));
    }
}

// === Shape Tests ===

mod shape {
    use super::*;

    #[test]
    fn keys_render_as_map_in_sorted_order() {
        let schema = object()
            .keys([
                ("b", number().min(reference("a")).unwrap()),
                ("a", number()),
            ])
            .unwrap();
        let described = schema.describe();
        let keys: Vec<&String> = described["keys"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(
            described["keys"]["b"]["rules"][0],
            json!({
                "name": "min",
                "args": {
                    "limit": { "ref": "value", "key": "a", "path": ["a"], "ancestor": 1 }
                }
            })
        );
    }

    #[test]
    fn empty_keys_still_listed() {
        // An explicit empty key set differs from no key set.
        assert_eq!(object().describe(), json!({ "type": "object" }));
        let closed = object().keys(Vec::<(&str, Schema)>::new()).unwrap().describe();
        assert_eq!(closed["keys"], json!({}));
    }

    #[test]
    fn pools_hidden() {
        let described = array().items([number().required()]).unwrap().describe();
        assert_eq!(described["items"].as_array().map(Vec::len), Some(1));
        assert!(described.get("_requireds").is_none());
    }

    #[test]
    fn context_reference_descriptor() {
        let described = any().valid([reference("$allowed")]).describe();
        assert_eq!(
            described["allow"],
            json!([{ "ref": "context", "key": "$allowed", "path": ["allowed"] }])
        );
    }

    #[test]
    fn special_flags() {
        assert_eq!(
            any().default_fn(|_| Ok(json!(1))).describe()["flags"]["default"],
            json!({ "special": "function" })
        );
        assert_eq!(
            any().default_deep().describe()["flags"]["default"],
            json!({ "special": "deep" })
        );
        assert_eq!(any().default(3).describe()["flags"]["default"], json!(3));
    }
}
