//! Helpers for two-stage JSON decoding.
//!
//! Untrusted JSON is first parsed into `serde_json::Value`, then pulled
//! apart with these accessors so that every missing field and type mismatch
//! gets its own [`SchemaError`] naming the offending field. Downstream code
//! only ever sees fully validated, strongly typed records.

use serde_json::{Map, Value};

use crate::error::SchemaError;

/// Require the top-level value to be a JSON object.
pub fn as_object(value: &Value) -> Result<&Map<String, Value>, SchemaError> {
    value.as_object().ok_or(SchemaError::NotAnObject)
}

/// Require a string field.
pub fn get_str<'a>(obj: &'a Map<String, Value>, field: &str) -> Result<&'a str, SchemaError> {
    match obj.get(field) {
        None => Err(SchemaError::MissingField(field.to_string())),
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(SchemaError::WrongType { field: field.to_string(), expected: "string" }),
    }
}

/// Require an unsigned integer field.
pub fn get_u64(obj: &Map<String, Value>, field: &str) -> Result<u64, SchemaError> {
    match obj.get(field) {
        None => Err(SchemaError::MissingField(field.to_string())),
        Some(v) => v.as_u64().ok_or(SchemaError::WrongType {
            field: field.to_string(),
            expected: "unsigned integer",
        }),
    }
}

/// Require an array field.
pub fn get_array<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
) -> Result<&'a Vec<Value>, SchemaError> {
    match obj.get(field) {
        None => Err(SchemaError::MissingField(field.to_string())),
        Some(Value::Array(a)) => Ok(a),
        Some(_) => Err(SchemaError::WrongType { field: field.to_string(), expected: "array" }),
    }
}

/// Optional string field: absent and `null` both mean `None`.
pub fn opt_str<'a>(
    obj: &'a Map<String, Value>,
    field: &str,
) -> Result<Option<&'a str>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(SchemaError::WrongType { field: field.to_string(), expected: "string" }),
    }
}

/// Optional unsigned integer field: absent and `null` both mean `None`.
pub fn opt_u64(obj: &Map<String, Value>, field: &str) -> Result<Option<u64>, SchemaError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or(SchemaError::WrongType {
                field: field.to_string(),
                expected: "unsigned integer",
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().unwrap().clone()
    }

    #[test]
    fn top_level_must_be_object() {
        assert_eq!(as_object(&json!([1, 2])), Err(SchemaError::NotAnObject));
        assert!(as_object(&json!({"a": 1})).is_ok());
    }

    #[test]
    fn missing_field_named() {
        let o = obj(json!({}));
        assert_eq!(
            get_str(&o, "txid"),
            Err(SchemaError::MissingField("txid".to_string()))
        );
    }

    #[test]
    fn wrong_type_named() {
        let o = obj(json!({"vout": "3"}));
        assert_eq!(
            get_u64(&o, "vout"),
            Err(SchemaError::WrongType { field: "vout".to_string(), expected: "unsigned integer" })
        );
    }

    #[test]
    fn negative_is_not_unsigned() {
        let o = obj(json!({"vout": -1}));
        assert!(get_u64(&o, "vout").is_err());
    }

    #[test]
    fn float_is_not_unsigned() {
        let o = obj(json!({"satoshis": 1.5}));
        assert!(get_u64(&o, "satoshis").is_err());
    }

    #[test]
    fn u64_range_accepted() {
        let o = obj(json!({"satoshis": u64::MAX}));
        assert_eq!(get_u64(&o, "satoshis").unwrap(), u64::MAX);
    }

    #[test]
    fn optionals_tolerate_null_and_absence() {
        let o = obj(json!({"blockHash": null}));
        assert_eq!(opt_str(&o, "blockHash").unwrap(), None);
        assert_eq!(opt_str(&o, "absent").unwrap(), None);
        assert_eq!(opt_u64(&o, "confirmations").unwrap(), None);
    }

    #[test]
    fn optionals_still_type_check() {
        let o = obj(json!({"confirmations": "six"}));
        assert!(opt_u64(&o, "confirmations").is_err());
    }

    #[test]
    fn array_extraction() {
        let o = obj(json!({"proof": [1, 2, 3], "notproof": 5}));
        assert_eq!(get_array(&o, "proof").unwrap().len(), 3);
        assert!(get_array(&o, "notproof").is_err());
    }
}
