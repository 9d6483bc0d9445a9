//! Canonical JSON encoding for deterministic signing input.
//!
//! Rules:
//! - Object keys sorted by UTF-8 byte order, recursively
//! - Array elements keep their order
//! - No insignificant whitespace
//! - Strings use serde_json's minimal escaping
//! - Integers only (no floats: there is no single textual form for them)
//!
//! **CRITICAL**: This encoding is FROZEN. Changes break every receipt ever
//! issued, because verifiers recompute the digest from the message.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::error::CanonicalizationError;

/// Maximum nesting depth accepted by the canonicalizer.
pub const MAX_DEPTH: usize = 128;

/// Encode a JSON value to canonical bytes.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonicalizationError> {
    let mut buf = Vec::new();
    encode_value(&mut buf, value, 0)?;
    Ok(buf)
}

/// Serialize any value through serde, then canonicalize it.
pub fn canonicalize_serializable<T: Serialize + ?Sized>(
    value: &T,
) -> Result<Vec<u8>, CanonicalizationError> {
    let value =
        serde_json::to_value(value).map_err(|e| CanonicalizationError::Serialize(e.to_string()))?;
    canonicalize(&value)
}

/// Recursively encode a value.
fn encode_value(buf: &mut Vec<u8>, value: &Value, depth: usize) -> Result<(), CanonicalizationError> {
    if depth > MAX_DEPTH {
        return Err(CanonicalizationError::TooDeep(MAX_DEPTH));
    }

    match value {
        Value::Null => buf.extend_from_slice(b"null"),
        Value::Bool(true) => buf.extend_from_slice(b"true"),
        Value::Bool(false) => buf.extend_from_slice(b"false"),
        Value::Number(n) => encode_number(buf, n)?,
        Value::String(s) => encode_string(buf, s)?,
        Value::Array(items) => encode_array(buf, items, depth)?,
        Value::Object(map) => encode_object(buf, map, depth)?,
    }
    Ok(())
}

fn encode_number(buf: &mut Vec<u8>, n: &Number) -> Result<(), CanonicalizationError> {
    if let Some(i) = n.as_i64() {
        buf.extend_from_slice(i.to_string().as_bytes());
    } else if let Some(u) = n.as_u64() {
        buf.extend_from_slice(u.to_string().as_bytes());
    } else {
        return Err(CanonicalizationError::UnsupportedNumber(n.to_string()));
    }
    Ok(())
}

fn encode_string(buf: &mut Vec<u8>, s: &str) -> Result<(), CanonicalizationError> {
    serde_json::to_writer(&mut *buf, s).map_err(|e| CanonicalizationError::Serialize(e.to_string()))
}

fn encode_array(buf: &mut Vec<u8>, items: &[Value], depth: usize) -> Result<(), CanonicalizationError> {
    buf.push(b'[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        encode_value(buf, item, depth + 1)?;
    }
    buf.push(b']');
    Ok(())
}

fn encode_object(
    buf: &mut Vec<u8>,
    map: &Map<String, Value>,
    depth: usize,
) -> Result<(), CanonicalizationError> {
    // Sort explicitly: serde_json's map order depends on crate features.
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    buf.push(b'{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            buf.push(b',');
        }
        encode_string(buf, key)?;
        buf.push(b':');
        encode_value(buf, value, depth + 1)?;
    }
    buf.push(b'}');
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(value: Value) -> String {
        String::from_utf8(canonicalize(&value).unwrap()).unwrap()
    }

    #[test]
    fn test_keys_sorted_recursively() {
        let out = canon(json!({
            "state": "prepared",
            "id": "x",
            "nested": {"b": 1, "a": {"z": true, "m": null}}
        }));
        assert_eq!(
            out,
            r#"{"id":"x","nested":{"a":{"m":null,"z":true},"b":1},"state":"prepared"}"#
        );
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let mut a = Map::new();
        a.insert("id".into(), json!("1"));
        a.insert("state".into(), json!("executed"));

        let mut b = Map::new();
        b.insert("state".into(), json!("executed"));
        b.insert("id".into(), json!("1"));

        assert_eq!(
            canonicalize(&Value::Object(a)).unwrap(),
            canonicalize(&Value::Object(b)).unwrap()
        );
    }

    #[test]
    fn test_array_order_preserved() {
        assert_eq!(canon(json!([3, 1, 2])), "[3,1,2]");
        assert_ne!(
            canonicalize(&json!([1, 2])).unwrap(),
            canonicalize(&json!([2, 1])).unwrap()
        );
    }

    #[test]
    fn test_integers() {
        assert_eq!(canon(json!(0)), "0");
        assert_eq!(canon(json!(-42)), "-42");
        assert_eq!(canon(json!(u64::MAX)), u64::MAX.to_string());
    }

    #[test]
    fn test_floats_rejected() {
        let err = canonicalize(&json!({"amount": 1.5})).unwrap_err();
        assert!(matches!(err, CanonicalizationError::UnsupportedNumber(_)));
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(canon(json!("a\"b\\c\n")), r#""a\"b\\c\n""#);
        assert_eq!(canon(json!("héllo")), "\"héllo\"");
    }

    #[test]
    fn test_keys_sorted_by_bytes_not_length() {
        // Canonical CBOR would put "b" before "aa"; canonical JSON must not.
        assert_eq!(canon(json!({"b": 1, "aa": 2})), r#"{"aa":2,"b":1}"#);
    }

    #[test]
    fn test_depth_limit() {
        let mut value = json!(null);
        for _ in 0..=MAX_DEPTH {
            value = json!([value]);
        }
        assert_eq!(
            canonicalize(&value).unwrap_err(),
            CanonicalizationError::TooDeep(MAX_DEPTH)
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(canon(json!([true, false, null])), "[true,false,null]");
        assert_eq!(canon(json!({})), "{}");
        assert_eq!(canon(json!([])), "[]");
    }
}
