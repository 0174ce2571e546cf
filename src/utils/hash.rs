//! Canonical hashing utilities
//!
//! Loop detection requires that equal argument sets hash equally regardless
//! of map iteration order, so values are re-encoded with sorted keys before
//! hashing.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute SHA-256 of a string, full hex digest
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic serialization of a JSON value: object keys sorted
/// recursively, arrays kept in order.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let entries: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).unwrap_or_default(),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", entries.join(","))
        }
        Value::Array(arr) => {
            let entries: Vec<String> = arr.iter().map(canonical_json).collect();
            format!("[{}]", entries.join(","))
        }
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

/// Stable content hash over (tool, arguments)
pub fn call_hash(tool: &str, args: &Value) -> String {
    compute_hash(&format!("{}|{}", tool, canonical_json(args)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_hash_consistency() {
        assert_eq!(compute_hash("hello world"), compute_hash("hello world"));
        assert_ne!(compute_hash("hello"), compute_hash("world"));
    }

    #[test]
    fn test_canonical_json_sorts_keys() {
        let a: Value = serde_json::from_str(r#"{"b":1,"a":{"d":2,"c":3}}"#).unwrap();
        assert_eq!(canonical_json(&a), r#"{"a":{"c":3,"d":2},"b":1}"#);
    }

    #[test]
    fn test_call_hash_order_independent() {
        let a = json!({"resource": "topics", "parameters": {"x": 1, "y": 2}});
        let b: Value =
            serde_json::from_str(r#"{"parameters":{"y":2,"x":1},"resource":"topics"}"#).unwrap();
        assert_eq!(call_hash("list", &a), call_hash("list", &b));
    }

    #[test]
    fn test_call_hash_distinguishes_tools() {
        let args = json!({"resource": "topics"});
        assert_ne!(call_hash("list", &args), call_hash("get", &args));
    }
}
