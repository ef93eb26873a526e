//! Ownership markers and canonical hashing for kitsync-managed JSON entries.

use serde_json::{Map, Value};

/// Field added to every handler object kitsync inserts into the hook registry.
/// Its value is the name of the hook that produced the handler.
pub const OWNER_MARKER_FIELD: &str = "_kitsync";

/// Hash a JSON value independent of object key order.
pub fn hash_json(value: &Value) -> String {
    let normalized = normalize_json(value);
    let bytes = serde_json::to_vec(&normalized).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}

/// Hash a JSON object independent of key order.
pub fn hash_json_map(map: &Map<String, Value>) -> String {
    hash_json(&Value::Object(map.clone()))
}

/// Owner recorded on a handler object, if any.
pub fn owner_of(handler: &Value) -> Option<&str> {
    handler.get(OWNER_MARKER_FIELD).and_then(Value::as_str)
}

pub fn is_owned_by(handler: &Value, owner: &str) -> bool {
    owner_of(handler) == Some(owner)
}

/// Copy of `handler` tagged with `owner`.
pub fn tag_handler(handler: &Map<String, Value>, owner: &str) -> Value {
    let mut tagged = handler.clone();
    tagged.insert(
        OWNER_MARKER_FIELD.to_string(),
        Value::String(owner.to_string()),
    );
    Value::Object(tagged)
}

fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<_> = map.keys().collect();
            keys.sort();
            let mut normalized = Map::new();
            for key in keys {
                if let Some(child) = map.get(key) {
                    normalized.insert(key.clone(), normalize_json(child));
                }
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_json).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hash_ignores_key_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": 2, "x": 3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": 3, "y": 2}, "b": 1}"#).unwrap();
        assert_eq!(hash_json(&a), hash_json(&b));
    }

    #[test]
    fn hash_respects_array_order() {
        assert_ne!(hash_json(&json!([1, 2])), hash_json(&json!([2, 1])));
    }

    #[test]
    fn tag_handler_sets_marker() {
        let handler = json!({"matcher": "Bash"});
        let tagged = tag_handler(handler.as_object().unwrap(), "lint");
        assert!(is_owned_by(&tagged, "lint"));
        assert!(!is_owned_by(&tagged, "format"));
        assert_eq!(owner_of(&json!({"matcher": "Bash"})), None);
    }
}
