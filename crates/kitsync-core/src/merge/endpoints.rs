//! Endpoint (MCP server) registry merge.
//!
//! A plain name-keyed map under [`MCP_SERVERS_FIELD`]. Add/update replaces the
//! value at a key, remove deletes it; last writer wins.

use std::path::Path;

use serde_json::{Map, Value};

use super::document::JsonDocument;
use super::ownership::hash_json;

/// Top-level field of the endpoint document holding the endpoint map.
pub const MCP_SERVERS_FIELD: &str = "mcpServers";

/// The endpoint document viewed as an endpoint registry.
#[derive(Debug, Clone)]
pub struct EndpointRegistry {
    doc: JsonDocument,
}

impl EndpointRegistry {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            doc: JsonDocument::load(path)?,
        })
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.doc.field(MCP_SERVERS_FIELD).and_then(|m| m.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Canonical hash of the stored config for `name`.
    pub fn hash_of(&self, name: &str) -> Option<String> {
        self.get(name).map(hash_json)
    }

    /// Insert or replace an endpoint config.
    pub fn upsert(&mut self, name: &str, config: &Map<String, Value>) {
        self.doc
            .field_mut(MCP_SERVERS_FIELD)
            .insert(name.to_string(), Value::Object(config.clone()));
    }

    /// Remove an endpoint. Returns `true` if it was present.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.doc.root_mut().get_mut(MCP_SERVERS_FIELD) {
            Some(Value::Object(map)) => map.remove(name).is_some(),
            _ => false,
        }
    }

    /// Write the document if it changed.
    pub fn save(&mut self) -> anyhow::Result<bool> {
        self.doc.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn upsert_preserves_other_entries_and_fields() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".mcp.json");
        std::fs::write(
            &path,
            r#"{"mcpServers": {"user": {"command": "echo"}}, "other": true}"#,
        )
        .unwrap();

        let mut registry = EndpointRegistry::load(&path).unwrap();
        let config = json!({"command": "npx", "args": ["gh-mcp"]});
        registry.upsert("github", config.as_object().unwrap());
        assert!(registry.save().unwrap());

        let reread = EndpointRegistry::load(&path).unwrap();
        assert_eq!(reread.get("user"), Some(&json!({"command": "echo"})));
        assert_eq!(reread.get("github"), Some(&config));
        assert_eq!(reread.hash_of("github"), Some(hash_json(&config)));
    }

    #[test]
    fn remove_deletes_key_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".mcp.json");
        std::fs::write(
            &path,
            r#"{"mcpServers": {"a": {"command": "a"}, "b": {"command": "b"}}}"#,
        )
        .unwrap();

        let mut registry = EndpointRegistry::load(&path).unwrap();
        assert!(registry.remove("a"));
        assert!(!registry.remove("a"));
        assert!(registry.contains("b"));
    }

    #[test]
    fn remove_on_missing_document_is_noop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".mcp.json");
        let mut registry = EndpointRegistry::load(&path).unwrap();
        assert!(!registry.remove("a"));
        assert!(!registry.save().unwrap());
        assert!(!path.exists());
    }
}
