//! Shared JSON documents in the target project.
//!
//! Both registries are read defaulted: a missing, empty or corrupt document
//! is treated as an empty object.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use crate::fs::write_atomic;

/// A JSON object document loaded from disk.
///
/// Remembers what was read so [`JsonDocument::save`] can skip unchanged writes.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
    original: Map<String, Value>,
    root: Map<String, Value>,
}

impl JsonDocument {
    /// Load a document, defaulting to an empty object.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let root = load_json_map(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            original: root.clone(),
            root,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }

    /// Object stored under a top-level field, if it is one.
    pub fn field(&self, field: &str) -> Option<&Map<String, Value>> {
        self.root.get(field).and_then(Value::as_object)
    }

    /// Object stored under a top-level field, created (or replaced, when it
    /// held a non-object) on demand.
    pub fn field_mut(&mut self, field: &str) -> &mut Map<String, Value> {
        let slot = self
            .root
            .entry(field.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            tracing::warn!(path = %self.path.display(), field, "replacing non-object field");
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just set to an object"),
        }
    }

    pub fn is_modified(&self) -> bool {
        self.root != self.original
    }

    /// Write the document if its content changed. Returns `true` on write.
    pub fn save(&mut self) -> anyhow::Result<bool> {
        if !self.is_modified() {
            return Ok(false);
        }
        write_json_map(&self.path, &self.root)?;
        self.original = self.root.clone();
        Ok(true)
    }
}

/// Read a JSON object from disk; anything unreadable as an object is empty.
pub fn load_json_map(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("Failed to read config file: {}", path.display())));
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "expected JSON object at root; treating as empty");
            Ok(Map::new())
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to parse JSON; treating as empty");
            Ok(Map::new())
        }
    }
}

fn write_json_map(path: &Path, map: &Map<String, Value>) -> anyhow::Result<()> {
    let mut bytes = serde_json::to_vec_pretty(map).context("Failed to serialize JSON config")?;
    bytes.push(b'\n');
    write_atomic(path, &bytes)
        .with_context(|| format!("Failed to write config file: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn corrupt_document_reads_as_empty() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, "{\"hooks\": [").unwrap();

        let doc = JsonDocument::load(&path).unwrap();
        assert!(doc.root().is_empty());
    }

    #[test]
    fn save_only_writes_changes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join(".mcp.json");

        let mut doc = JsonDocument::load(&path).unwrap();
        assert!(!doc.save().unwrap());
        assert!(!path.exists());

        doc.field_mut("mcpServers")
            .insert("github".to_string(), json!({"command": "gh"}));
        assert!(doc.save().unwrap());
        assert!(!doc.save().unwrap());

        let reread = load_json_map(&path).unwrap();
        assert_eq!(reread["mcpServers"]["github"]["command"], json!("gh"));

        // The staged temp file is renamed away
        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![".mcp.json".to_string()]);
    }

    #[test]
    fn field_mut_replaces_non_object() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        std::fs::write(&path, r#"{"hooks": "oops", "theme": "dark"}"#).unwrap();

        let mut doc = JsonDocument::load(&path).unwrap();
        assert!(doc.field("hooks").is_none());
        doc.field_mut("hooks");
        assert_eq!(doc.root()["hooks"], json!({}));
        assert_eq!(doc.root()["theme"], json!("dark"));
    }
}
