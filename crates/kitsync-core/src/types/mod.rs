//! Shared component types used by detection, status, resolution and sync.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// File that must exist inside a directory for it to be recognized as a skill.
pub const SKILL_MARKER_FILE: &str = "SKILL.md";

/// Optional dependency manifest inside a skill directory.
///
/// Excluded from skill content hashing.
pub const SKILL_MANIFEST_FILE: &str = "kit.json";

/// Component categories.
///
/// The serialized names double as the category keys of the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "skills")]
    Skill,
    #[serde(rename = "agents")]
    Agent,
    #[serde(rename = "hooks")]
    Hook,
    #[serde(rename = "mcpServers")]
    Endpoint,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Skill,
        Category::Agent,
        Category::Hook,
        Category::Endpoint,
    ];

    /// Ledger key for this category.
    pub fn key(self) -> &'static str {
        match self {
            Category::Skill => "skills",
            Category::Agent => "agents",
            Category::Hook => "hooks",
            Category::Endpoint => "mcpServers",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|category| category.key() == key)
    }

    pub fn kind(self) -> ComponentKind {
        match self {
            Category::Skill | Category::Agent => ComponentKind::ContentTree,
            Category::Hook | Category::Endpoint => ComponentKind::JsonEntry,
        }
    }

    /// Singular, human-facing label.
    pub fn label(self) -> &'static str {
        match self {
            Category::Skill => "skill",
            Category::Agent => "agent",
            Category::Hook => "hook",
            Category::Endpoint => "mcp",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skill" | "skills" => Ok(Category::Skill),
            "agent" | "agents" => Ok(Category::Agent),
            "hook" | "hooks" => Ok(Category::Hook),
            "mcp" | "mcpservers" | "endpoint" | "endpoints" => Ok(Category::Endpoint),
            other => anyhow::bail!(
                "Unknown component category '{}'. Use skill, agent, hook, or mcp.",
                other
            ),
        }
    }
}

/// How a component materializes in a target project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentKind {
    /// A file or directory copied into the project.
    ContentTree,
    /// A keyed entry inside a shared JSON document.
    JsonEntry,
}

/// Where a component lands inside the target project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Standalone file or directory.
    Path(PathBuf),
    /// Entry inside a shared JSON document, under the given top-level field.
    Document { path: PathBuf, field: String },
}

/// Dependency declarations of a skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillManifest {
    #[serde(default)]
    pub description: Option<String>,

    /// Single agent persona this skill relies on.
    #[serde(default)]
    pub agent: Option<String>,

    #[serde(default)]
    pub mcp_servers: Vec<String>,

    /// Tool names; informational only.
    #[serde(default)]
    pub tools: Vec<String>,

    #[serde(default)]
    pub skills: Vec<String>,
}

/// Declared configuration of a json-entry component.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonEntry {
    /// For hooks: the `{event: handlerOrHandlers}` map.
    /// For endpoints: the endpoint config object.
    pub config: Map<String, Value>,

    /// Environment variables that must be set for the entry to work.
    pub required_env: Vec<String>,

    pub description: Option<String>,
}

/// A component discovered in the source tree.
///
/// Recomputed on every run; identity is `(category, name)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: String,
    pub category: Category,
    pub source_path: PathBuf,
    pub target: Target,
    pub manifest: Option<SkillManifest>,
    pub entry: Option<JsonEntry>,
}

impl Component {
    pub fn kind(&self) -> ComponentKind {
        self.category.kind()
    }

    /// Target path for content-tree components.
    pub fn target_path(&self) -> Option<&PathBuf> {
        match &self.target {
            Target::Path(path) => Some(path),
            Target::Document { .. } => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.manifest
            .as_ref()
            .and_then(|m| m.description.as_deref())
            .or_else(|| self.entry.as_ref().and_then(|e| e.description.as_deref()))
    }

    pub fn required_env(&self) -> &[String] {
        self.entry
            .as_ref()
            .map(|e| e.required_env.as_slice())
            .unwrap_or(&[])
    }
}

/// Reference to a component as `category:name`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentRef {
    pub category: Category,
    pub name: String,
}

impl ComponentRef {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }
}

impl fmt::Display for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

impl FromStr for ComponentRef {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (category, name) = s
            .split_once(':')
            .ok_or_else(|| anyhow::anyhow!("Expected 'category:name', got '{}'", s))?;
        if name.is_empty() {
            anyhow::bail!("Component name cannot be empty: '{}'", s);
        }
        Ok(Self::new(category.parse()?, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_keys_round_trip() {
        for category in Category::ALL {
            assert_eq!(Category::from_key(category.key()), Some(category));
        }
        assert_eq!(Category::from_key("plugins"), None);
    }

    #[test]
    fn component_ref_parses_aliases() {
        let parsed: ComponentRef = "mcp:github".parse().unwrap();
        assert_eq!(parsed, ComponentRef::new(Category::Endpoint, "github"));

        let parsed: ComponentRef = "Skills:pdf".parse().unwrap();
        assert_eq!(parsed.category, Category::Skill);
        assert_eq!(parsed.to_string(), "skill:pdf");
    }

    #[test]
    fn component_ref_rejects_missing_name() {
        assert!("skill:".parse::<ComponentRef>().is_err());
        assert!("pdf".parse::<ComponentRef>().is_err());
        assert!("widget:pdf".parse::<ComponentRef>().is_err());
    }

    #[test]
    fn manifest_accepts_camel_case_fields() {
        let manifest: SkillManifest = serde_json::from_str(
            r#"{"agent": "reviewer", "mcpServers": ["github"], "skills": ["git"]}"#,
        )
        .unwrap();
        assert_eq!(manifest.agent.as_deref(), Some("reviewer"));
        assert_eq!(manifest.mcp_servers, vec!["github".to_string()]);
        assert_eq!(manifest.skills, vec!["git".to_string()]);
        assert!(SkillManifest::default().agent.is_none());
    }
}
