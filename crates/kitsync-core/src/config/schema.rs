//! Configuration schema for kitsync.toml
//!
//! The same structure is used for both layers:
//! - Global: ~/.config/kitsync/kitsync.toml
//! - Project: ./kitsync.toml

use serde::{Deserialize, Serialize};
use std::path::{Component, PathBuf};

/// Root configuration structure for kitsync.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KitConfig {
    /// Root of the shared component source tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Target layout overrides, relative to the project root
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Where components land inside a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Skills directory (default: .claude/skills)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skills: Option<PathBuf>,

    /// Agents directory (default: .claude/agents)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<PathBuf>,

    /// Settings document holding the hook registry (default: .claude/settings.json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<PathBuf>,

    /// Endpoint document (default: .mcp.json)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mcp: Option<PathBuf>,
}

impl KitConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(source) = &self.source
            && source.as_os_str().is_empty()
        {
            anyhow::bail!("'source' cannot be empty");
        }
        self.paths.validate()
    }
}

impl PathsConfig {
    fn entries(&self) -> [(&'static str, Option<&PathBuf>); 4] {
        [
            ("skills", self.skills.as_ref()),
            ("agents", self.agents.as_ref()),
            ("settings", self.settings.as_ref()),
            ("mcp", self.mcp.as_ref()),
        ]
    }

    /// Every configured path must stay inside the project.
    pub fn validate(&self) -> anyhow::Result<()> {
        for (key, path) in self.entries() {
            let Some(path) = path else {
                continue;
            };
            if path.as_os_str().is_empty() {
                anyhow::bail!("paths.{} cannot be empty", key);
            }
            if path.is_absolute() {
                anyhow::bail!(
                    "paths.{} must be relative to the project root: {}",
                    key,
                    path.display()
                );
            }
            if path.components().any(|c| matches!(c, Component::ParentDir)) {
                anyhow::bail!(
                    "paths.{} must not leave the project root: {}",
                    key,
                    path.display()
                );
            }
        }
        Ok(())
    }
}
