//! Target project layout resolution.

use std::path::{Path, PathBuf};

use super::schema::PathsConfig;
use crate::ledger::LEDGER_FILE_NAME;

pub const DEFAULT_SKILLS_DIR: &str = ".claude/skills";
pub const DEFAULT_AGENTS_DIR: &str = ".claude/agents";
pub const DEFAULT_SETTINGS_FILE: &str = ".claude/settings.json";
pub const DEFAULT_MCP_FILE: &str = ".mcp.json";

/// Directory (relative to the project) holding the ledger. Not configurable.
pub const LEDGER_DIR: &str = ".claude";

/// Config file name for both layers.
pub const CONFIG_FILE_NAME: &str = "kitsync.toml";

/// Absolute locations of everything kitsync writes in one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetLayout {
    pub project_root: PathBuf,
    pub skills_dir: PathBuf,
    pub agents_dir: PathBuf,
    pub settings_file: PathBuf,
    pub mcp_file: PathBuf,
    pub ledger_file: PathBuf,
}

impl TargetLayout {
    /// Layout with every path at its default.
    pub fn new(project_root: &Path) -> Self {
        Self::with_paths(project_root, &PathsConfig::default())
    }

    pub fn with_paths(project_root: &Path, paths: &PathsConfig) -> Self {
        let resolve = |configured: &Option<PathBuf>, default: &str| {
            project_root.join(configured.as_deref().unwrap_or(Path::new(default)))
        };
        Self {
            project_root: project_root.to_path_buf(),
            skills_dir: resolve(&paths.skills, DEFAULT_SKILLS_DIR),
            agents_dir: resolve(&paths.agents, DEFAULT_AGENTS_DIR),
            settings_file: resolve(&paths.settings, DEFAULT_SETTINGS_FILE),
            mcp_file: resolve(&paths.mcp, DEFAULT_MCP_FILE),
            ledger_file: project_root.join(LEDGER_DIR).join(LEDGER_FILE_NAME),
        }
    }

    pub fn skill_target(&self, name: &str) -> PathBuf {
        self.skills_dir.join(name)
    }

    pub fn agent_target(&self, file_name: &str) -> PathBuf {
        self.agents_dir.join(file_name)
    }
}

/// Global config directory (`~/.config/kitsync` on Linux).
pub fn global_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("kitsync"))
}
