//! Configuration layer merging logic
//!
//! Global -> Project, field by field: any value the project sets wins.

use super::schema::{KitConfig, PathsConfig};

/// Merge configuration layers
///
/// # Arguments
/// * `global` - Global configuration from ~/.config/kitsync/kitsync.toml
/// * `project` - Project configuration from ./kitsync.toml
pub fn merge_configs(global: Option<KitConfig>, project: Option<KitConfig>) -> KitConfig {
    let mut merged = global.unwrap_or_default();

    if let Some(layer) = project {
        if layer.source.is_some() {
            merged.source = layer.source;
        }
        merge_paths(&mut merged.paths, layer.paths);
    }

    merged
}

fn merge_paths(base: &mut PathsConfig, layer: PathsConfig) {
    if layer.skills.is_some() {
        base.skills = layer.skills;
    }
    if layer.agents.is_some() {
        base.agents = layer.agents;
    }
    if layer.settings.is_some() {
        base.settings = layer.settings;
    }
    if layer.mcp.is_some() {
        base.mcp = layer.mcp;
    }
}
