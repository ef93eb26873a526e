//! Config store for loading kitsync.toml layers.

use std::path::{Path, PathBuf};

use super::merge::merge_configs;
use super::parser::parse_kit_toml;
use super::paths::CONFIG_FILE_NAME;
use super::schema::KitConfig;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    global_path: Option<PathBuf>,
    project_path: PathBuf,
}

impl ConfigStore {
    pub fn from_paths(global_dir: Option<PathBuf>, project_root: &Path) -> Self {
        Self {
            global_path: global_dir.map(|dir| dir.join(CONFIG_FILE_NAME)),
            project_path: project_root.join(CONFIG_FILE_NAME),
        }
    }

    pub fn global_path(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    pub fn project_path(&self) -> &Path {
        &self.project_path
    }

    /// Load and merge both layers. Missing files are skipped; malformed ones
    /// are errors.
    pub fn load(&self) -> anyhow::Result<KitConfig> {
        let global = match &self.global_path {
            Some(path) => load_layer(path)?,
            None => None,
        };
        let project = load_layer(&self.project_path)?;
        Ok(merge_configs(global, project))
    }
}

fn load_layer(path: &Path) -> anyhow::Result<Option<KitConfig>> {
    if !path.exists() {
        return Ok(None);
    }
    tracing::debug!(path = %path.display(), "loading config layer");
    parse_kit_toml(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_merges_layers() {
        let tmp = TempDir::new().unwrap();
        let global_dir = tmp.path().join("global");
        let project = tmp.path().join("project");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(
            global_dir.join(CONFIG_FILE_NAME),
            "source = \"/opt/kit\"\n[paths]\nskills = \"g/skills\"\n",
        )
        .unwrap();
        std::fs::write(
            project.join(CONFIG_FILE_NAME),
            "[paths]\nskills = \"p/skills\"\n",
        )
        .unwrap();

        let config = ConfigStore::from_paths(Some(global_dir), &project)
            .load()
            .unwrap();

        assert_eq!(config.source, Some(PathBuf::from("/opt/kit")));
        assert_eq!(config.paths.skills, Some(PathBuf::from("p/skills")));
    }

    #[test]
    fn load_without_files_is_default() {
        let tmp = TempDir::new().unwrap();
        let config = ConfigStore::from_paths(None, tmp.path()).load().unwrap();
        assert_eq!(config, KitConfig::default());
    }

    #[test]
    fn malformed_layer_is_an_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE_NAME), "source = [").unwrap();
        assert!(ConfigStore::from_paths(None, tmp.path()).load().is_err());
    }
}
