//! Application context shared by the front ends.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{ConfigStore, KitConfig, TargetLayout, global_config_dir};
use crate::detect::{Detection, Detector};
use crate::error::SyncError;
use crate::ledger::LedgerStore;
use crate::merge::{EndpointRegistry, HookRegistry};
use crate::sync::SyncEngine;

/// Resolved paths and configuration for one project.
///
/// Frontends create this once per invocation; creating it fails if the
/// project directory cannot be used.
#[derive(Debug, Clone)]
pub struct AppContext {
    project_root: PathBuf,
    source_root: PathBuf,
    global_config_dir: Option<PathBuf>,
    config: KitConfig,
    layout: TargetLayout,
}

impl AppContext {
    /// Open a project using the platform config directory for the global layer.
    pub fn open(project_root: &Path, source_override: Option<PathBuf>) -> anyhow::Result<Self> {
        Self::with_global_config_dir(project_root, source_override, global_config_dir())
    }

    /// Open a project with a custom global config directory (for testing).
    ///
    /// A relative `source_override` is taken from the current directory.
    pub fn with_global_config_dir(
        project_root: &Path,
        source_override: Option<PathBuf>,
        global_config_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let working_dir =
            std::env::current_dir().context("Failed to read the current directory")?;
        Self::from_working_dir(&working_dir, project_root, source_override, global_config_dir)
    }

    /// Open a project as if invoked from `working_dir`.
    ///
    /// The command-line source resolves against `working_dir`; `source` from
    /// kitsync.toml resolves against the project root.
    pub fn from_working_dir(
        working_dir: &Path,
        project_root: &Path,
        source_override: Option<PathBuf>,
        global_config_dir: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let project_root = validate_workspace(project_root)?;

        let store = ConfigStore::from_paths(global_config_dir.clone(), &project_root);
        let config = store.load().context("Failed to load kitsync.toml")?;
        config.validate()?;

        let source_root = match source_override {
            Some(source) => working_dir.join(source),
            None => config
                .source
                .as_ref()
                .map(|source| project_root.join(source))
                .ok_or(SyncError::SourceNotConfigured)?,
        };

        let layout = TargetLayout::with_paths(&project_root, &config.paths);
        tracing::debug!(
            project = %project_root.display(),
            source = %source_root.display(),
            "context ready"
        );

        Ok(Self {
            project_root,
            source_root,
            global_config_dir,
            config,
            layout,
        })
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn global_config_dir(&self) -> Option<&Path> {
        self.global_config_dir.as_deref()
    }

    pub fn config(&self) -> &KitConfig {
        &self.config
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    pub fn ledger_store(&self) -> LedgerStore {
        LedgerStore::new(self.layout.ledger_file.clone())
    }

    pub fn detector(&self) -> Detector {
        Detector::new(self.source_root.clone(), self.layout.clone())
    }

    /// Scan the source tree.
    pub fn detect(&self) -> anyhow::Result<Detection> {
        self.detector().scan_all()
    }

    pub fn hook_registry(&self) -> anyhow::Result<HookRegistry> {
        HookRegistry::load(&self.layout.settings_file)
    }

    pub fn endpoint_registry(&self) -> anyhow::Result<EndpointRegistry> {
        EndpointRegistry::load(&self.layout.mcp_file)
    }

    pub fn sync_engine<'a>(&'a self, detection: &'a Detection) -> SyncEngine<'a> {
        SyncEngine::new(detection, &self.layout)
    }
}

/// Check that the project root is an accessible directory and make it absolute.
pub fn validate_workspace(path: &Path) -> Result<PathBuf, SyncError> {
    let meta = fs::metadata(path).map_err(|source| SyncError::WorkspaceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    if !meta.is_dir() {
        return Err(SyncError::WorkspaceNotDirectory {
            path: path.to_path_buf(),
        });
    }
    // Listing proves the directory is readable, not just visible.
    fs::read_dir(path).map_err(|source| SyncError::WorkspaceUnavailable {
        path: path.to_path_buf(),
        source,
    })?;
    fs::canonicalize(path).map_err(|source| SyncError::WorkspaceUnavailable {
        path: path.to_path_buf(),
        source,
    })
}
