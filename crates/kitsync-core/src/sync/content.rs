//! Install and removal of content-tree components (skills, agents).

use std::path::{Path, PathBuf};

use crate::fs::{backup_aside, remove_path, replace_with_copy};
use crate::status::{source_hash, target_hash};
use crate::types::Component;

use super::InstallOutcome;

/// Result of placing one content tree.
#[derive(Debug, Clone)]
pub(crate) struct ContentInstall {
    pub outcome: InstallOutcome,
    /// Source hash, set when the target now matches the source.
    pub hash: Option<String>,
}

/// Bring the target of `component` in line with its source.
///
/// A target that already matches is left alone. A differing target is backed
/// up to `<target>.local` before it is replaced. Failures are reported in the
/// outcome rather than returned, so one broken component does not stop the
/// rest of the run.
pub(crate) fn install_content(component: &Component) -> ContentInstall {
    match try_install(component) {
        Ok(install) => install,
        Err(err) => {
            tracing::warn!(
                category = %component.category,
                name = %component.name,
                error = %format!("{err:#}"),
                "install failed"
            );
            ContentInstall {
                outcome: InstallOutcome::Failed(format!("{err:#}")),
                hash: None,
            }
        }
    }
}

fn try_install(component: &Component) -> anyhow::Result<ContentInstall> {
    let target = component.target_path().ok_or_else(|| {
        anyhow::anyhow!("{}:{} has no target path", component.category, component.name)
    })?;

    let Some(source) = source_hash(component)? else {
        return Ok(ContentInstall {
            outcome: InstallOutcome::Failed(format!(
                "source missing: {}",
                component.source_path.display()
            )),
            hash: None,
        });
    };

    let outcome = match target_hash(component)? {
        Some(existing) if existing == source => InstallOutcome::Unchanged,
        Some(_) => {
            let backup = backup_aside(target)?;
            replace_with_copy(&component.source_path, target)?;
            tracing::info!(
                category = %component.category,
                name = %component.name,
                backup = %backup.display(),
                "updated"
            );
            InstallOutcome::Updated {
                backup: Some(backup),
            }
        }
        None => {
            replace_with_copy(&component.source_path, target)?;
            tracing::info!(category = %component.category, name = %component.name, "installed");
            InstallOutcome::Installed
        }
    };

    Ok(ContentInstall {
        outcome,
        hash: Some(source),
    })
}

/// Remove an installed content tree.
///
/// When the target no longer matches `recorded_hash` it holds local edits and
/// is copied aside first. Returns the backup path, if one was made.
pub(crate) fn remove_content(
    target: &Path,
    recorded_hash: Option<&str>,
    excluded: Option<&str>,
) -> anyhow::Result<Option<PathBuf>> {
    let Some(current) = crate::fs::hash_path(target, excluded)? else {
        return Ok(None);
    };
    let backup = match recorded_hash {
        Some(recorded) if recorded == current => None,
        _ => Some(backup_aside(target)?),
    };
    remove_path(target)?;
    Ok(backup)
}
