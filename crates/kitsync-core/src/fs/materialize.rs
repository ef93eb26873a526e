//! Copy, backup and removal of content-tree targets.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

/// Suffix appended to a target path when it is set aside before an overwrite.
pub const BACKUP_SUFFIX: &str = ".local";

/// Path a target is backed up to.
pub fn backup_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(BACKUP_SUFFIX);
    PathBuf::from(name)
}

/// Copy `src` (file or directory) into place at `dst`.
///
/// The copy is staged in a sibling temp path and renamed over `dst`, so a
/// failed copy never leaves a half-written target behind. An existing `dst`
/// is removed right before the rename.
pub fn replace_with_copy(src: &Path, dst: &Path) -> anyhow::Result<()> {
    let meta = fs::metadata(src)
        .with_context(|| format!("Failed to stat source: {}", src.display()))?;
    ensure_parent_dir(dst)?;

    let tmp = unique_temp_path(dst)?;
    let result = if meta.is_dir() {
        fs::create_dir_all(&tmp)
            .with_context(|| format!("Failed to create temp directory: {}", tmp.display()))
            .and_then(|_| copy_tree(src, &tmp))
    } else {
        fs::copy(src, &tmp)
            .map(|_| ())
            .with_context(|| format!("Failed to copy {} to {}", src.display(), tmp.display()))
    };

    if let Err(err) = result {
        let _ = remove_path(&tmp);
        return Err(err);
    }

    if fs::symlink_metadata(dst).is_ok() {
        remove_path(dst).with_context(|| {
            format!("Failed to remove existing destination: {}", dst.display())
        })?;
    }

    fs::rename(&tmp, dst).with_context(|| {
        format!(
            "Failed to move temp path {} into destination {}",
            tmp.display(),
            dst.display()
        )
    })?;
    Ok(())
}

/// Copy an existing target aside to `<target>.local`, replacing any older backup.
pub fn backup_aside(target: &Path) -> anyhow::Result<PathBuf> {
    let backup = backup_path(target);
    if fs::symlink_metadata(&backup).is_ok() {
        remove_path(&backup)
            .with_context(|| format!("Failed to remove old backup: {}", backup.display()))?;
    }

    let meta = fs::metadata(target)
        .with_context(|| format!("Failed to stat target: {}", target.display()))?;
    if meta.is_dir() {
        fs::create_dir_all(&backup)
            .with_context(|| format!("Failed to create backup: {}", backup.display()))?;
        copy_tree(target, &backup)?;
    } else {
        fs::copy(target, &backup).with_context(|| {
            format!(
                "Failed to back up {} to {}",
                target.display(),
                backup.display()
            )
        })?;
    }
    Ok(backup)
}

/// Write `bytes` to `path` through a temp sibling and a rename.
///
/// Readers see either the old file or the complete new one, never a
/// truncated write.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    ensure_parent_dir(path)?;
    let tmp = unique_temp_path(path)?;
    if let Err(err) = fs::write(&tmp, bytes) {
        let _ = fs::remove_file(&tmp);
        return Err(anyhow::Error::new(err)
            .context(format!("Failed to write temp file: {}", tmp.display())));
    }

    // Remove target first on Windows for replace semantics
    if cfg!(windows) && path.exists() {
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove existing file: {}", path.display()))?;
    }
    fs::rename(&tmp, path).with_context(|| {
        format!(
            "Failed to move temp file {} into place at {}",
            tmp.display(),
            path.display()
        )
    })?;
    Ok(())
}

/// Remove a file or directory. Missing paths are not an error.
pub fn remove_path(path: &Path) -> anyhow::Result<()> {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("Failed to stat: {}", path.display())));
        }
    };
    if meta.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))
    } else {
        fs::remove_file(path).with_context(|| format!("Failed to remove file: {}", path.display()))
    }
}

fn ensure_parent_dir(dst: &Path) -> anyhow::Result<()> {
    let parent = dst
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Destination path has no parent: {}", dst.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create destination parent: {}", parent.display()))?;
    Ok(())
}

fn unique_temp_path(dst: &Path) -> anyhow::Result<PathBuf> {
    let parent = dst
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Destination path has no parent: {}", dst.display()))?;
    let base = dst
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Destination path has no filename: {}", dst.display()))?;

    for attempt in 0u32..1000 {
        let name = if attempt == 0 {
            format!(".{}.tmp.{}", base.to_string_lossy(), std::process::id())
        } else {
            format!(
                ".{}.tmp.{}.{}",
                base.to_string_lossy(),
                std::process::id(),
                attempt
            )
        };
        let candidate = parent.join(name);
        if fs::symlink_metadata(&candidate).is_err() {
            return Ok(candidate);
        }
    }

    anyhow::bail!("Failed to allocate a unique temp path for {}", dst.display());
}

fn copy_tree(src: &Path, dst: &Path) -> anyhow::Result<()> {
    for entry in
        fs::read_dir(src).with_context(|| format!("Failed to read dir: {}", src.display()))?
    {
        let entry =
            entry.with_context(|| format!("Failed to read dir entry: {}", src.display()))?;
        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat dir entry: {}", entry.path().display()))?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if ty.is_dir() {
            fs::create_dir_all(&to)
                .with_context(|| format!("Failed to create directory: {}", to.display()))?;
            copy_tree(&from, &to)?;
        } else if ty.is_file() {
            fs::copy(&from, &to).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    from.display(),
                    to.display()
                )
            })?;
        } else {
            anyhow::bail!("Unsupported filesystem entry type at {}", from.display());
        }
    }
    Ok(())
}
