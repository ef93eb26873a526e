//! Deterministic content hashing for drift detection
//!
//! Skills are hashed as a whole directory, agents as a single file.

use anyhow::Context;
use std::fs;
use std::path::{Path, PathBuf};

/// Compute the content hash of a skill directory.
///
/// # Algorithm
/// - Collect every regular file under `path`, skipping the top-level file
///   named `excluded` (the skill manifest)
/// - Sort by relative path (`/`-separated) lexicographically
/// - Feed `relative_path || 0x00 || content` for each file into one blake3 digest
///
/// Directories contribute nothing on their own, so empty directories do not
/// affect the hash. Symlinks are rejected.
///
/// # Example
/// ```no_run
/// use kitsync_core::fs::tree_hash::hash_tree;
/// use std::path::Path;
///
/// let hash = hash_tree(Path::new("/path/to/skill"), Some("kit.json"))?;
/// assert_eq!(hash.len(), 64);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn hash_tree(path: &Path, excluded: Option<&str>) -> anyhow::Result<String> {
    let meta = fs::metadata(path)
        .with_context(|| format!("Failed to stat directory: {}", path.display()))?;
    if !meta.is_dir() {
        anyhow::bail!("Not a directory: {}", path.display());
    }

    let mut files = list_tree(path)?;
    if let Some(skip) = excluded {
        files.retain(|(relative, _)| relative != skip);
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = blake3::Hasher::new();
    for (relative, absolute) in &files {
        let content = fs::read(absolute)
            .with_context(|| format!("Failed to read file: {}", absolute.display()))?;
        hasher.update(relative.as_bytes());
        hasher.update(&[0x00]);
        hasher.update(&content);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute the content hash of a single file.
pub fn hash_file(path: &Path) -> anyhow::Result<String> {
    let content =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    Ok(blake3::hash(&content).to_hex().to_string())
}

/// Hash a file or directory, whichever `path` is.
///
/// Returns `None` when nothing exists at `path`.
pub fn hash_path(path: &Path, excluded: Option<&str>) -> anyhow::Result<Option<String>> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => hash_tree(path, excluded).map(Some),
        Ok(_) => hash_file(path).map(Some),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => {
            Err(anyhow::Error::new(err).context(format!("Failed to stat: {}", path.display())))
        }
    }
}

/// Every regular file below `root` as `(relative/path, absolute path)`.
fn list_tree(root: &Path) -> anyhow::Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    let mut pending: Vec<(String, PathBuf)> = vec![(String::new(), root.to_path_buf())];

    while let Some((prefix, dir)) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .with_context(|| format!("Failed to read directory: {}", dir.display()))?;
        for entry in entries {
            let entry = entry
                .with_context(|| format!("Failed to read directory entry: {}", dir.display()))?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative = if prefix.is_empty() {
                name
            } else {
                format!("{prefix}/{name}")
            };

            let kind = entry
                .file_type()
                .with_context(|| format!("Failed to stat file: {}", path.display()))?;
            if kind.is_dir() {
                pending.push((relative, path));
            } else if kind.is_file() {
                files.push((relative, path));
            } else if kind.is_symlink() {
                anyhow::bail!("Symlinks are not supported: {}", path.display());
            } else {
                anyhow::bail!("Unsupported filesystem entry type: {}", path.display());
            }
        }
    }

    Ok(files)
}
