//! Structured errors for kitsync-core.
//!
//! Most fallible paths return `anyhow::Result` with context; these types cover
//! the conditions callers need to match on.

use std::path::PathBuf;

/// Errors reported by dependency resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DependencyError {
    /// A skill reappeared in its own active resolution chain.
    ///
    /// The chain starts and ends with the repeated skill.
    #[error("circular dependency: {}", .chain.join(" -> "))]
    Circular { chain: Vec<String> },
}

/// Errors that stop a run before anything is changed.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The project directory cannot be used.
    #[error("Cannot access workspace root {path}: {source}")]
    WorkspaceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The project path exists but is not a directory.
    #[error("Workspace root is not a directory: {path}")]
    WorkspaceNotDirectory { path: PathBuf },

    /// No source root was given on the command line or in config.
    #[error("No source root configured; pass --source or set `source` in kitsync.toml")]
    SourceNotConfigured,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_error_shows_chain() {
        let err = DependencyError::Circular {
            chain: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(err.to_string(), "circular dependency: a -> b -> a");
    }
}
