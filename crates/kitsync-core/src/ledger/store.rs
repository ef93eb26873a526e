//! Ledger persistence inside the target project.
//!
//! The ledger lives at a fixed path in the project. Reads are lenient: a
//! missing, empty or corrupt file yields a complete default ledger. Writes
//! are atomic (tmp + rename).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

use crate::fs::write_atomic;
use crate::ledger::types::Ledger;
use crate::types::Category;

/// Ledger file name, relative to the project's tool directory.
pub const LEDGER_FILE_NAME: &str = ".kitsync.json";

/// How a loaded ledger came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOrigin {
    /// No ledger on disk (or an empty file): first run in this project.
    Fresh,
    /// Parsed from disk.
    Loaded,
    /// The file existed but could not be parsed; defaults were used.
    Recovered,
}

/// Result of [`LedgerStore::load`].
#[derive(Debug, Clone)]
pub struct LoadedLedger {
    pub ledger: Ledger,
    pub origin: LedgerOrigin,
}

/// Ledger storage for one project.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger.
    ///
    /// Only I/O failures other than "not found" are errors; unparsable
    /// content is logged and replaced by defaults.
    pub fn load(&self) -> anyhow::Result<LoadedLedger> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(LoadedLedger {
                    ledger: Ledger::new(),
                    origin: LedgerOrigin::Fresh,
                });
            }
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("Failed to read ledger: {}", self.path.display())));
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(LoadedLedger {
                ledger: Ledger::new(),
                origin: LedgerOrigin::Fresh,
            });
        }

        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "ledger root is not an object; starting from defaults");
                return Ok(LoadedLedger {
                    ledger: Ledger::new(),
                    origin: LedgerOrigin::Recovered,
                });
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "ledger is corrupt; starting from defaults");
                return Ok(LoadedLedger {
                    ledger: Ledger::new(),
                    origin: LedgerOrigin::Recovered,
                });
            }
        };

        let (ledger, dropped) = Ledger::overlay(&value);
        if dropped > 0 {
            tracing::warn!(path = %self.path.display(), dropped, "ledger had malformed entries");
        }
        Ok(LoadedLedger {
            ledger,
            origin: LedgerOrigin::Loaded,
        })
    }

    /// Write the complete ledger atomically (tmp + rename).
    pub fn flush(&self, ledger: &Ledger) -> anyhow::Result<()> {
        let bytes = serde_json::to_vec_pretty(ledger).context("Failed to serialize ledger")?;
        write_atomic(&self.path, &bytes)
            .with_context(|| format!("Failed to write ledger: {}", self.path.display()))
    }

    /// Read-modify-write the ledger with a custom function.
    pub fn modify<F, R>(&self, f: F) -> anyhow::Result<R>
    where
        F: FnOnce(&mut Ledger) -> anyhow::Result<R>,
    {
        let mut ledger = self.load()?.ledger;
        let result = f(&mut ledger)?;
        self.flush(&ledger)?;
        Ok(result)
    }

    /// Record a direct selection.
    pub fn track_install(
        &self,
        category: Category,
        name: &str,
        hash: &str,
        source_path: &Path,
    ) -> anyhow::Result<()> {
        self.modify(|ledger| {
            ledger.track_install(category, name, hash, source_path);
            Ok(())
        })
    }

    /// Forget a direct selection. Returns `true` if it was tracked.
    pub fn track_uninstall(&self, category: Category, name: &str) -> anyhow::Result<bool> {
        self.modify(|ledger| Ok(ledger.track_uninstall(category, name)))
    }

    /// Record an auto-resolved dependency (union of `required_by`).
    pub fn track_dependency(
        &self,
        category: Category,
        name: &str,
        hash: &str,
        source_path: &Path,
        required_by: &[String],
    ) -> anyhow::Result<()> {
        self.modify(|ledger| {
            ledger.track_dependency(category, name, hash, source_path, required_by.iter().cloned())
        })
    }

    /// Delete an auto-resolved dependency. Returns `true` if it was tracked.
    pub fn remove_dependency(&self, category: Category, name: &str) -> anyhow::Result<bool> {
        self.modify(|ledger| Ok(ledger.remove_dependency(category, name)))
    }

    /// Start a load-once, flush-at-end session.
    pub fn session(&self) -> anyhow::Result<LedgerSession> {
        let loaded = self.load()?;
        if loaded.origin == LedgerOrigin::Recovered {
            tracing::warn!(path = %self.path.display(), "previous install tracking was lost; components will be re-detected by content hash");
        }
        Ok(LedgerSession {
            store: self.clone(),
            persisted: loaded.ledger.clone(),
            ledger: loaded.ledger,
            origin: loaded.origin,
        })
    }
}

/// In-memory ledger for the duration of one sync run.
///
/// Mutations happen on [`LedgerSession::ledger_mut`]; [`LedgerSession::flush`]
/// writes only when the content differs from what is on disk.
#[derive(Debug)]
pub struct LedgerSession {
    store: LedgerStore,
    persisted: Ledger,
    ledger: Ledger,
    origin: LedgerOrigin,
}

impl LedgerSession {
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut Ledger {
        &mut self.ledger
    }

    pub fn origin(&self) -> LedgerOrigin {
        self.origin
    }

    pub fn is_dirty(&self) -> bool {
        self.ledger != self.persisted
    }

    /// Persist pending changes. Returns `true` if anything was written.
    pub fn flush(&mut self) -> anyhow::Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        self.store.flush(&self.ledger)?;
        self.persisted = self.ledger.clone();
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(tmp: &TempDir) -> LedgerStore {
        LedgerStore::new(tmp.path().join(".claude").join(LEDGER_FILE_NAME))
    }

    #[test]
    fn load_missing_is_fresh() {
        let tmp = TempDir::new().unwrap();
        let loaded = store_in(&tmp).load().unwrap();
        assert_eq!(loaded.origin, LedgerOrigin::Fresh);
        assert_eq!(loaded.ledger, Ledger::new());
    }

    #[test]
    fn load_empty_file_is_fresh() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "  \n").unwrap();

        assert_eq!(store.load().unwrap().origin, LedgerOrigin::Fresh);
    }

    #[test]
    fn load_corrupt_file_is_recovered() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "{ not json").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.origin, LedgerOrigin::Recovered);
        assert_eq!(loaded.ledger, Ledger::new());
    }

    #[test]
    fn flush_leaves_no_tmp_file() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);
        store.flush(&Ledger::new()).unwrap();

        let names: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec![LEDGER_FILE_NAME.to_string()]);
    }

    #[test]
    fn session_flush_skips_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = store_in(&tmp);

        let mut session = store.session().unwrap();
        assert!(!session.flush().unwrap());
        assert!(!store.path().exists());

        session
            .ledger_mut()
            .track_install(Category::Agent, "reviewer", "h", Path::new("/src/agents/reviewer.md"));
        assert!(session.flush().unwrap());
        assert!(!session.flush().unwrap());
        assert!(store.load().unwrap().ledger.installed(Category::Agent, "reviewer").is_some());
    }
}
