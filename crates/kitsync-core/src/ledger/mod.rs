//! Install ledger types and persistence.
//!
//! Represents what kitsync installed in a project and why.

pub mod store;
pub mod types;

pub use store::{LEDGER_FILE_NAME, LedgerOrigin, LedgerSession, LedgerStore, LoadedLedger};
pub use types::{INSTALLED_BY, InstalledEntry, LEDGER_VERSION, Ledger, ResolvedDependency};
