//! kitsync core library
//!
//! Distributes skills, agents, hooks and MCP server definitions from a shared
//! source tree into projects, tracks what was placed there, and resolves the
//! dependencies skills declare on each other.

pub mod config;
pub mod context;
pub mod detect;
pub mod error;
pub mod fs;
pub mod ledger;
pub mod merge;
pub mod orphans;
pub mod resolve;
pub mod selection;
pub mod status;
pub mod sync;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Context and configuration
    pub use crate::config::{ConfigStore, KitConfig, TargetLayout};
    pub use crate::context::AppContext;

    // Discovery and status
    pub use crate::detect::{Detection, Detector, Universe};
    pub use crate::status::{ComponentStatus, DriftReason, StatusReport, StatusResolver, Tracking};

    // Resolution and sync
    pub use crate::error::{DependencyError, SyncError};
    pub use crate::orphans::{OrphanCandidate, OrphanCollector};
    pub use crate::resolve::{DependencyResolver, Resolution, ResolutionWarning};
    pub use crate::selection::Selection;
    pub use crate::sync::{
        AssumeNo, AssumeYes, Confirmer, InstallOutcome, SyncEngine, SyncOutcome, SyncReport,
    };

    // Ledger
    pub use crate::ledger::{Ledger, LedgerOrigin, LedgerStore};

    // Components
    pub use crate::types::{Category, Component, ComponentRef};
}
