//! One sync pass over a target project.
//!
//! Order of work:
//! 1. Resolve dependencies; any cycle aborts before anything is touched
//! 2. Confirm hooks whose required environment is missing
//! 3. Install / remove direct skills and agents
//! 4. Merge / remove hooks in the settings document
//! 5. Install dependencies (endpoints go into the endpoint document)
//! 6. Offer orphaned dependencies for removal, one at a time
//! 7. Flush the ledger if it changed

mod content;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use crate::config::TargetLayout;
use crate::detect::Detection;
use crate::ledger::{LedgerOrigin, LedgerSession, LedgerStore};
use crate::merge::{EndpointRegistry, HookRegistry, hash_json_map};
use crate::orphans::{OrphanCandidate, OrphanCollector};
use crate::resolve::{DependencyResolver, Resolution, ResolutionWarning};
use crate::selection::Selection;
use crate::status::{EnvLookup, manifest_exclusion, missing_env, process_env};
use crate::types::{Category, Component, ComponentRef};

use content::{install_content, remove_content};

/// What happened to one component during a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed,
    /// Replaced; content trees record where the previous target was copied.
    Updated { backup: Option<PathBuf> },
    Unchanged,
    Removed { backup: Option<PathBuf> },
    /// Left untouched on the user's request.
    Skipped(String),
    Failed(String),
}

impl InstallOutcome {
    /// Whether the project changed for this component.
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            InstallOutcome::Installed | InstallOutcome::Updated { .. } | InstallOutcome::Removed { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, InstallOutcome::Failed(_))
    }
}

impl fmt::Display for InstallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallOutcome::Installed => f.write_str("installed"),
            InstallOutcome::Updated { backup: Some(backup) } => {
                write!(f, "updated (previous copy at {})", backup.display())
            }
            InstallOutcome::Updated { backup: None } => f.write_str("updated"),
            InstallOutcome::Unchanged => f.write_str("unchanged"),
            InstallOutcome::Removed { backup: Some(backup) } => {
                write!(f, "removed (local edits saved to {})", backup.display())
            }
            InstallOutcome::Removed { backup: None } => f.write_str("removed"),
            InstallOutcome::Skipped(reason) => write!(f, "skipped: {}", reason),
            InstallOutcome::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentChange {
    pub component: ComponentRef,
    pub outcome: InstallOutcome,
    /// `true` for auto-resolved dependencies.
    pub dependency: bool,
}

/// Summary of an applied sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub changes: Vec<ComponentChange>,
    pub warnings: Vec<ResolutionWarning>,
    /// Orphans the user chose to keep; offered again next run.
    pub kept_orphans: Vec<OrphanCandidate>,
    /// Shared JSON documents that were rewritten.
    pub documents_written: Vec<PathBuf>,
    pub ledger_written: bool,
    pub ledger_origin: LedgerOrigin,
}

impl SyncReport {
    fn new(warnings: Vec<ResolutionWarning>, ledger_origin: LedgerOrigin) -> Self {
        Self {
            changes: Vec::new(),
            warnings,
            kept_orphans: Vec::new(),
            documents_written: Vec::new(),
            ledger_written: false,
            ledger_origin,
        }
    }

    fn record(&mut self, component: ComponentRef, outcome: InstallOutcome, dependency: bool) {
        self.changes.push(ComponentChange {
            component,
            outcome,
            dependency,
        });
    }

    /// Outcome recorded for a component, if it was part of this run.
    pub fn outcome(&self, category: Category, name: &str) -> Option<&InstallOutcome> {
        self.changes
            .iter()
            .find(|c| c.component.category == category && c.component.name == name)
            .map(|c| &c.outcome)
    }

    pub fn has_failures(&self) -> bool {
        self.changes.iter().any(|c| c.outcome.is_failure())
    }

    /// Nothing on disk changed.
    pub fn is_noop(&self) -> bool {
        !self.ledger_written
            && self.documents_written.is_empty()
            && !self.changes.iter().any(|c| c.outcome.is_change())
    }
}

/// Result of [`SyncEngine::apply`].
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Applied(SyncReport),
    /// Dependency resolution failed; nothing was changed.
    Aborted(Resolution),
}

/// Decisions the engine needs from the user mid-run.
pub trait Confirmer {
    /// A selected hook needs variables that are not set. Return `true` to
    /// install it anyway.
    fn confirm_missing_env(&mut self, component: &Component, missing: &[String]) -> anyhow::Result<bool>;

    /// Return `true` to remove an orphaned dependency.
    fn confirm_orphan(&mut self, orphan: &OrphanCandidate) -> anyhow::Result<bool>;
}

/// Accepts every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirmer for AssumeYes {
    fn confirm_missing_env(&mut self, _: &Component, _: &[String]) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn confirm_orphan(&mut self, _: &OrphanCandidate) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Declines every prompt.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeNo;

impl Confirmer for AssumeNo {
    fn confirm_missing_env(&mut self, _: &Component, _: &[String]) -> anyhow::Result<bool> {
        Ok(false)
    }

    fn confirm_orphan(&mut self, _: &OrphanCandidate) -> anyhow::Result<bool> {
        Ok(false)
    }
}

/// Applies a selection to one project.
pub struct SyncEngine<'a> {
    detection: &'a Detection,
    layout: &'a TargetLayout,
    store: LedgerStore,
    env: EnvLookup,
}

impl<'a> SyncEngine<'a> {
    pub fn new(detection: &'a Detection, layout: &'a TargetLayout) -> Self {
        Self {
            detection,
            layout,
            store: LedgerStore::new(layout.ledger_file.clone()),
            env: process_env(),
        }
    }

    /// Replace the environment lookup used for hook requirements.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    pub fn ledger_store(&self) -> &LedgerStore {
        &self.store
    }

    /// Make the project match `selection`.
    pub fn apply(
        &self,
        selection: &Selection,
        confirmer: &mut dyn Confirmer,
    ) -> anyhow::Result<SyncOutcome> {
        let resolution = DependencyResolver::new(self.detection).resolve(selection);
        if resolution.has_errors() {
            for error in &resolution.errors {
                tracing::error!("{}", error);
            }
            return Ok(SyncOutcome::Aborted(resolution));
        }

        let mut session = self.store.session()?;
        let declined = self.confirm_hooks(selection, &session, confirmer)?;
        let previous = Selection::from_ledger(session.ledger());
        let mut report = SyncReport::new(resolution.warnings.clone(), session.origin());

        for category in [Category::Skill, Category::Agent] {
            self.sync_direct_content(
                category,
                selection,
                &previous,
                &resolution,
                &mut session,
                &mut report,
            )?;
        }
        self.sync_hooks(selection, &previous, &declined, &mut session, &mut report)?;

        let mut endpoints = EndpointRegistry::load(&self.layout.mcp_file)?;
        self.install_dependencies(&resolution, &mut endpoints, &mut session, &mut report)?;
        self.collect_orphans(
            selection,
            &resolution,
            &mut endpoints,
            &mut session,
            confirmer,
            &mut report,
        )?;

        if endpoints.save()? {
            report.documents_written.push(self.layout.mcp_file.clone());
        }
        report.ledger_written = session.flush()?;

        tracing::info!(
            changes = report.changes.iter().filter(|c| c.outcome.is_change()).count(),
            ledger_written = report.ledger_written,
            "sync complete"
        );
        Ok(SyncOutcome::Applied(report))
    }

    /// Ask about selected hooks with unset variables. Hooks already installed
    /// at their current definition are not asked about again.
    fn confirm_hooks(
        &self,
        selection: &Selection,
        session: &LedgerSession,
        confirmer: &mut dyn Confirmer,
    ) -> anyhow::Result<BTreeSet<String>> {
        let mut declined = BTreeSet::new();
        for name in &selection.hooks {
            let Some(component) = self.detection.universe.find(Category::Hook, name) else {
                continue;
            };
            let missing = missing_env(component, self.env.as_ref());
            if missing.is_empty() {
                continue;
            }
            let declared = component.entry.as_ref().map(|e| hash_json_map(&e.config));
            let tracked = session.ledger().tracked_hash(Category::Hook, name);
            if declared.is_some() && tracked == declared.as_deref() {
                continue;
            }
            if !confirmer.confirm_missing_env(component, &missing)? {
                tracing::info!(hook = %name, missing = ?missing, "hook skipped: required environment not set");
                declined.insert(name.clone());
            }
        }
        Ok(declined)
    }

    fn sync_direct_content(
        &self,
        category: Category,
        selection: &Selection,
        previous: &Selection,
        resolution: &Resolution,
        session: &mut LedgerSession,
        report: &mut SyncReport,
    ) -> anyhow::Result<()> {
        let empty = BTreeSet::new();
        let wanted = selection.names(category).unwrap_or(&empty);

        for name in wanted {
            let reference = ComponentRef::new(category, name.clone());
            let Some(component) = self.detection.universe.find(category, name) else {
                tracing::warn!(%category, %name, "selected component is not in the source tree");
                report.record(
                    reference,
                    InstallOutcome::Failed("not found in source tree".into()),
                    false,
                );
                continue;
            };

            let install = install_content(component);
            if let Some(hash) = &install.hash {
                let ledger = session.ledger_mut();
                let current = ledger.installed(category, name).map(|e| e.hash.as_str());
                if current != Some(hash.as_str()) {
                    ledger.track_install(category, name, hash, &component.source_path);
                }
            }
            report.record(reference, install.outcome, false);
        }

        let dropped = previous
            .names(category)
            .unwrap_or(&empty)
            .difference(wanted);
        for name in dropped {
            // Still needed by a selected skill: becomes a dependency later.
            if resolution
                .required(category)
                .is_some_and(|required| required.contains_key(name))
            {
                continue;
            }

            let target = self.target_for(category, name);
            let recorded = session
                .ledger()
                .tracked_hash(category, name)
                .map(str::to_string);
            let outcome =
                match remove_content(&target, recorded.as_deref(), manifest_exclusion(category)) {
                    Ok(backup) => {
                        session.ledger_mut().track_uninstall(category, name);
                        tracing::info!(%category, %name, "removed");
                        InstallOutcome::Removed { backup }
                    }
                    Err(err) => {
                        tracing::warn!(%category, %name, error = %format!("{err:#}"), "removal failed");
                        InstallOutcome::Failed(format!("{err:#}"))
                    }
                };
            report.record(ComponentRef::new(category, name.clone()), outcome, false);
        }
        Ok(())
    }

    fn sync_hooks(
        &self,
        selection: &Selection,
        previous: &Selection,
        declined: &BTreeSet<String>,
        session: &mut LedgerSession,
        report: &mut SyncReport,
    ) -> anyhow::Result<()> {
        let stale: Vec<&String> = previous.hooks.difference(&selection.hooks).collect();
        if selection.hooks.is_empty() && stale.is_empty() {
            return Ok(());
        }

        let mut registry = HookRegistry::load(&self.layout.settings_file)?;

        for name in &selection.hooks {
            let reference = ComponentRef::new(Category::Hook, name.clone());
            if declined.contains(name) {
                report.record(
                    reference,
                    InstallOutcome::Skipped("required environment not set".into()),
                    false,
                );
                continue;
            }
            let Some(entry) = self
                .detection
                .universe
                .find(Category::Hook, name)
                .and_then(|component| component.entry.as_ref().map(|e| (component, e)))
            else {
                tracing::warn!(hook = %name, "selected hook is not in the source tree");
                report.record(
                    reference,
                    InstallOutcome::Failed("not found in source tree".into()),
                    false,
                );
                continue;
            };
            let (component, entry) = entry;

            let hash = hash_json_map(&entry.config);
            let tracked = session
                .ledger()
                .installed(Category::Hook, name)
                .map(|e| e.hash.clone());
            let existed = registry.merge(name, &entry.config);

            let outcome = if !existed {
                tracing::info!(hook = %name, "hook added");
                InstallOutcome::Installed
            } else if tracked.as_deref() != Some(hash.as_str()) {
                tracing::info!(hook = %name, "hook updated");
                InstallOutcome::Updated { backup: None }
            } else {
                InstallOutcome::Unchanged
            };
            if tracked.as_deref() != Some(hash.as_str()) {
                session
                    .ledger_mut()
                    .track_install(Category::Hook, name, &hash, &component.source_path);
            }
            report.record(reference, outcome, false);
        }

        for name in stale {
            registry.remove(name);
            session.ledger_mut().track_uninstall(Category::Hook, name);
            tracing::info!(hook = %name, "hook removed");
            report.record(
                ComponentRef::new(Category::Hook, name.clone()),
                InstallOutcome::Removed { backup: None },
                false,
            );
        }

        if registry.save()? {
            report
                .documents_written
                .push(self.layout.settings_file.clone());
        }
        Ok(())
    }

    fn install_dependencies(
        &self,
        resolution: &Resolution,
        endpoints: &mut EndpointRegistry,
        session: &mut LedgerSession,
        report: &mut SyncReport,
    ) -> anyhow::Result<()> {
        for category in [Category::Skill, Category::Agent] {
            let Some(required) = resolution.required(category) else {
                continue;
            };
            for (name, requirers) in required {
                let reference = ComponentRef::new(category, name.clone());
                let Some(component) = self.detection.universe.find(category, name) else {
                    report.record(
                        reference,
                        InstallOutcome::Failed("not found in source tree".into()),
                        true,
                    );
                    continue;
                };
                let install = install_content(component);
                if let Some(hash) = &install.hash {
                    track_dependency(session, component, hash, requirers)?;
                }
                report.record(reference, install.outcome, true);
            }
        }

        for (name, requirers) in &resolution.endpoints {
            let reference = ComponentRef::new(Category::Endpoint, name.clone());
            let Some((component, entry)) = self
                .detection
                .find(Category::Endpoint, name)
                .and_then(|component| component.entry.as_ref().map(|e| (component, e)))
            else {
                report.record(
                    reference,
                    InstallOutcome::Failed("not found in endpoint pool".into()),
                    true,
                );
                continue;
            };

            let declared = hash_json_map(&entry.config);
            let outcome = match endpoints.hash_of(name) {
                Some(present) if present == declared => InstallOutcome::Unchanged,
                Some(_) => {
                    endpoints.upsert(name, &entry.config);
                    tracing::info!(endpoint = %name, "endpoint updated");
                    InstallOutcome::Updated { backup: None }
                }
                None => {
                    endpoints.upsert(name, &entry.config);
                    tracing::info!(endpoint = %name, "endpoint added");
                    InstallOutcome::Installed
                }
            };
            track_dependency(session, component, &declared, requirers)?;
            report.record(reference, outcome, true);
        }
        Ok(())
    }

    fn collect_orphans(
        &self,
        selection: &Selection,
        resolution: &Resolution,
        endpoints: &mut EndpointRegistry,
        session: &mut LedgerSession,
        confirmer: &mut dyn Confirmer,
        report: &mut SyncReport,
    ) -> anyhow::Result<()> {
        let retained = OrphanCollector::retained_skills(selection, resolution);

        for candidate in OrphanCollector::collect(session.ledger(), &retained) {
            let category = candidate.component.category;
            let name = candidate.component.name.clone();

            if !confirmer.confirm_orphan(&candidate)? {
                tracing::info!(%category, %name, "orphan kept");
                report.kept_orphans.push(candidate);
                continue;
            }

            let outcome = match category {
                Category::Endpoint => {
                    endpoints.remove(&name);
                    InstallOutcome::Removed { backup: None }
                }
                Category::Hook => InstallOutcome::Removed { backup: None },
                Category::Skill | Category::Agent => {
                    let target = self.target_for(category, &name);
                    let recorded = session
                        .ledger()
                        .tracked_hash(category, &name)
                        .map(str::to_string);
                    match remove_content(&target, recorded.as_deref(), manifest_exclusion(category))
                    {
                        Ok(backup) => InstallOutcome::Removed { backup },
                        Err(err) => InstallOutcome::Failed(format!("{err:#}")),
                    }
                }
            };

            if !outcome.is_failure() {
                session.ledger_mut().remove_dependency(category, &name);
                tracing::info!(%category, %name, "orphan removed");
            }
            report.record(candidate.component, outcome, true);
        }

        // Survivors drop requirers that are no longer retained.
        for category in Category::ALL {
            let names: Vec<String> = session
                .ledger()
                .dependencies(category)
                .map(|(name, _)| name.clone())
                .collect();
            for name in names {
                session
                    .ledger_mut()
                    .retain_required_by(category, &name, &retained);
            }
        }
        Ok(())
    }

    /// Target of a content tree, from the source scan when it is still there.
    fn target_for(&self, category: Category, name: &str) -> PathBuf {
        if let Some(path) = self
            .detection
            .universe
            .find(category, name)
            .and_then(Component::target_path)
        {
            return path.clone();
        }
        match category {
            Category::Agent => self.layout.agent_target(&format!("{name}.md")),
            _ => self.layout.skill_target(name),
        }
    }
}

/// Record a dependency unless the ledger already says the same thing.
fn track_dependency(
    session: &mut LedgerSession,
    component: &Component,
    hash: &str,
    requirers: &BTreeSet<String>,
) -> anyhow::Result<()> {
    let up_to_date = session
        .ledger()
        .dependency(component.category, &component.name)
        .is_some_and(|dep| {
            dep.hash == hash
                && dep.source_path == component.source_path
                && requirers.is_subset(&dep.required_by)
        });
    if up_to_date {
        return Ok(());
    }
    session.ledger_mut().track_dependency(
        component.category,
        &component.name,
        hash,
        &component.source_path,
        requirers.iter().cloned(),
    )
}
