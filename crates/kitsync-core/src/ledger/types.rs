//! Ledger types for install tracking.
//!
//! The ledger records what kitsync placed in a project: direct selections
//! under `components`, auto-resolved dependencies under `resolvedDeps`.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Category;

/// Current ledger format version.
pub const LEDGER_VERSION: u32 = 1;

/// Value of the `installedBy` tag.
pub const INSTALLED_BY: &str = "kitsync";

/// Persisted install ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    /// Ledger format version
    pub version: u32,

    /// Tool tag
    pub installed_by: String,

    /// Components the user selected directly
    pub components: BTreeMap<Category, BTreeMap<String, InstalledEntry>>,

    /// Components installed because a selected skill required them
    pub resolved_deps: BTreeMap<Category, BTreeMap<String, ResolvedDependency>>,
}

/// A directly selected component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledEntry {
    pub hash: String,
    pub installed_at: DateTime<Utc>,
    pub source_path: PathBuf,
}

/// An auto-resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedDependency {
    pub hash: String,
    pub installed_at: DateTime<Utc>,
    pub source_path: PathBuf,

    /// Skills that required this entry. Never empty while the entry exists.
    pub required_by: BTreeSet<String>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create an empty ledger with every category present.
    pub fn new() -> Self {
        Self {
            version: LEDGER_VERSION,
            installed_by: INSTALLED_BY.to_string(),
            components: Category::ALL
                .into_iter()
                .map(|c| (c, BTreeMap::new()))
                .collect(),
            resolved_deps: Category::ALL
                .into_iter()
                .map(|c| (c, BTreeMap::new()))
                .collect(),
        }
    }

    /// Build a ledger from a parsed JSON value, back-filling anything missing
    /// or malformed from the defaults.
    ///
    /// Returns the ledger and the number of entries that had to be dropped.
    pub fn overlay(value: &Value) -> (Self, usize) {
        let mut ledger = Self::new();
        let mut dropped = 0;

        let Some(root) = value.as_object() else {
            return (ledger, dropped);
        };

        if let Some(version) = root.get("version").and_then(Value::as_u64) {
            ledger.version = u32::try_from(version).unwrap_or(LEDGER_VERSION);
        }
        if let Some(tag) = root.get("installedBy").and_then(Value::as_str) {
            ledger.installed_by = tag.to_string();
        }

        if let Some(components) = root.get("components").and_then(Value::as_object) {
            for (key, entries) in components {
                let Some(category) = Category::from_key(key) else {
                    tracing::warn!(category = %key, "ignoring unknown ledger category");
                    continue;
                };
                let Some(entries) = entries.as_object() else {
                    continue;
                };
                for (name, raw) in entries {
                    match serde_json::from_value::<InstalledEntry>(raw.clone()) {
                        Ok(entry) => {
                            ledger.direct_mut(category).insert(name.clone(), entry);
                        }
                        Err(err) => {
                            tracing::warn!(%category, %name, error = %err, "dropping malformed ledger entry");
                            dropped += 1;
                        }
                    }
                }
            }
        }

        if let Some(deps) = root.get("resolvedDeps").and_then(Value::as_object) {
            for (key, entries) in deps {
                let Some(category) = Category::from_key(key) else {
                    tracing::warn!(category = %key, "ignoring unknown ledger category");
                    continue;
                };
                let Some(entries) = entries.as_object() else {
                    continue;
                };
                for (name, raw) in entries {
                    let parsed = serde_json::from_value::<ResolvedDependency>(raw.clone());
                    match parsed {
                        Ok(dep) if dep.required_by.is_empty() => {
                            tracing::warn!(%category, %name, "dropping dependency with empty requiredBy");
                            dropped += 1;
                        }
                        Ok(_) if ledger.installed(category, name).is_some() => {
                            tracing::warn!(%category, %name, "dropping dependency that is also a direct selection");
                            dropped += 1;
                        }
                        Ok(dep) => {
                            ledger.deps_mut(category).insert(name.clone(), dep);
                        }
                        Err(err) => {
                            tracing::warn!(%category, %name, error = %err, "dropping malformed ledger dependency");
                            dropped += 1;
                        }
                    }
                }
            }
        }

        (ledger, dropped)
    }

    /// Direct selection entry, if tracked.
    pub fn installed(&self, category: Category, name: &str) -> Option<&InstalledEntry> {
        self.components.get(&category).and_then(|m| m.get(name))
    }

    /// Auto-resolved entry, if tracked.
    pub fn dependency(&self, category: Category, name: &str) -> Option<&ResolvedDependency> {
        self.resolved_deps.get(&category).and_then(|m| m.get(name))
    }

    /// Hash recorded for `(category, name)` in either section.
    pub fn tracked_hash(&self, category: Category, name: &str) -> Option<&str> {
        self.installed(category, name)
            .map(|e| e.hash.as_str())
            .or_else(|| self.dependency(category, name).map(|d| d.hash.as_str()))
    }

    pub fn is_tracked(&self, category: Category, name: &str) -> bool {
        self.tracked_hash(category, name).is_some()
    }

    /// Names of direct selections in a category.
    pub fn direct_names(&self, category: Category) -> BTreeSet<String> {
        self.components
            .get(&category)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Auto-resolved entries in a category.
    pub fn dependencies(&self, category: Category) -> impl Iterator<Item = (&String, &ResolvedDependency)> {
        self.resolved_deps.get(&category).into_iter().flatten()
    }

    /// Record a direct selection, replacing any previous entry.
    ///
    /// A same-named auto-resolved entry is dropped: the component is now owned
    /// by the user's selection.
    pub fn track_install(&mut self, category: Category, name: &str, hash: &str, source_path: &Path) {
        self.deps_mut(category).remove(name);
        self.direct_mut(category).insert(
            name.to_string(),
            InstalledEntry {
                hash: hash.to_string(),
                installed_at: Utc::now(),
                source_path: source_path.to_path_buf(),
            },
        );
    }

    /// Forget a direct selection. Returns `true` if it was tracked.
    pub fn track_uninstall(&mut self, category: Category, name: &str) -> bool {
        self.direct_mut(category).remove(name).is_some()
    }

    /// Record an auto-resolved dependency.
    ///
    /// Repeated calls keep the original `installedAt` and union `required_by`
    /// into the existing set. A same-named direct entry is dropped.
    pub fn track_dependency<I, S>(
        &mut self,
        category: Category,
        name: &str,
        hash: &str,
        source_path: &Path,
        required_by: I,
    ) -> anyhow::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let incoming: BTreeSet<String> = required_by.into_iter().map(Into::into).collect();
        let existing = self.dependency(category, name).cloned();

        let mut merged = existing
            .as_ref()
            .map(|d| d.required_by.clone())
            .unwrap_or_default();
        merged.extend(incoming);
        if merged.is_empty() {
            anyhow::bail!(
                "Dependency {}:{} must be required by at least one skill",
                category,
                name
            );
        }

        let installed_at = existing
            .map(|d| d.installed_at)
            .or_else(|| self.installed(category, name).map(|e| e.installed_at))
            .unwrap_or_else(Utc::now);

        self.direct_mut(category).remove(name);
        self.deps_mut(category).insert(
            name.to_string(),
            ResolvedDependency {
                hash: hash.to_string(),
                installed_at,
                source_path: source_path.to_path_buf(),
                required_by: merged,
            },
        );
        Ok(())
    }

    /// Delete an auto-resolved dependency. Returns `true` if it was tracked.
    pub fn remove_dependency(&mut self, category: Category, name: &str) -> bool {
        self.deps_mut(category).remove(name).is_some()
    }

    /// Narrow a dependency's `required_by` to the skills still retained.
    ///
    /// Only called while processing orphans; an intersection that would be
    /// empty leaves the entry untouched. Returns `true` if the set shrank.
    pub fn retain_required_by(
        &mut self,
        category: Category,
        name: &str,
        retained: &BTreeSet<String>,
    ) -> bool {
        let Some(dep) = self.deps_mut(category).get_mut(name) else {
            return false;
        };
        let kept: BTreeSet<String> = dep.required_by.intersection(retained).cloned().collect();
        if kept.is_empty() || kept.len() == dep.required_by.len() {
            return false;
        }
        dep.required_by = kept;
        true
    }

    fn direct_mut(&mut self, category: Category) -> &mut BTreeMap<String, InstalledEntry> {
        self.components.entry(category).or_default()
    }

    fn deps_mut(&mut self, category: Category) -> &mut BTreeMap<String, ResolvedDependency> {
        self.resolved_deps.entry(category).or_default()
    }
}
