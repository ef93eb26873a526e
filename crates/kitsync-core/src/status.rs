//! Install status of source components in a target project.
//!
//! Content trees (skills, agents) compare a fresh source hash with a fresh
//! target hash; the ledger only explains *why* they differ. Hooks are looked
//! up by owner marker in the settings document and compared against the
//! ledger hash. Endpoints compare their registry entry with the pool config.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::fs::hash_path;
use crate::ledger::Ledger;
use crate::merge::{EndpointRegistry, HookRegistry, hash_json_map};
use crate::types::{Category, Component, ComponentKind, SKILL_MANIFEST_FILE};

/// Install state of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentStatus {
    /// Not present in the project.
    Available,
    /// Present and identical to the source.
    Installed,
    /// Present but different from the source.
    Outdated,
    /// A required environment variable is unset. Takes precedence over the
    /// install state.
    MissingEnvironment,
}

impl ComponentStatus {
    pub fn label(self) -> &'static str {
        match self {
            ComponentStatus::Available => "available",
            ComponentStatus::Installed => "installed",
            ComponentStatus::Outdated => "outdated",
            ComponentStatus::MissingEnvironment => "missing-env",
        }
    }
}

impl std::fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Which side moved since the last recorded install.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftReason {
    /// Target still matches the ledger; the source changed.
    SourceChanged,
    /// Source still matches the ledger; the target was edited.
    LocallyModified,
    /// Neither side matches the ledger.
    Diverged,
}

/// How the ledger tracks a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Tracking {
    Untracked,
    Direct,
    Dependency {
        #[serde(rename = "requiredBy")]
        required_by: BTreeSet<String>,
    },
}

/// Status of one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub name: String,
    pub category: Category,
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drift: Option<DriftReason>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_env: Vec<String>,
    pub tracking: Tracking,
    pub source_path: PathBuf,
    /// Why the content could not be compared, when it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Looks up whether an environment variable is set.
pub type EnvLookup = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// The process environment as an [`EnvLookup`].
pub fn process_env() -> EnvLookup {
    Box::new(|name| std::env::var_os(name).is_some())
}

/// Required variables of a hook that `is_set` reports as absent.
pub fn missing_env(component: &Component, is_set: &dyn Fn(&str) -> bool) -> Vec<String> {
    if component.category != Category::Hook {
        return Vec::new();
    }
    component
        .required_env()
        .iter()
        .filter(|name| !is_set(name.as_str()))
        .cloned()
        .collect()
}

/// Hash of a component's source: the content hash for content trees, the
/// canonical config hash for json entries. `None` if the source is gone.
pub fn source_hash(component: &Component) -> anyhow::Result<Option<String>> {
    match component.kind() {
        ComponentKind::ContentTree => {
            hash_path(&component.source_path, manifest_exclusion(component.category))
        }
        ComponentKind::JsonEntry => Ok(component
            .entry
            .as_ref()
            .map(|entry| hash_json_map(&entry.config))),
    }
}

/// Hash of an installed content tree. `None` when nothing is at the target.
pub fn target_hash(component: &Component) -> anyhow::Result<Option<String>> {
    match component.target_path() {
        Some(target) => hash_path(target, manifest_exclusion(component.category)),
        None => Ok(None),
    }
}

pub(crate) fn manifest_exclusion(category: Category) -> Option<&'static str> {
    (category == Category::Skill).then_some(SKILL_MANIFEST_FILE)
}

/// Classifies components against one project's state.
pub struct StatusResolver<'a> {
    ledger: &'a Ledger,
    hooks: &'a HookRegistry,
    endpoints: &'a EndpointRegistry,
    env: EnvLookup,
}

impl<'a> StatusResolver<'a> {
    /// Resolver reading the process environment.
    pub fn new(ledger: &'a Ledger, hooks: &'a HookRegistry, endpoints: &'a EndpointRegistry) -> Self {
        Self {
            ledger,
            hooks,
            endpoints,
            env: process_env(),
        }
    }

    /// Replace the environment lookup.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.env = Box::new(lookup);
        self
    }

    /// Required variables of a hook that are not set.
    pub fn missing_env(&self, component: &Component) -> Vec<String> {
        missing_env(component, self.env.as_ref())
    }

    /// Classify one component.
    ///
    /// A target or source that cannot be hashed does not fail the call: the
    /// report comes back `Outdated` with the reason in `error`.
    pub fn resolve(&self, component: &Component) -> StatusReport {
        let missing_env = self.missing_env(component);
        let mut error = None;
        let (status, drift) = if !missing_env.is_empty() {
            (ComponentStatus::MissingEnvironment, None)
        } else {
            match component.category {
                Category::Skill | Category::Agent => match self.content_status(component) {
                    Ok(status) => status,
                    Err(err) => {
                        let message = format!("{err:#}");
                        tracing::warn!(
                            category = %component.category,
                            name = %component.name,
                            error = %message,
                            "cannot compare component content"
                        );
                        error = Some(message);
                        (ComponentStatus::Outdated, None)
                    }
                },
                Category::Hook => self.hook_status(component),
                Category::Endpoint => self.endpoint_status(component),
            }
        };

        tracing::debug!(
            category = %component.category,
            name = %component.name,
            status = %status,
            "resolved status"
        );

        StatusReport {
            name: component.name.clone(),
            category: component.category,
            status,
            drift,
            missing_env,
            tracking: self.tracking(component),
            source_path: component.source_path.clone(),
            error,
        }
    }

    pub fn resolve_all<'c, I>(&self, components: I) -> Vec<StatusReport>
    where
        I: IntoIterator<Item = &'c Component>,
    {
        components.into_iter().map(|c| self.resolve(c)).collect()
    }

    fn tracking(&self, component: &Component) -> Tracking {
        if self.ledger.installed(component.category, &component.name).is_some() {
            Tracking::Direct
        } else if let Some(dep) = self.ledger.dependency(component.category, &component.name) {
            Tracking::Dependency {
                required_by: dep.required_by.clone(),
            }
        } else {
            Tracking::Untracked
        }
    }

    fn content_status(
        &self,
        component: &Component,
    ) -> anyhow::Result<(ComponentStatus, Option<DriftReason>)> {
        let Some(target) = target_hash(component)? else {
            return Ok((ComponentStatus::Available, None));
        };
        let Some(source) = source_hash(component)? else {
            // Source vanished between scan and status; nothing to compare.
            return Ok((ComponentStatus::Outdated, None));
        };
        if source == target {
            return Ok((ComponentStatus::Installed, None));
        }
        let recorded = self.ledger.tracked_hash(component.category, &component.name);
        Ok((ComponentStatus::Outdated, drift_reason(recorded, &source, &target)))
    }

    fn hook_status(&self, component: &Component) -> (ComponentStatus, Option<DriftReason>) {
        if !self.hooks.contains(&component.name) {
            return (ComponentStatus::Available, None);
        }
        let declared = component
            .entry
            .as_ref()
            .map(|entry| hash_json_map(&entry.config));
        let recorded = self.ledger.tracked_hash(component.category, &component.name);
        match (recorded, declared) {
            (Some(recorded), Some(declared)) if recorded == declared => {
                (ComponentStatus::Installed, None)
            }
            (Some(_), _) => (ComponentStatus::Outdated, Some(DriftReason::SourceChanged)),
            (None, _) => (ComponentStatus::Outdated, None),
        }
    }

    fn endpoint_status(&self, component: &Component) -> (ComponentStatus, Option<DriftReason>) {
        let Some(present) = self.endpoints.hash_of(&component.name) else {
            return (ComponentStatus::Available, None);
        };
        let Some(declared) = component
            .entry
            .as_ref()
            .map(|entry| hash_json_map(&entry.config))
        else {
            return (ComponentStatus::Outdated, None);
        };
        if present == declared {
            return (ComponentStatus::Installed, None);
        }
        let recorded = self.ledger.tracked_hash(component.category, &component.name);
        (
            ComponentStatus::Outdated,
            drift_reason(recorded, &declared, &present),
        )
    }
}

fn drift_reason(recorded: Option<&str>, source: &str, target: &str) -> Option<DriftReason> {
    let recorded = recorded?;
    Some(if recorded == target {
        DriftReason::SourceChanged
    } else if recorded == source {
        DriftReason::LocallyModified
    } else {
        DriftReason::Diverged
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetLayout;
    use crate::types::{JsonEntry, Target};
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
        layout: TargetLayout,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let layout = TargetLayout::new(&root.join("project"));
        fs::create_dir_all(&layout.project_root).unwrap();
        Fixture {
            _tmp: tmp,
            root,
            layout,
        }
    }

    fn agent(fx: &Fixture, body: &str) -> Component {
        let src = fx.root.join("src/agents/reviewer.md");
        fs::create_dir_all(src.parent().unwrap()).unwrap();
        fs::write(&src, body).unwrap();
        Component {
            name: "reviewer".into(),
            category: Category::Agent,
            source_path: src,
            target: Target::Path(fx.layout.agent_target("reviewer.md")),
            manifest: None,
            entry: None,
        }
    }

    fn hook(fx: &Fixture, command: &str, required_env: &[&str]) -> Component {
        let config = json!({"PreToolUse": {"command": command}});
        Component {
            name: "fmt".into(),
            category: Category::Hook,
            source_path: fx.root.join("src/hooks/fmt.json"),
            target: Target::Document {
                path: fx.layout.settings_file.clone(),
                field: "hooks".into(),
            },
            manifest: None,
            entry: Some(JsonEntry {
                config: config.as_object().cloned().unwrap(),
                required_env: required_env.iter().map(|s| s.to_string()).collect(),
                description: None,
            }),
        }
    }

    fn write_target(path: &Path, body: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn registries(fx: &Fixture) -> (HookRegistry, EndpointRegistry) {
        (
            HookRegistry::load(&fx.layout.settings_file).unwrap(),
            EndpointRegistry::load(&fx.layout.mcp_file).unwrap(),
        )
    }

    #[test]
    fn content_status_follows_hashes() {
        let fx = fixture();
        let component = agent(&fx, "v1");
        let ledger = Ledger::new();
        let (hooks, endpoints) = registries(&fx);
        let resolver = StatusResolver::new(&ledger, &hooks, &endpoints);

        assert_eq!(
            resolver.resolve(&component).status,
            ComponentStatus::Available
        );

        write_target(component.target_path().unwrap(), "v1");
        assert_eq!(
            resolver.resolve(&component).status,
            ComponentStatus::Installed
        );

        write_target(component.target_path().unwrap(), "edited");
        let report = resolver.resolve(&component);
        assert_eq!(report.status, ComponentStatus::Outdated);
        assert_eq!(report.drift, None);
        assert_eq!(report.tracking, Tracking::Untracked);
    }

    #[test]
    fn ledger_explains_drift() {
        let fx = fixture();
        let component = agent(&fx, "v1");
        let installed_hash = source_hash(&component).unwrap().unwrap();
        write_target(component.target_path().unwrap(), "v1");

        let mut ledger = Ledger::new();
        ledger.track_install(Category::Agent, "reviewer", &installed_hash, &component.source_path);
        let (hooks, endpoints) = registries(&fx);

        fs::write(&component.source_path, "v2").unwrap();
        let resolver = StatusResolver::new(&ledger, &hooks, &endpoints);
        let report = resolver.resolve(&component);
        assert_eq!(report.drift, Some(DriftReason::SourceChanged));
        assert_eq!(report.tracking, Tracking::Direct);

        fs::write(&component.source_path, "v1").unwrap();
        write_target(component.target_path().unwrap(), "local edit");
        let report = resolver.resolve(&component);
        assert_eq!(report.drift, Some(DriftReason::LocallyModified));

        fs::write(&component.source_path, "v3").unwrap();
        let report = resolver.resolve(&component);
        assert_eq!(report.drift, Some(DriftReason::Diverged));
    }

    #[test]
    fn missing_env_takes_precedence() {
        let fx = fixture();
        let component = hook(&fx, "fmt", &["KITSYNC_TEST_TOKEN"]);
        let ledger = Ledger::new();
        let (hooks, endpoints) = registries(&fx);

        let resolver = StatusResolver::new(&ledger, &hooks, &endpoints)
            .with_env_lookup(|_| false);
        let report = resolver.resolve(&component);
        assert_eq!(report.status, ComponentStatus::MissingEnvironment);
        assert_eq!(report.missing_env, vec!["KITSYNC_TEST_TOKEN".to_string()]);

        let resolver = StatusResolver::new(&ledger, &hooks, &endpoints)
            .with_env_lookup(|name| name == "KITSYNC_TEST_TOKEN");
        assert_eq!(
            resolver.resolve(&component).status,
            ComponentStatus::Available
        );
    }

    #[test]
    fn hook_status_uses_marker_and_ledger_hash() {
        let fx = fixture();
        let component = hook(&fx, "a", &[]);
        let config = &component.entry.as_ref().unwrap().config;

        let (mut hooks, endpoints) = registries(&fx);
        hooks.merge("fmt", config);

        let mut ledger = Ledger::new();
        ledger.track_install(
            Category::Hook,
            "fmt",
            &hash_json_map(config),
            &component.source_path,
        );
        let resolver = StatusResolver::new(&ledger, &hooks, &endpoints);
        assert_eq!(
            resolver.resolve(&component).status,
            ComponentStatus::Installed
        );

        let changed = hook(&fx, "b", &[]);
        let report = resolver.resolve(&changed);
        assert_eq!(report.status, ComponentStatus::Outdated);
        assert_eq!(report.drift, Some(DriftReason::SourceChanged));
    }

    #[test]
    fn endpoint_status_compares_registry_entry() {
        let fx = fixture();
        let config = json!({"command": "gh-mcp"}).as_object().cloned().unwrap();
        let component = Component {
            name: "github".into(),
            category: Category::Endpoint,
            source_path: fx.root.join("src/mcp/github.json"),
            target: Target::Document {
                path: fx.layout.mcp_file.clone(),
                field: "mcpServers".into(),
            },
            manifest: None,
            entry: Some(JsonEntry {
                config: config.clone(),
                required_env: Vec::new(),
                description: None,
            }),
        };

        let ledger = Ledger::new();
        let (hooks, mut endpoints) = registries(&fx);
        {
            let resolver = StatusResolver::new(&ledger, &hooks, &endpoints);
            assert_eq!(
                resolver.resolve(&component).status,
                ComponentStatus::Available
            );
        }

        endpoints.upsert("github", &config);
        let resolver = StatusResolver::new(&ledger, &hooks, &endpoints);
        assert_eq!(
            resolver.resolve(&component).status,
            ComponentStatus::Installed
        );
    }
}
