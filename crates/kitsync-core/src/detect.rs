//! Component discovery in the shared source tree.
//!
//! Source layout:
//! - `skills/<name>/SKILL.md` (+ optional `kit.json` manifest)
//! - `agents/<name>.md`
//! - `hooks/<name>.json`
//! - `mcp/<name>.json` (endpoint pool, never offered for selection)

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};

use crate::config::TargetLayout;
use crate::merge::{HOOKS_FIELD, MCP_SERVERS_FIELD};
use crate::types::{
    Category, Component, JsonEntry, SKILL_MANIFEST_FILE, SKILL_MARKER_FILE, SkillManifest, Target,
};

pub const SKILLS_SUBDIR: &str = "skills";
pub const AGENTS_SUBDIR: &str = "agents";
pub const HOOKS_SUBDIR: &str = "hooks";
pub const POOL_SUBDIR: &str = "mcp";

const AGENT_EXTENSION: &str = "md";
const JSON_EXTENSION: &str = "json";

/// Selectable components, partitioned by category.
#[derive(Debug, Clone, Default)]
pub struct Universe {
    pub skills: Vec<Component>,
    pub agents: Vec<Component>,
    pub hooks: Vec<Component>,
}

impl Universe {
    pub fn of(&self, category: Category) -> &[Component] {
        match category {
            Category::Skill => &self.skills,
            Category::Agent => &self.agents,
            Category::Hook => &self.hooks,
            Category::Endpoint => &[],
        }
    }

    pub fn find(&self, category: Category, name: &str) -> Option<&Component> {
        self.of(category).iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.skills.iter().chain(&self.agents).chain(&self.hooks)
    }
}

/// Everything found in the source tree.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub universe: Universe,
    /// Endpoint definitions available to skills as dependencies.
    pub pool: Vec<Component>,
}

impl Detection {
    pub fn find(&self, category: Category, name: &str) -> Option<&Component> {
        match category {
            Category::Endpoint => self.pool.iter().find(|c| c.name == name),
            other => self.universe.find(other, name),
        }
    }
}

/// Scans a source root and maps what it finds onto a target layout.
#[derive(Debug, Clone)]
pub struct Detector {
    source_root: PathBuf,
    layout: TargetLayout,
}

impl Detector {
    pub fn new(source_root: PathBuf, layout: TargetLayout) -> Self {
        Self {
            source_root,
            layout,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    /// Scan the selectable universe and the endpoint pool concurrently.
    ///
    /// The two scans touch disjoint subtrees; their results are joined.
    pub fn scan_all(&self) -> anyhow::Result<Detection> {
        let meta = fs::metadata(&self.source_root).with_context(|| {
            format!("Cannot access source root: {}", self.source_root.display())
        })?;
        if !meta.is_dir() {
            anyhow::bail!("Source root is not a directory: {}", self.source_root.display());
        }

        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;

        runtime.block_on(async {
            let universe_scan = {
                let detector = self.clone();
                tokio::task::spawn_blocking(move || detector.scan_universe())
            };
            let pool_scan = {
                let detector = self.clone();
                tokio::task::spawn_blocking(move || detector.scan_pool())
            };

            let (universe, pool) = tokio::join!(universe_scan, pool_scan);
            let universe = universe.context("Universe scan task failed")??;
            let pool = pool.context("Endpoint pool scan task failed")??;

            tracing::debug!(
                skills = universe.skills.len(),
                agents = universe.agents.len(),
                hooks = universe.hooks.len(),
                endpoints = pool.len(),
                "source scan complete"
            );
            Ok(Detection { universe, pool })
        })
    }

    /// Scan skills, agents and hooks.
    pub fn scan_universe(&self) -> anyhow::Result<Universe> {
        Ok(Universe {
            skills: self.scan_skills()?,
            agents: self.scan_agents()?,
            hooks: self.scan_hooks()?,
        })
    }

    /// Scan the endpoint pool.
    pub fn scan_pool(&self) -> anyhow::Result<Vec<Component>> {
        let dir = self.source_root.join(POOL_SUBDIR);
        let mut endpoints = Vec::new();
        for path in list_files_with_extension(&dir, JSON_EXTENSION)? {
            let Some(name) = file_stem(&path) else {
                continue;
            };
            let Some(config) = read_json_object(&path) else {
                continue;
            };
            endpoints.push(Component {
                name,
                category: Category::Endpoint,
                source_path: path,
                target: Target::Document {
                    path: self.layout.mcp_file.clone(),
                    field: MCP_SERVERS_FIELD.to_string(),
                },
                manifest: None,
                entry: Some(JsonEntry {
                    config,
                    required_env: Vec::new(),
                    description: None,
                }),
            });
        }
        sort_by_name(&mut endpoints);
        Ok(endpoints)
    }

    fn scan_skills(&self) -> anyhow::Result<Vec<Component>> {
        let dir = self.source_root.join(SKILLS_SUBDIR);
        let mut skills = Vec::new();
        for entry in read_dir_sorted(&dir)? {
            if !entry.is_dir() || is_hidden(&entry) {
                continue;
            }
            if !entry.join(SKILL_MARKER_FILE).is_file() {
                tracing::debug!(path = %entry.display(), "skipping directory without {}", SKILL_MARKER_FILE);
                continue;
            }
            let Some(name) = file_name(&entry) else {
                continue;
            };
            let manifest = read_manifest(&entry.join(SKILL_MANIFEST_FILE));
            skills.push(Component {
                target: Target::Path(self.layout.skill_target(&name)),
                name,
                category: Category::Skill,
                source_path: entry,
                manifest,
                entry: None,
            });
        }
        Ok(skills)
    }

    fn scan_agents(&self) -> anyhow::Result<Vec<Component>> {
        let dir = self.source_root.join(AGENTS_SUBDIR);
        let mut agents = Vec::new();
        for path in list_files_with_extension(&dir, AGENT_EXTENSION)? {
            let (Some(name), Some(file)) = (file_stem(&path), file_name(&path)) else {
                continue;
            };
            agents.push(Component {
                name,
                category: Category::Agent,
                target: Target::Path(self.layout.agent_target(&file)),
                source_path: path,
                manifest: None,
                entry: None,
            });
        }
        sort_by_name(&mut agents);
        Ok(agents)
    }

    fn scan_hooks(&self) -> anyhow::Result<Vec<Component>> {
        let dir = self.source_root.join(HOOKS_SUBDIR);
        let mut hooks = Vec::new();
        for path in list_files_with_extension(&dir, JSON_EXTENSION)? {
            let Some(name) = file_stem(&path) else {
                continue;
            };
            let Some(entry) = read_json_object(&path).and_then(|raw| parse_hook(&path, raw))
            else {
                continue;
            };
            hooks.push(Component {
                name,
                category: Category::Hook,
                source_path: path,
                target: Target::Document {
                    path: self.layout.settings_file.clone(),
                    field: HOOKS_FIELD.to_string(),
                },
                manifest: None,
                entry: Some(entry),
            });
        }
        sort_by_name(&mut hooks);
        Ok(hooks)
    }
}

/// Parse a hook definition: `{"description"?, "requiredEnv"?, "hooks": {...}}`.
fn parse_hook(path: &Path, mut raw: Map<String, Value>) -> Option<JsonEntry> {
    let config = match raw.remove(HOOKS_FIELD) {
        Some(Value::Object(map)) => map,
        _ => {
            tracing::warn!(path = %path.display(), "hook definition has no '{}' object; skipping", HOOKS_FIELD);
            return None;
        }
    };
    if let Err(reason) = check_handlers(&config) {
        tracing::warn!(path = %path.display(), "{}; skipping hook", reason);
        return None;
    }

    let required_env = match raw.remove("requiredEnv") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => {
            let names: Option<Vec<String>> = items
                .into_iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect();
            match names {
                Some(names) => names,
                None => {
                    tracing::warn!(path = %path.display(), "'requiredEnv' must list strings; skipping");
                    return None;
                }
            }
        }
        Some(_) => {
            tracing::warn!(path = %path.display(), "'requiredEnv' must be an array; skipping");
            return None;
        }
    };

    let description = raw
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(JsonEntry {
        config,
        required_env,
        description,
    })
}

/// Every declared event needs at least one handler, and handlers must be
/// objects so they can carry the ownership marker.
fn check_handlers(config: &Map<String, Value>) -> Result<(), String> {
    if config.is_empty() {
        return Err("hook definition declares no events".to_string());
    }
    for (event, handlers) in config {
        let all_objects = match handlers {
            Value::Object(_) => true,
            Value::Array(items) if items.is_empty() => {
                return Err(format!("event '{}' has no handlers", event));
            }
            Value::Array(items) => items.iter().all(Value::is_object),
            _ => false,
        };
        if !all_objects {
            return Err(format!("handlers for event '{}' must be JSON objects", event));
        }
    }
    Ok(())
}

/// Manifest parse; malformed manifests count as absent.
fn read_manifest(path: &Path) -> Option<SkillManifest> {
    let bytes = fs::read(path).ok()?;
    match serde_json::from_slice::<SkillManifest>(&bytes) {
        Ok(manifest) => Some(manifest),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "ignoring malformed skill manifest");
            None
        }
    }
}

fn read_json_object(path: &Path) -> Option<Map<String, Value>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read definition; skipping");
            return None;
        }
    };
    match serde_json::from_slice::<Value>(&bytes) {
        Ok(Value::Object(map)) => Some(map),
        Ok(_) => {
            tracing::warn!(path = %path.display(), "definition is not a JSON object; skipping");
            None
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "malformed JSON definition; skipping");
            None
        }
    }
}

/// Entries of `dir`, sorted; a missing directory is empty.
fn read_dir_sorted(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(anyhow::Error::new(err)
                .context(format!("Failed to read directory: {}", dir.display())));
        }
    };
    let mut paths = entries
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    paths.sort();
    Ok(paths)
}

fn list_files_with_extension(dir: &Path, extension: &str) -> anyhow::Result<Vec<PathBuf>> {
    Ok(read_dir_sorted(dir)?
        .into_iter()
        .filter(|p| p.is_file() && !is_hidden(p))
        .filter(|p| p.extension().is_some_and(|ext| ext == extension))
        .collect())
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().to_string())
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem().map(|n| n.to_string_lossy().to_string())
}

fn sort_by_name(components: &mut [Component]) {
    components.sort_by(|a, b| a.name.cmp(&b.name));
}
