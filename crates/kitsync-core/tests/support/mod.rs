#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use kitsync_core::config::TargetLayout;
use kitsync_core::detect::{Detection, Detector};
use kitsync_core::ledger::{Ledger, LedgerStore};
use kitsync_core::selection::Selection;
use kitsync_core::sync::{Confirmer, SyncEngine, SyncOutcome, SyncReport};
use serde_json::Value;
use tempfile::TempDir;

/// A source tree and an empty project side by side in a temp dir.
pub struct Fixture {
    _temp: TempDir,
    pub source: PathBuf,
    pub project: PathBuf,
    pub layout: TargetLayout,
}

impl Fixture {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("kit");
        let project = temp.path().join("project");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&project).unwrap();
        let layout = TargetLayout::new(&project);
        Self {
            _temp: temp,
            source,
            project,
            layout,
        }
    }

    /// Write `skills/<name>/SKILL.md`, plus `kit.json` when a manifest is given.
    pub fn skill(&self, name: &str, manifest: Option<Value>) -> PathBuf {
        let dir = self.source.join("skills").join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("SKILL.md"), format!("# {name}\n")).unwrap();
        if let Some(manifest) = manifest {
            fs::write(dir.join("kit.json"), manifest.to_string()).unwrap();
        }
        dir
    }

    pub fn agent(&self, name: &str, body: &str) -> PathBuf {
        self.write_source(&format!("agents/{name}.md"), body)
    }

    pub fn hook(&self, name: &str, definition: Value) -> PathBuf {
        self.write_source(&format!("hooks/{name}.json"), &definition.to_string())
    }

    pub fn endpoint(&self, name: &str, config: Value) -> PathBuf {
        self.write_source(&format!("mcp/{name}.json"), &config.to_string())
    }

    pub fn write_source(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.source.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        path
    }

    pub fn detect(&self) -> Detection {
        Detector::new(self.source.clone(), self.layout.clone())
            .scan_all()
            .unwrap()
    }

    /// Run a sync that is expected to apply.
    pub fn sync(&self, selection: &Selection, confirmer: &mut dyn Confirmer) -> SyncReport {
        match self.apply(selection, confirmer) {
            SyncOutcome::Applied(report) => report,
            SyncOutcome::Aborted(resolution) => {
                panic!("sync aborted: {:?}", resolution.errors)
            }
        }
    }

    pub fn apply(&self, selection: &Selection, confirmer: &mut dyn Confirmer) -> SyncOutcome {
        let detection = self.detect();
        SyncEngine::new(&detection, &self.layout)
            .apply(selection, confirmer)
            .unwrap()
    }

    pub fn ledger(&self) -> Ledger {
        LedgerStore::new(self.layout.ledger_file.clone())
            .load()
            .unwrap()
            .ledger
    }

    pub fn settings(&self) -> Value {
        read_json(&self.layout.settings_file)
    }

    pub fn mcp(&self) -> Value {
        read_json(&self.layout.mcp_file)
    }
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

pub fn select(skills: &[&str], agents: &[&str], hooks: &[&str]) -> Selection {
    let mut selection = Selection::new();
    selection.skills = skills.iter().map(|s| s.to_string()).collect();
    selection.agents = agents.iter().map(|s| s.to_string()).collect();
    selection.hooks = hooks.iter().map(|s| s.to_string()).collect();
    selection
}
