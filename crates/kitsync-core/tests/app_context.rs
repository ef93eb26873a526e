use std::fs;

use kitsync_core::config::CONFIG_FILE_NAME;
use kitsync_core::context::AppContext;
use kitsync_core::error::SyncError;
use kitsync_core::selection::Selection;
use kitsync_core::sync::{AssumeYes, SyncOutcome};
use kitsync_core::types::Category;
use tempfile::TempDir;

fn kit_with_agent(root: &std::path::Path) {
    let agents = root.join("kit/agents");
    fs::create_dir_all(&agents).unwrap();
    fs::write(agents.join("reviewer.md"), "You review code.").unwrap();
}

#[test]
fn app_context_reads_paths_from_project_config() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    fs::create_dir_all(&project).unwrap();
    kit_with_agent(temp.path());
    fs::write(
        project.join(CONFIG_FILE_NAME),
        "source = \"../kit\"\n\n[paths]\nagents = \"ai/agents\"\n",
    )
    .unwrap();

    let ctx = AppContext::with_global_config_dir(&project, None, None).unwrap();
    let detection = ctx.detect().unwrap();

    let mut selection = Selection::new();
    selection.agents.insert("reviewer".into());
    let outcome = ctx
        .sync_engine(&detection)
        .apply(&selection, &mut AssumeYes)
        .unwrap();

    assert!(matches!(outcome, SyncOutcome::Applied(_)));
    assert!(ctx.project_root().join("ai/agents/reviewer.md").is_file());
    assert!(
        ctx.ledger_store()
            .load()
            .unwrap()
            .ledger
            .installed(Category::Agent, "reviewer")
            .is_some()
    );
}

#[test]
fn global_config_supplies_the_source() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("project");
    let global = temp.path().join("config");
    fs::create_dir_all(&project).unwrap();
    fs::create_dir_all(&global).unwrap();
    kit_with_agent(temp.path());
    let kit = temp.path().join("kit");
    fs::write(
        global.join(CONFIG_FILE_NAME),
        format!("source = {:?}\n", kit.display().to_string()),
    )
    .unwrap();

    let ctx = AppContext::with_global_config_dir(&project, None, Some(global)).unwrap();

    assert_eq!(ctx.source_root(), kit);
    assert_eq!(ctx.detect().unwrap().universe.agents.len(), 1);
}

#[test]
fn unusable_project_root_fails_before_anything_else() {
    let temp = TempDir::new().unwrap();

    let err = AppContext::with_global_config_dir(
        &temp.path().join("missing"),
        Some(temp.path().to_path_buf()),
        None,
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::WorkspaceUnavailable { .. })
    ));
}

#[test]
fn relative_source_override_follows_the_working_directory() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("app");
    let shell = temp.path().join("shell");
    fs::create_dir_all(&project).unwrap();
    fs::create_dir_all(&shell).unwrap();
    kit_with_agent(&shell);
    // A decoy at the project-relative location must not be picked up
    fs::create_dir_all(project.join("kit/agents")).unwrap();

    let ctx = AppContext::from_working_dir(&shell, &project, Some("./kit".into()), None).unwrap();

    assert_eq!(ctx.source_root(), shell.join("./kit"));
    assert_eq!(ctx.detect().unwrap().universe.agents.len(), 1);
}

#[test]
fn relative_config_source_follows_the_project() {
    let temp = TempDir::new().unwrap();
    let project = temp.path().join("app");
    let shell = temp.path().join("shell");
    fs::create_dir_all(&shell).unwrap();
    kit_with_agent(&project);
    fs::write(project.join(CONFIG_FILE_NAME), "source = \"kit\"\n").unwrap();

    let ctx = AppContext::from_working_dir(&shell, &project, None, None).unwrap();

    assert_eq!(ctx.source_root(), fs::canonicalize(&project).unwrap().join("kit"));
    assert_eq!(ctx.detect().unwrap().universe.agents.len(), 1);
}
