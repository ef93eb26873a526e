//! kitsync - skill, agent, hook and MCP server sync for projects
//!
//! Usage:
//!   kitsync status                  # Show component status
//!   kitsync list                    # List what the source tree offers
//!   kitsync sync --add skill:pdf    # Change the selection and sync
//!   kitsync sync -i                 # Pick the selection interactively

mod interactive;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kitsync_core::detect::Detection;
use kitsync_core::ledger::LoadedLedger;
use kitsync_core::prelude::*;

use crate::interactive::{PromptConfirmer, SelectionFlow};

#[derive(Parser)]
#[command(name = "kitsync")]
#[command(about = "Sync skills, agents, hooks and MCP servers into projects", long_about = None)]
struct Cli {
    /// Source tree to sync from (overrides `source` in kitsync.toml)
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Project to sync into (defaults to the current directory)
    #[arg(long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the status of every component in the source tree
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List components offered by the source tree
    #[command(alias = "ls")]
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Apply the selection to the project
    Sync(SyncArgs),
}

#[derive(Args)]
struct SyncArgs {
    /// Select a component (category:name, e.g. skill:pdf)
    #[arg(long = "add", value_name = "CATEGORY:NAME")]
    add: Vec<String>,

    /// Deselect a component (category:name)
    #[arg(long = "remove", value_name = "CATEGORY:NAME")]
    remove: Vec<String>,

    /// Pick the selection with prompts
    #[arg(short, long)]
    interactive: bool,

    /// Answer yes to every confirmation
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Table,
    Json,
    /// Only report problems (non-zero exit if any)
    Quiet,
}

fn main() -> Result<()> {
    // Logs go to stderr so JSON output stays parseable
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kitsync=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let project = match cli.project {
        Some(project) => project,
        None => std::env::current_dir().context("Failed to read the current directory")?,
    };
    let ctx = AppContext::open(&project, cli.source)?;

    match cli.command {
        Commands::Status { format } => run_status(&ctx, format),
        Commands::List { format } => run_list(&ctx, format),
        Commands::Sync(args) => run_sync(&ctx, args),
    }
}

// =============================================================================
// status
// =============================================================================

fn collect_status(ctx: &AppContext, detection: &Detection) -> Result<(LoadedLedger, Vec<StatusReport>)> {
    let loaded = ctx.ledger_store().load()?;
    let hooks = ctx.hook_registry()?;
    let endpoints = ctx.endpoint_registry()?;
    let resolver = StatusResolver::new(&loaded.ledger, &hooks, &endpoints);

    // Pool endpoints only show up once a dependency placed them.
    let tracked_endpoints = detection
        .pool
        .iter()
        .filter(|c| loaded.ledger.is_tracked(Category::Endpoint, &c.name));
    let reports = resolver.resolve_all(detection.universe.iter().chain(tracked_endpoints));

    Ok((loaded, reports))
}

fn run_status(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let detection = ctx.detect()?;
    let (loaded, reports) = collect_status(ctx, &detection)?;

    match format {
        OutputFormat::Table => print_status_table(ctx, &loaded, &reports),
        OutputFormat::Json => {
            let output = serde_json::json!({
                "schema_version": 1,
                "project_root": ctx.project_root(),
                "source_root": ctx.source_root(),
                "ledger": origin_label(loaded.origin),
                "components": reports,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Quiet => {
            let issues: Vec<&StatusReport> = reports
                .iter()
                .filter(|r| {
                    r.error.is_some()
                        || matches!(
                            r.status,
                            ComponentStatus::Outdated | ComponentStatus::MissingEnvironment
                        )
                })
                .collect();
            if !issues.is_empty() {
                for report in &issues {
                    println!("{}:{} {}", report.category, report.name, report.status);
                }
                std::process::exit(1);
            }
        }
    }
    Ok(())
}

fn print_status_table(ctx: &AppContext, loaded: &LoadedLedger, reports: &[StatusReport]) {
    println!("Project: {}", ctx.project_root().display());
    println!("Source: {}", ctx.source_root().display());
    if loaded.origin == LedgerOrigin::Recovered {
        println!("Ledger: unreadable, treated as empty (it will be rewritten on the next sync)");
    }
    println!();

    if reports.is_empty() {
        println!("No components found in the source tree.");
        return;
    }

    for category in Category::ALL {
        let rows: Vec<&StatusReport> = reports.iter().filter(|r| r.category == category).collect();
        if rows.is_empty() {
            continue;
        }
        println!("{} ({}):", category_title(category), rows.len());
        println!("  {:<20} {:<12} {:<11} Notes", "Name", "Status", "Tracking");
        println!("  {}", "-".repeat(70));
        for report in rows {
            println!(
                "  {:<20} {:<12} {:<11} {}",
                truncate(&report.name, 20),
                report.status.label(),
                tracking_label(&report.tracking),
                status_notes(report)
            );
        }
        println!();
    }

    let attention = reports
        .iter()
        .filter(|r| r.status == ComponentStatus::Outdated)
        .count();
    if attention > 0 {
        println!(
            "Summary: {} components, {} outdated (run 'kitsync sync' to update)",
            reports.len(),
            attention
        );
    } else {
        println!("Summary: {} components", reports.len());
    }
}

fn status_notes(report: &StatusReport) -> String {
    let mut notes = Vec::new();
    if let Some(error) = &report.error {
        notes.push(format!("error: {}", error));
    }
    if let Some(drift) = report.drift {
        notes.push(
            match drift {
                DriftReason::SourceChanged => "source changed",
                DriftReason::LocallyModified => "edited in project",
                DriftReason::Diverged => "source and project both changed",
            }
            .to_string(),
        );
    }
    if !report.missing_env.is_empty() {
        notes.push(format!("needs {}", report.missing_env.join(", ")));
    }
    if let Tracking::Dependency { required_by } = &report.tracking {
        let requirers: Vec<&str> = required_by.iter().map(String::as_str).collect();
        notes.push(format!("required by {}", requirers.join(", ")));
    }
    notes.join("; ")
}

// =============================================================================
// list
// =============================================================================

fn run_list(ctx: &AppContext, format: OutputFormat) -> Result<()> {
    let detection = ctx.detect()?;

    match format {
        OutputFormat::Table | OutputFormat::Quiet => {
            for category in [Category::Skill, Category::Agent, Category::Hook] {
                let components = detection.universe.of(category);
                println!("{} ({}):", category_title(category), components.len());
                for component in components {
                    print_list_row(component);
                }
                println!();
            }
            println!("MCP servers ({}, installed only as dependencies):", detection.pool.len());
            for component in &detection.pool {
                print_list_row(component);
            }
        }
        OutputFormat::Json => {
            let entry = |c: &Component, selectable: bool| {
                serde_json::json!({
                    "category": c.category,
                    "name": c.name,
                    "description": c.description(),
                    "source_path": c.source_path,
                    "requires_env": c.required_env(),
                    "selectable": selectable,
                })
            };
            let components: Vec<serde_json::Value> = detection
                .universe
                .iter()
                .map(|c| entry(c, true))
                .chain(detection.pool.iter().map(|c| entry(c, false)))
                .collect();
            let output = serde_json::json!({
                "schema_version": 1,
                "source_root": ctx.source_root(),
                "components": components,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_list_row(component: &Component) {
    let description = component.description().unwrap_or("-");
    let env = component.required_env();
    if env.is_empty() {
        println!("  {:<20} {}", truncate(&component.name, 20), truncate(description, 56));
    } else {
        println!(
            "  {:<20} {} (needs {})",
            truncate(&component.name, 20),
            truncate(description, 40),
            env.join(", ")
        );
    }
}

// =============================================================================
// sync
// =============================================================================

fn run_sync(ctx: &AppContext, args: SyncArgs) -> Result<()> {
    let detection = ctx.detect()?;
    let loaded = ctx.ledger_store().load()?;
    let mut selection = Selection::from_ledger(&loaded.ledger);

    for raw in &args.add {
        let reference: ComponentRef = raw.parse()?;
        if detection.universe.find(reference.category, &reference.name).is_none() {
            anyhow::bail!("{} is not in the source tree", reference);
        }
        selection.insert(&reference)?;
    }
    for raw in &args.remove {
        let reference: ComponentRef = raw.parse()?;
        if !selection.remove(&reference)? {
            println!("{} was not selected", reference);
        }
    }

    if args.interactive {
        let (_, reports) = collect_status(ctx, &detection)?;
        let mut flow = SelectionFlow::new(&detection, &reports, selection, args.yes);
        match flow.collect()? {
            Some(picked) => selection = picked,
            None => {
                println!("Cancelled; nothing was changed.");
                return Ok(());
            }
        }
    }

    let mut confirmer: Box<dyn Confirmer> = if args.yes {
        Box::new(AssumeYes)
    } else if console::Term::stdout().is_term() {
        Box::new(PromptConfirmer::default())
    } else {
        tracing::warn!("not a terminal; declining prompts (pass --yes to accept them)");
        Box::new(AssumeNo)
    };

    let engine = ctx.sync_engine(&detection);
    match engine.apply(&selection, confirmer.as_mut())? {
        SyncOutcome::Aborted(resolution) => {
            eprintln!("Sync aborted, nothing was changed:");
            for error in &resolution.errors {
                eprintln!("  {}", error);
            }
            anyhow::bail!("dependency resolution failed");
        }
        SyncOutcome::Applied(report) => {
            print_sync_report(&report);
            if report.has_failures() {
                anyhow::bail!("some components could not be synced");
            }
        }
    }
    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    if report.ledger_origin == LedgerOrigin::Recovered {
        println!("Note: the existing ledger could not be read and was rebuilt.");
    }
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }

    let changed: Vec<_> = report
        .changes
        .iter()
        .filter(|c| c.outcome != InstallOutcome::Unchanged)
        .collect();
    if changed.is_empty() && report.kept_orphans.is_empty() {
        println!("Everything up to date.");
        return;
    }

    for change in changed {
        let marker = if change.dependency { " (dependency)" } else { "" };
        println!("  {:<30} {}{}", change.component.to_string(), change.outcome, marker);
    }
    for orphan in &report.kept_orphans {
        println!("  {:<30} kept (no longer required)", orphan.component.to_string());
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn category_title(category: Category) -> &'static str {
    match category {
        Category::Skill => "Skills",
        Category::Agent => "Agents",
        Category::Hook => "Hooks",
        Category::Endpoint => "MCP servers",
    }
}

fn tracking_label(tracking: &Tracking) -> &'static str {
    match tracking {
        Tracking::Untracked => "-",
        Tracking::Direct => "direct",
        Tracking::Dependency { .. } => "dependency",
    }
}

fn origin_label(origin: LedgerOrigin) -> &'static str {
    match origin {
        LedgerOrigin::Fresh => "fresh",
        LedgerOrigin::Loaded => "loaded",
        LedgerOrigin::Recovered => "recovered",
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn truncate_keeps_short_names() {
        assert_eq!(truncate("pdf", 20), "pdf");
        assert_eq!(truncate("a-very-long-skill-name", 10), "a-very-...");
    }

    #[test]
    fn notes_join_drift_env_and_requirers() {
        let report = StatusReport {
            name: "github".into(),
            category: Category::Endpoint,
            status: ComponentStatus::Outdated,
            drift: Some(DriftReason::SourceChanged),
            missing_env: vec![],
            tracking: Tracking::Dependency {
                required_by: BTreeSet::from(["pdf".to_string(), "review".to_string()]),
            },
            source_path: PathBuf::from("/kit/mcp/github.json"),
            error: None,
        };
        assert_eq!(
            status_notes(&report),
            "source changed; required by pdf, review"
        );
    }

    #[test]
    fn cli_parses_sync_flags() {
        let cli = Cli::try_parse_from([
            "kitsync", "--source", "../kit", "sync", "--add", "skill:pdf", "--remove", "hook:fmt",
            "-y",
        ])
        .unwrap();
        assert_eq!(cli.source, Some(PathBuf::from("../kit")));
        let Commands::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert_eq!(args.add, vec!["skill:pdf".to_string()]);
        assert_eq!(args.remove, vec!["hook:fmt".to_string()]);
        assert!(args.yes);
        assert!(!args.interactive);
    }
}
