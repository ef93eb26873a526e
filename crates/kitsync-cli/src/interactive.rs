//! Interactive selection and confirmation prompts for `sync -i`.
//!
//! Uses dialoguer for terminal UI prompts.

use std::collections::BTreeSet;
use std::io::{self, Write};

use anyhow::Result;
use console::style;
use dialoguer::{Confirm, MultiSelect, theme::ColorfulTheme};

use kitsync_core::detect::Detection;
use kitsync_core::orphans::OrphanCandidate;
use kitsync_core::selection::Selection;
use kitsync_core::status::{ComponentStatus, StatusReport};
use kitsync_core::sync::Confirmer;
use kitsync_core::types::{Category, Component, ComponentRef};

const SELECTABLE: [Category; 3] = [Category::Skill, Category::Agent, Category::Hook];

/// Interactive flow for picking the direct selection.
pub struct SelectionFlow<'a, W: Write = io::Stdout> {
    detection: &'a Detection,
    statuses: &'a [StatusReport],
    current: Selection,
    /// Skip the final confirmation
    yes: bool,
    /// Output writer (for testing)
    writer: W,
    theme: ColorfulTheme,
}

impl<'a> SelectionFlow<'a, io::Stdout> {
    pub fn new(
        detection: &'a Detection,
        statuses: &'a [StatusReport],
        current: Selection,
        yes: bool,
    ) -> Self {
        Self {
            detection,
            statuses,
            current,
            yes,
            writer: io::stdout(),
            theme: ColorfulTheme::default(),
        }
    }
}

impl<'a, W: Write> SelectionFlow<'a, W> {
    #[cfg(test)]
    pub fn with_writer(
        detection: &'a Detection,
        statuses: &'a [StatusReport],
        current: Selection,
        yes: bool,
        writer: W,
    ) -> Self {
        Self {
            detection,
            statuses,
            current,
            yes,
            writer,
            theme: ColorfulTheme::default(),
        }
    }

    /// Prompt for each category, then confirm the resulting changes.
    ///
    /// Returns `None` when the user cancels; nothing has been changed then.
    pub fn collect(&mut self) -> Result<Option<Selection>> {
        writeln!(self.writer)?;
        writeln!(self.writer, "{}", style("  kitsync").bold().cyan())?;
        writeln!(self.writer)?;

        let mut next = Selection::new();
        for category in SELECTABLE {
            let components = self.detection.universe.of(category);

            // Selected entries whose source is gone stay selected; dropping
            // them here would uninstall without asking.
            if let Some(names) = self.current.names(category) {
                for name in names {
                    if self.detection.universe.find(category, name).is_none() {
                        next.insert(&ComponentRef::new(category, name.clone()))?;
                    }
                }
            }

            if components.is_empty() {
                continue;
            }

            let items: Vec<String> = components
                .iter()
                .map(|c| item_label(c, self.status_of(c)))
                .collect();
            let defaults: Vec<bool> = components
                .iter()
                .map(|c| self.current.contains(category, &c.name))
                .collect();

            let picked = MultiSelect::with_theme(&self.theme)
                .with_prompt(format!(
                    "{} (space to toggle, enter to confirm)",
                    category_heading(category)
                ))
                .items(&items)
                .defaults(&defaults)
                .interact_opt()?;
            let Some(picked) = picked else {
                return Ok(None);
            };
            for index in picked {
                next.insert(&ComponentRef::new(category, components[index].name.clone()))?;
            }
        }

        if self.show_summary_and_confirm(&next)? {
            Ok(Some(next))
        } else {
            Ok(None)
        }
    }

    fn status_of(&self, component: &Component) -> Option<ComponentStatus> {
        self.statuses
            .iter()
            .find(|r| r.category == component.category && r.name == component.name)
            .map(|r| r.status)
    }

    fn show_summary_and_confirm(&mut self, next: &Selection) -> Result<bool> {
        let (added, removed) = selection_diff(&self.current, next);

        writeln!(self.writer)?;
        writeln!(self.writer, "{}", style("  Summary").bold())?;
        writeln!(self.writer, "  ───────────────────────────")?;
        if added.is_empty() && removed.is_empty() {
            writeln!(self.writer, "  Selection unchanged; re-syncing")?;
        }
        for component in &added {
            writeln!(self.writer, "  {} {}", style("+").green(), component)?;
        }
        for component in &removed {
            writeln!(self.writer, "  {} {}", style("-").red(), component)?;
        }
        writeln!(self.writer)?;

        if self.yes {
            return Ok(true);
        }

        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt("Proceed with sync?")
            .default(true)
            .interact()?;

        Ok(confirmed)
    }
}

/// Components added to and removed from a selection.
pub fn selection_diff(current: &Selection, next: &Selection) -> (Vec<ComponentRef>, Vec<ComponentRef>) {
    let empty = BTreeSet::new();
    let mut added = Vec::new();
    let mut removed = Vec::new();
    for category in SELECTABLE {
        let before = current.names(category).unwrap_or(&empty);
        let after = next.names(category).unwrap_or(&empty);
        added.extend(
            after
                .difference(before)
                .map(|name| ComponentRef::new(category, name.clone())),
        );
        removed.extend(
            before
                .difference(after)
                .map(|name| ComponentRef::new(category, name.clone())),
        );
    }
    (added, removed)
}

/// Multi-select line for a component.
pub fn item_label(component: &Component, status: Option<ComponentStatus>) -> String {
    let mut label = component.name.clone();
    match status {
        Some(ComponentStatus::MissingEnvironment) => {
            let missing = component.required_env().join(", ");
            label.push_str(&format!(" [missing env: {}]", missing));
        }
        Some(ComponentStatus::Outdated) => label.push_str(" [outdated]"),
        Some(ComponentStatus::Installed) => label.push_str(" [installed]"),
        Some(ComponentStatus::Available) | None => {}
    }
    if let Some(description) = component.description() {
        label.push_str(&format!(" - {}", description));
    }
    label
}

fn category_heading(category: Category) -> &'static str {
    match category {
        Category::Skill => "Skills",
        Category::Agent => "Agents",
        Category::Hook => "Hooks",
        Category::Endpoint => "MCP servers",
    }
}

/// Confirms engine decisions with terminal prompts.
#[derive(Default)]
pub struct PromptConfirmer {
    theme: ColorfulTheme,
}

impl Confirmer for PromptConfirmer {
    fn confirm_missing_env(&mut self, component: &Component, missing: &[String]) -> Result<bool> {
        let verb = if missing.len() == 1 { "is" } else { "are" };
        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt(format!(
                "Hook '{}' needs {} which {} not set. Install anyway?",
                component.name,
                missing.join(", "),
                verb
            ))
            .default(false)
            .interact()?;
        Ok(confirmed)
    }

    fn confirm_orphan(&mut self, orphan: &OrphanCandidate) -> Result<bool> {
        let requirers: Vec<&str> = orphan.required_by.iter().map(String::as_str).collect();
        let confirmed = Confirm::with_theme(&self.theme)
            .with_prompt(format!(
                "{} is no longer needed (was required by {}). Remove it?",
                orphan.component,
                requirers.join(", ")
            ))
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}
