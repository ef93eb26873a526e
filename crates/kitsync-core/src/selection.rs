//! The user's direct selection for one project.

use std::collections::BTreeSet;

use crate::ledger::Ledger;
use crate::types::{Category, ComponentRef};

/// Components the user picked directly. Endpoints are never selectable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub skills: BTreeSet<String>,
    pub agents: BTreeSet<String>,
    pub hooks: BTreeSet<String>,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// The selection currently recorded as direct entries in the ledger.
    pub fn from_ledger(ledger: &Ledger) -> Self {
        Self {
            skills: ledger.direct_names(Category::Skill),
            agents: ledger.direct_names(Category::Agent),
            hooks: ledger.direct_names(Category::Hook),
        }
    }

    pub fn names(&self, category: Category) -> Option<&BTreeSet<String>> {
        match category {
            Category::Skill => Some(&self.skills),
            Category::Agent => Some(&self.agents),
            Category::Hook => Some(&self.hooks),
            Category::Endpoint => None,
        }
    }

    fn names_mut(&mut self, category: Category) -> anyhow::Result<&mut BTreeSet<String>> {
        match category {
            Category::Skill => Ok(&mut self.skills),
            Category::Agent => Ok(&mut self.agents),
            Category::Hook => Ok(&mut self.hooks),
            Category::Endpoint => anyhow::bail!(
                "MCP servers cannot be selected directly; declare them in a skill's kit.json"
            ),
        }
    }

    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.names(category).is_some_and(|names| names.contains(name))
    }

    /// Add a component. Returns `true` if it was not already selected.
    pub fn insert(&mut self, component: &ComponentRef) -> anyhow::Result<bool> {
        Ok(self
            .names_mut(component.category)?
            .insert(component.name.clone()))
    }

    /// Drop a component. Returns `true` if it was selected.
    pub fn remove(&mut self, component: &ComponentRef) -> anyhow::Result<bool> {
        Ok(self.names_mut(component.category)?.remove(&component.name))
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty() && self.agents.is_empty() && self.hooks.is_empty()
    }
}
