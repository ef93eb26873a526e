//! Dependency resolution over skill manifests.
//!
//! The manifest graph is walked depth-first with an explicit stack and
//! three-color marking. Each skill's manifest is expanded once; provenance
//! (`required by`) is recorded at every edge regardless, so a shared
//! dependency lists every skill that references it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::detect::Detection;
use crate::error::DependencyError;
use crate::selection::Selection;
use crate::types::Category;

/// Dependency name -> skills that required it.
pub type RequiredBy = BTreeMap<String, BTreeSet<String>>;

/// A manifest reference that could not be satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionWarning {
    pub required_by: String,
    pub category: Category,
    pub name: String,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "skill '{}' requires unknown {} '{}'",
            self.required_by, self.category, self.name
        )
    }
}

/// Dependencies implied by a selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub endpoints: RequiredBy,
    pub agents: RequiredBy,
    pub skills: RequiredBy,
    pub warnings: Vec<ResolutionWarning>,
    pub errors: Vec<DependencyError>,
}

impl Resolution {
    /// Any error blocks installing the batch.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn required(&self, category: Category) -> Option<&RequiredBy> {
        match category {
            Category::Skill => Some(&self.skills),
            Category::Agent => Some(&self.agents),
            Category::Endpoint => Some(&self.endpoints),
            Category::Hook => None,
        }
    }

    fn record(map: &mut RequiredBy, dependency: &str, requirer: &str) {
        map.entry(dependency.to_string())
            .or_default()
            .insert(requirer.to_string());
    }

    fn warn(&mut self, required_by: &str, category: Category, name: &str) {
        let warning = ResolutionWarning {
            required_by: required_by.to_string(),
            category,
            name: name.to_string(),
        };
        tracing::warn!("{}", warning);
        if !self.warnings.contains(&warning) {
            self.warnings.push(warning);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// One skill being expanded: its known skill dependencies and a cursor.
struct Frame<'a> {
    skill: &'a str,
    deps: Vec<&'a str>,
    next: usize,
}

/// Resolves manifest dependencies against a detected source tree.
pub struct DependencyResolver<'a> {
    detection: &'a Detection,
}

impl<'a> DependencyResolver<'a> {
    pub fn new(detection: &'a Detection) -> Self {
        Self { detection }
    }

    /// Resolve everything the selected skills need.
    ///
    /// Direct selections are never recorded as dependencies, but their edges
    /// are still followed so cycles through them are reported.
    pub fn resolve(&self, selection: &Selection) -> Resolution {
        let mut resolution = Resolution::default();
        let mut marks: HashMap<&'a str, Mark> = HashMap::new();

        for root in &selection.skills {
            let Some(component) = self.detection.universe.find(Category::Skill, root) else {
                tracing::warn!(skill = %root, "selected skill is not in the source tree");
                continue;
            };
            if marks.contains_key(component.name.as_str()) {
                continue;
            }
            self.walk(component.name.as_str(), selection, &mut marks, &mut resolution);
        }

        tracing::debug!(
            endpoints = resolution.endpoints.len(),
            agents = resolution.agents.len(),
            skills = resolution.skills.len(),
            warnings = resolution.warnings.len(),
            errors = resolution.errors.len(),
            "dependency resolution complete"
        );
        resolution
    }

    fn walk(
        &self,
        root: &'a str,
        selection: &Selection,
        marks: &mut HashMap<&'a str, Mark>,
        resolution: &mut Resolution,
    ) {
        let mut stack = vec![self.enter(root, selection, marks, resolution)];

        while let Some(frame) = stack.last_mut() {
            let Some(&dep) = frame.deps.get(frame.next) else {
                marks.insert(frame.skill, Mark::Done);
                stack.pop();
                continue;
            };
            frame.next += 1;
            let requirer = frame.skill;

            if !selection.skills.contains(dep) {
                Resolution::record(&mut resolution.skills, dep, requirer);
            }

            match marks.get(dep) {
                None => {
                    let frame = self.enter(dep, selection, marks, resolution);
                    stack.push(frame);
                }
                Some(Mark::InProgress) => {
                    let start = stack.iter().position(|f| f.skill == dep).unwrap_or(0);
                    let mut chain: Vec<String> =
                        stack[start..].iter().map(|f| f.skill.to_string()).collect();
                    chain.push(dep.to_string());
                    let error = DependencyError::Circular { chain };
                    tracing::warn!("{}", error);
                    if !resolution.errors.contains(&error) {
                        resolution.errors.push(error);
                    }
                }
                Some(Mark::Done) => {}
            }
        }
    }

    /// Mark `skill` in progress and record its non-skill dependencies.
    fn enter(
        &self,
        skill: &'a str,
        selection: &Selection,
        marks: &mut HashMap<&'a str, Mark>,
        resolution: &mut Resolution,
    ) -> Frame<'a> {
        marks.insert(skill, Mark::InProgress);
        let mut frame = Frame {
            skill,
            deps: Vec::new(),
            next: 0,
        };

        let Some(manifest) = self
            .detection
            .universe
            .find(Category::Skill, skill)
            .and_then(|c| c.manifest.as_ref())
        else {
            return frame;
        };

        for endpoint in &manifest.mcp_servers {
            if self.detection.find(Category::Endpoint, endpoint).is_some() {
                Resolution::record(&mut resolution.endpoints, endpoint, skill);
            } else {
                resolution.warn(skill, Category::Endpoint, endpoint);
            }
        }

        if let Some(agent) = &manifest.agent {
            if self.detection.find(Category::Agent, agent).is_none() {
                resolution.warn(skill, Category::Agent, agent);
            } else if !selection.agents.contains(agent) {
                Resolution::record(&mut resolution.agents, agent, skill);
            }
        }

        for dep in &manifest.skills {
            match self.detection.universe.find(Category::Skill, dep) {
                Some(component) => frame.deps.push(component.name.as_str()),
                None => resolution.warn(skill, Category::Skill, dep),
            }
        }
        frame
    }
}
