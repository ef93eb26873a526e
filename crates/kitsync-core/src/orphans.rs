//! Auto-resolved dependencies that nothing retained requires anymore.

use std::collections::BTreeSet;

use crate::ledger::Ledger;
use crate::resolve::Resolution;
use crate::selection::Selection;
use crate::types::{Category, ComponentRef};

/// A tracked dependency whose requirers are all gone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrphanCandidate {
    pub component: ComponentRef,
    /// Requirers as recorded in the ledger.
    pub required_by: BTreeSet<String>,
}

pub struct OrphanCollector;

impl OrphanCollector {
    /// Skills that stay after a sync: the direct selection plus every skill
    /// still pulled in as a dependency.
    pub fn retained_skills(selection: &Selection, resolution: &Resolution) -> BTreeSet<String> {
        selection
            .skills
            .iter()
            .chain(resolution.skills.keys())
            .cloned()
            .collect()
    }

    /// Dependencies whose `required_by` does not intersect `retained`.
    pub fn collect(ledger: &Ledger, retained: &BTreeSet<String>) -> Vec<OrphanCandidate> {
        let mut candidates = Vec::new();
        for category in Category::ALL {
            for (name, dep) in ledger.dependencies(category) {
                if dep.required_by.is_disjoint(retained) {
                    candidates.push(OrphanCandidate {
                        component: ComponentRef::new(category, name.clone()),
                        required_by: dep.required_by.clone(),
                    });
                }
            }
        }
        tracing::debug!(count = candidates.len(), "orphan candidates collected");
        candidates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn dependency_without_retained_requirer_is_orphaned() {
        let mut ledger = Ledger::new();
        ledger
            .track_dependency(Category::Agent, "z", "h", Path::new("/src/agents/z.md"), ["x"])
            .unwrap();
        ledger
            .track_dependency(Category::Endpoint, "e", "h", Path::new("/src/mcp/e.json"), ["x", "y"])
            .unwrap();

        let retained = BTreeSet::from(["y".to_string()]);
        let orphans = OrphanCollector::collect(&ledger, &retained);

        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].component, ComponentRef::new(Category::Agent, "z"));
        assert_eq!(orphans[0].required_by, BTreeSet::from(["x".to_string()]));
    }

    #[test]
    fn retained_includes_resolved_skills() {
        let selection = Selection {
            skills: BTreeSet::from(["x".to_string()]),
            ..Default::default()
        };
        let mut resolution = Resolution::default();
        resolution
            .skills
            .insert("git".into(), BTreeSet::from(["x".to_string()]));

        let retained = OrphanCollector::retained_skills(&selection, &resolution);
        assert_eq!(
            retained,
            BTreeSet::from(["git".to_string(), "x".to_string()])
        );
    }
}
