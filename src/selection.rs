//! Selection resolution
//!
//! Turns per-node `selected` flags into the set of methods a coverage run executes.
//!
//! | Root child        | Contributes                                          |
//! |-------------------|------------------------------------------------------|
//! | selected class    | every method of the matching class-index entry       |
//! | selected group    | nothing (not a class container)                      |
//! | unselected any    | its direct children that are selected methods        |
//!
//! Result order is fixed for reproducibility: tests picked individually under
//! unselected groups first, then tests of whole selected classes, de-duplicated
//! by node identity.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::tree::{NodeId, TestMethod, TestTree};

/// Immutable, de-duplicated set of methods chosen for one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectedTestSet {
    tests: Vec<TestMethod>,
}

impl SelectedTestSet {
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestMethod> {
        self.tests.iter()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.tests.iter().any(|t| t.id == id)
    }

    pub fn ids(&self) -> Vec<NodeId> {
        self.tests.iter().map(|t| t.id).collect()
    }

    pub fn qualified_names(&self) -> Vec<String> {
        self.tests.iter().map(TestMethod::qualified_name).collect()
    }
}

impl<'a> IntoIterator for &'a SelectedTestSet {
    type Item = &'a TestMethod;
    type IntoIter = std::slice::Iter<'a, TestMethod>;

    fn into_iter(self) -> Self::IntoIter {
        self.tests.iter()
    }
}

/// Compute the effective selection of a tree
///
/// An empty result means "nothing selected", not an error.
pub fn resolve(tree: &TestTree) -> SelectedTestSet {
    let root = tree.root().id;

    // Tests picked one by one under groups that are not selected as a whole
    let in_unselected_groups = tree
        .children(root)
        .filter(|g| !g.selected)
        .flat_map(|g| tree.children(g.id))
        .filter(|t| t.selected)
        .filter_map(|t| tree.test_method(t.id));

    // Every method of each selected group that is a known class
    let in_selected_groups = tree
        .children(root)
        .filter(|g| g.selected)
        .filter_map(|g| tree.class(g.id))
        .flat_map(|class| class.children.iter())
        .filter_map(|id| tree.test_method(*id));

    let mut seen = HashSet::new();
    let tests: Vec<TestMethod> = in_unselected_groups
        .chain(in_selected_groups)
        .filter(|t| seen.insert(t.id))
        .collect();

    debug!(
        selected = tests.len(),
        classes = tree.classes().len(),
        "Resolved test selection"
    );

    SelectedTestSet { tests }
}
