//! Test tree model
//!
//! Discovered tests form a three-level tree:
//!
//! ```text
//! root (Group)
//!  ├── Calc.AdderTests (Class)      <- also listed in the class index
//!  │    ├── adds_two (Method)
//!  │    └── adds_negative (Method)
//!  └── Calc.Slow (Group)            <- grouping only, not a class
//!       └── big_sum (Method)
//! ```
//!
//! Nodes live in an arena and are addressed by [`NodeId`]. The class index holds
//! ids of Class nodes, so a class's methods are reachable both through the index
//! and through the class's own entry under the root without duplicating them.

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CovrunError;

/// Pattern for group and method names (CLR-style identifiers, generics allowed)
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.<>`,+\-]*$").unwrap());

/// Identity of a node within one [`TestTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Group,
    Class,
    Method,
}

#[derive(Debug, Clone)]
pub struct TestNode {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    pub selected: bool,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

impl TestNode {
    pub fn is_method(&self) -> bool {
        self.kind == NodeKind::Method
    }
}

/// An executable test, captured by value so it outlives the tree it came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestMethod {
    pub id: NodeId,
    pub class: String,
    pub name: String,
}

impl TestMethod {
    /// `Class.Method`, the form test runners filter on
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.class, self.name)
    }
}

/// Arena-backed test tree with exactly one root Group
#[derive(Debug, Clone)]
pub struct TestTree {
    nodes: Vec<TestNode>,
    classes: Vec<NodeId>,
}

impl Default for TestTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TestTree {
    /// Create a tree holding only the root group
    pub fn new() -> Self {
        Self {
            nodes: vec![TestNode {
                id: NodeId(0),
                name: "root".to_string(),
                kind: NodeKind::Group,
                selected: false,
                parent: None,
                children: Vec::new(),
            }],
            classes: Vec::new(),
        }
    }

    pub fn root(&self) -> &TestNode {
        &self.nodes[0]
    }

    pub fn node(&self, id: NodeId) -> Option<&TestNode> {
        self.nodes.get(id.0)
    }

    /// Direct children of a node, in insertion order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &TestNode> + '_ {
        self.node(id)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |c| self.node(*c))
    }

    /// Ids of Class nodes registered in the class index
    pub fn classes(&self) -> &[NodeId] {
        &self.classes
    }

    /// Look up a node in the class index by identity
    pub fn class(&self, id: NodeId) -> Option<&TestNode> {
        self.classes
            .iter()
            .find(|c| **c == id)
            .and_then(|c| self.node(*c))
    }

    /// True when discovery produced anything under the root
    pub fn has_tests(&self) -> bool {
        !self.root().children.is_empty()
    }

    /// Number of Method nodes in the tree
    pub fn method_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_method()).count()
    }

    /// Capture a Method node as a [`TestMethod`]; None for non-method nodes
    pub fn test_method(&self, id: NodeId) -> Option<TestMethod> {
        let node = self.node(id).filter(|n| n.is_method())?;
        let class = node
            .parent
            .and_then(|p| self.node(p))
            .map(|p| p.name.clone())
            .unwrap_or_default();
        Some(TestMethod {
            id,
            class,
            name: node.name.clone(),
        })
    }

    /// Toggle the selection flag of any node; returns false for unknown ids
    pub fn set_selected(&mut self, id: NodeId, selected: bool) -> bool {
        match self.nodes.get_mut(id.0) {
            Some(node) => {
                node.selected = selected;
                true
            }
            None => false,
        }
    }

    /// Add a test class under the root and register it in the class index
    pub fn add_class(&mut self, name: &str, selected: bool) -> Result<NodeId, CovrunError> {
        let id = self.add_root_child(name, NodeKind::Class, selected)?;
        self.classes.push(id);
        Ok(id)
    }

    /// Add a grouping node under the root (not a class, not indexed)
    pub fn add_group(&mut self, name: &str, selected: bool) -> Result<NodeId, CovrunError> {
        self.add_root_child(name, NodeKind::Group, selected)
    }

    /// Add a test method under a root-level group or class
    pub fn add_method(
        &mut self,
        parent: NodeId,
        name: &str,
        selected: bool,
    ) -> Result<NodeId, CovrunError> {
        validate_name(name)?;
        let parent_node = self
            .node(parent)
            .filter(|p| p.parent == Some(self.root().id))
            .ok_or_else(|| CovrunError::InvalidName {
                name: name.to_string(),
                reason: "methods must belong to a root-level group or class",
            })?;
        if self.children(parent).any(|c| c.name == name) {
            return Err(CovrunError::DuplicateName {
                name: name.to_string(),
                scope: parent_node.name.clone(),
            });
        }
        Ok(self.push(name, NodeKind::Method, selected, parent))
    }

    fn add_root_child(
        &mut self,
        name: &str,
        kind: NodeKind,
        selected: bool,
    ) -> Result<NodeId, CovrunError> {
        validate_name(name)?;
        let root = self.root().id;
        if self.children(root).any(|c| c.name == name) {
            return Err(CovrunError::DuplicateName {
                name: name.to_string(),
                scope: "root".to_string(),
            });
        }
        Ok(self.push(name, kind, selected, root))
    }

    fn push(&mut self, name: &str, kind: NodeKind, selected: bool, parent: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(TestNode {
            id,
            name: name.to_string(),
            kind,
            selected,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    // ========================================================================
    // YAML DESCRIPTION
    // ========================================================================

    /// Build a tree from a parsed description
    pub fn from_spec(spec: &TreeSpec) -> Result<Self, CovrunError> {
        let mut tree = Self::new();
        for group in &spec.groups {
            let id = match group.kind {
                GroupKind::Class => tree.add_class(&group.name, group.selected)?,
                GroupKind::Group => tree.add_group(&group.name, group.selected)?,
            };
            for method in &group.methods {
                tree.add_method(id, &method.name, method.selected)?;
            }
        }
        Ok(tree)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, CovrunError> {
        let spec: TreeSpec = serde_yaml::from_str(yaml).map_err(CovrunError::TreeParse)?;
        Self::from_spec(&spec)
    }

    pub fn load(path: &Path) -> Result<Self, CovrunError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }
}

fn validate_name(name: &str) -> Result<(), CovrunError> {
    if name.is_empty() {
        return Err(CovrunError::InvalidName {
            name: name.to_string(),
            reason: "name is empty",
        });
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(CovrunError::InvalidName {
            name: name.to_string(),
            reason: "name contains characters a test filter cannot express",
        });
    }
    Ok(())
}

/// YAML description of a discovered tree
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeSpec {
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: String,
    #[serde(default)]
    pub kind: GroupKind,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub methods: Vec<MethodSpec>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKind {
    #[default]
    Class,
    Group,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodSpec {
    pub name: String,
    #[serde(default)]
    pub selected: bool,
}
