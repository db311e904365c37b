//! Structural consistency checks over a document tree.
//!
//! The tree API keeps these invariants on its own; the validator exists for
//! trees that went through replay or were assembled by hand, and for the
//! `check` command.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::{debug, instrument};

use crate::domain::block::BlockId;
use crate::domain::builder::{MAX_LEVEL, MIN_LEVEL};
use crate::domain::tree::{DocumentTree, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    MissingChild { parent: NodeId, child: NodeId },
    MultipleParents { node: NodeId, parents: Vec<NodeId> },
    StaleParentIndex { node: NodeId },
    Unreachable { node: NodeId },
    Cycle { node: NodeId },
    LevelOutOfRange { node: NodeId, level: u8 },
    EmptyTitle { node: NodeId },
    DuplicateBlock { block: BlockId },
    DanglingReference { block: BlockId, target: BlockId },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingChild { parent, child } => {
                write!(f, "{parent} lists child {child} which does not exist")
            }
            Self::MultipleParents { node, parents } => {
                let parents: Vec<String> = parents.iter().map(ToString::to_string).collect();
                write!(f, "{node} has several parents: {}", parents.join(", "))
            }
            Self::StaleParentIndex { node } => write!(f, "parent index of {node} is out of date"),
            Self::Unreachable { node } => write!(f, "{node} is not reachable from the root"),
            Self::Cycle { node } => write!(f, "{node} is part of a cycle"),
            Self::LevelOutOfRange { node, level } => {
                write!(f, "{node} has level {level} outside {MIN_LEVEL}-{MAX_LEVEL}")
            }
            Self::EmptyTitle { node } => write!(f, "{node} has an empty title"),
            Self::DuplicateBlock { block } => write!(f, "block id {block} is used twice"),
            Self::DanglingReference { block, target } => {
                write!(f, "block {block} references missing block {target}")
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.issues.is_empty()
    }
}

#[instrument(level = "debug", skip_all, fields(nodes = tree.len()))]
pub fn validate(tree: &DocumentTree) -> ValidationReport {
    let mut issues = Vec::new();
    check_links(tree, &mut issues);
    check_reachability(tree, &mut issues);
    check_nodes(tree, &mut issues);
    check_blocks(tree, &mut issues);
    debug!(issues = issues.len(), "validated");
    ValidationReport { issues }
}

fn check_links(tree: &DocumentTree, issues: &mut Vec<ValidationIssue>) {
    let mut parents: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
    for node in tree.nodes() {
        for &child in &node.children {
            if !tree.contains(child) {
                issues.push(ValidationIssue::MissingChild {
                    parent: node.id,
                    child,
                });
            }
            parents.entry(child).or_default().push(node.id);
        }
    }
    for (node, parents) in parents {
        if parents.len() > 1 {
            issues.push(ValidationIssue::MultipleParents { node, parents });
        } else if tree.contains(node) && tree.parent_of(node) != parents.first().copied() {
            issues.push(ValidationIssue::StaleParentIndex { node });
        }
    }
}

fn check_reachability(tree: &DocumentTree, issues: &mut Vec<ValidationIssue>) {
    let mut visited = BTreeSet::new();
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            issues.push(ValidationIssue::Cycle { node: id });
            continue;
        }
        if let Some(node) = tree.get_node(id) {
            stack.extend(node.children.iter().rev().copied());
        }
    }
    issues.extend(
        tree.nodes()
            .map(|node| node.id)
            .filter(|id| !visited.contains(id))
            .map(|node| ValidationIssue::Unreachable { node }),
    );
}

fn check_nodes(tree: &DocumentTree, issues: &mut Vec<ValidationIssue>) {
    for node in tree.nodes() {
        if let Some(level) = node.level {
            if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
                issues.push(ValidationIssue::LevelOutOfRange {
                    node: node.id,
                    level,
                });
            }
        }
        if node.title.trim().is_empty() {
            issues.push(ValidationIssue::EmptyTitle { node: node.id });
        }
    }
}

fn check_blocks(tree: &DocumentTree, issues: &mut Vec<ValidationIssue>) {
    let mut seen = BTreeSet::new();
    for block in tree.all_blocks() {
        if !seen.insert(block.id) {
            issues.push(ValidationIssue::DuplicateBlock { block: block.id });
        }
    }
    for block in tree.all_blocks() {
        for target in block.refs.iter().filter(|t| !seen.contains(*t)) {
            issues.push(ValidationIssue::DanglingReference {
                block: block.id,
                target: *target,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::block::ContentBlock;
    use crate::domain::tree::Node;

    fn sample() -> DocumentTree {
        let mut tree = DocumentTree::new(Node::new(NodeId(0), "root"));
        let mut a = Node::new(NodeId(1), "a");
        a.blocks.push(ContentBlock::paragraph(BlockId(1), "pa"));
        tree.insert_node(a, NodeId(0)).unwrap();
        tree.insert_node(Node::new(NodeId(2), "b"), NodeId(0)).unwrap();
        tree
    }

    #[test]
    fn given_consistent_tree_when_validating_then_no_issues() {
        assert!(validate(&sample()).is_valid());
    }

    #[test]
    fn given_child_listed_twice_when_validating_then_reports_multiple_parents_and_cycle() {
        let mut tree = sample();
        tree.get_node_mut(NodeId(1)).unwrap().children.push(NodeId(2));

        let report = validate(&tree);

        assert!(report.issues.contains(&ValidationIssue::MultipleParents {
            node: NodeId(2),
            parents: vec![NodeId(0), NodeId(1)],
        }));
        assert!(report.issues.contains(&ValidationIssue::Cycle { node: NodeId(2) }));
    }

    #[test]
    fn given_dangling_child_and_reference_when_validating_then_both_reported() {
        let mut tree = sample();
        let a = tree.get_node_mut(NodeId(1)).unwrap();
        a.children.push(NodeId(9));
        a.blocks
            .push(ContentBlock::cross_reference(BlockId(2), "see", BlockId(42)));

        let report = validate(&tree);

        assert!(report.issues.contains(&ValidationIssue::MissingChild {
            parent: NodeId(1),
            child: NodeId(9),
        }));
        assert!(report.issues.contains(&ValidationIssue::DanglingReference {
            block: BlockId(2),
            target: BlockId(42),
        }));
    }

    #[test]
    fn given_node_removed_from_child_list_when_validating_then_unreachable() {
        let mut tree = sample();
        tree.get_node_mut(NodeId(0)).unwrap().children.retain(|c| *c != NodeId(2));

        let report = validate(&tree);

        assert!(report
            .issues
            .contains(&ValidationIssue::Unreachable { node: NodeId(2) }));
    }
}
