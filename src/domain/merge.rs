//! Merge engine: depth-based merging, style-based merging and consolidation.
//!
//! Passes run in a fixed order (depth, style, consolidation) and each one
//! rewrites the whole tree before the next begins. The engine is stateless:
//! the same tree and rules always produce the same result, and applying the
//! rules to a tree they were already applied to changes nothing.
//!
//! A node that is both too deep and style-excluded is merged by the depth
//! pass, but keeps its title as a paragraph: style handling takes precedence
//! over depth handling for titles.

use std::collections::BTreeMap;

use tracing::{debug, instrument, trace};

use crate::domain::block::{normalize_whitespace, BlockId, ContentBlock};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::rules::MergeRules;
use crate::domain::tree::{DocumentTree, Node, NodeId, NodeKind};

/// What happens to a merged node's title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitlePolicy {
    /// Sub-heading semantics: the title disappears.
    Discard,
    /// The title becomes a paragraph at the start of the moved content.
    Preserve,
}

/// Counts of what each pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub depth_merged: usize,
    pub style_merged: usize,
    pub consolidated: usize,
}

impl MergeReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Apply `rules` to a copy of `tree`.
pub fn apply(tree: &DocumentTree, rules: &MergeRules) -> DomainResult<DocumentTree> {
    MergeEngine::new(rules).apply(tree).map(|(tree, _)| tree)
}

pub struct MergeEngine<'a> {
    rules: &'a MergeRules,
}

impl<'a> MergeEngine<'a> {
    pub fn new(rules: &'a MergeRules) -> Self {
        Self { rules }
    }

    #[instrument(level = "debug", skip_all, fields(max_depth = self.rules.max_depth))]
    pub fn apply(&self, tree: &DocumentTree) -> DomainResult<(DocumentTree, MergeReport)> {
        let mut result = tree.clone();
        let mut report = MergeReport {
            depth_merged: self.depth_pass(&mut result)?,
            style_merged: self.style_pass(&mut result)?,
            ..MergeReport::default()
        };
        if self.rules.consolidate {
            report.consolidated = consolidate(&mut result);
        }
        debug!(?report, "merge rules applied");
        Ok((result, report))
    }

    /// Merge every node deeper than `max_depth` into its merge target.
    pub fn depth_pass(&self, tree: &mut DocumentTree) -> DomainResult<usize> {
        let rules = self.rules;
        run_pass(tree, "depth", |node| {
            rules.exceeds_depth(node).then(|| {
                if rules.is_style_excluded(node) {
                    TitlePolicy::Preserve
                } else {
                    TitlePolicy::Discard
                }
            })
        })
    }

    /// Merge every node whose style is excluded for its level.
    pub fn style_pass(&self, tree: &mut DocumentTree) -> DomainResult<usize> {
        let rules = self.rules;
        run_pass(tree, "style", |node| {
            rules
                .is_style_excluded(node)
                .then_some(TitlePolicy::Preserve)
        })
    }
}

fn run_pass<F>(tree: &mut DocumentTree, pass: &'static str, select: F) -> DomainResult<usize>
where
    F: Fn(&Node) -> Option<TitlePolicy>,
{
    // Only a tree that was consistent going in can be held to it coming out.
    let checked = tree.check_references(pass).is_ok();
    let root = tree.root();
    let mut merged = 0;
    let mut renumbered = BTreeMap::new();

    for id in tree.preorder_ids() {
        if id == root {
            continue;
        }
        let Some(policy) = tree.get_node(id).and_then(&select) else {
            continue;
        };
        let target = merge_node(tree, id, policy, &mut renumbered)?;
        trace!(pass, node = %id, target = %target, ?policy, "merged");
        merged += 1;
    }

    // References are rewritten once per pass. Fresh ids only grow, so a block
    // moved twice resolves through its chain.
    let resolved: BTreeMap<BlockId, BlockId> = renumbered
        .keys()
        .map(|old| {
            let mut current = renumbered[old];
            while let Some(next) = renumbered.get(&current) {
                current = *next;
            }
            (*old, current)
        })
        .collect();
    tree.rewrite_refs(&resolved);

    if checked {
        tree.check_references(pass)?;
    }
    if merged > 0 {
        debug!(pass, merged, "pass complete");
    }
    Ok(merged)
}

/// Nearest preceding sibling-or-ancestor Topic at the same level or shallower,
/// falling back to the direct parent.
pub fn resolve_target(tree: &DocumentTree, id: NodeId) -> DomainResult<NodeId> {
    let node = tree
        .get_node(id)
        .ok_or_else(|| DomainError::invalid_target(id, "merge candidate is not attached"))?;
    let rank = node.rank();
    let (parent, index) = tree
        .position(id)
        .ok_or_else(|| DomainError::invalid_target(id, "merge candidate has no parent"))?;

    let eligible = |candidate: NodeId| {
        tree.get_node(candidate)
            .is_some_and(|n| n.kind() == NodeKind::Topic && n.rank() <= rank)
    };

    let preceding = tree
        .get_node(parent)
        .map(|p| &p.children[..index])
        .unwrap_or_default();
    if let Some(sibling) = preceding.iter().rev().copied().find(|s| eligible(*s)) {
        return Ok(sibling);
    }

    let mut ancestor = Some(parent);
    while let Some(current) = ancestor {
        if eligible(current) {
            return Ok(current);
        }
        ancestor = tree.parent_of(current);
    }
    Ok(parent)
}

/// Fold one node into its merge target and return the target.
///
/// Moved blocks get fresh ids, recorded in `renumbered` for the caller to
/// rewrite references with.
fn merge_node(
    tree: &mut DocumentTree,
    id: NodeId,
    policy: TitlePolicy,
    renumbered: &mut BTreeMap<BlockId, BlockId>,
) -> DomainResult<NodeId> {
    let target = resolve_target(tree, id)?;
    let (parent, index) = tree
        .position(id)
        .ok_or_else(|| DomainError::invalid_target(id, "merge candidate has no parent"))?;
    let node = tree
        .take_node(id)
        .ok_or_else(|| DomainError::invalid_target(id, "merge candidate vanished"))?;

    let mut moved = Vec::with_capacity(node.blocks.len() + 1);
    if policy == TitlePolicy::Preserve {
        let text = normalize_whitespace(&node.title);
        if !text.is_empty() {
            moved.push(ContentBlock::paragraph(tree.fresh_block_id(), text));
        }
    }
    for mut block in node.blocks {
        let fresh = tree.fresh_block_id();
        renumbered.insert(block.id, fresh);
        block.id = fresh;
        moved.push(block);
    }

    if let Some(parent_node) = tree.get_node_mut(parent) {
        if target == parent {
            // Children take the merged node's slot.
            parent_node
                .children
                .splice(index..=index, node.children.iter().copied());
        } else {
            parent_node.children.remove(index);
        }
    }
    if let Some(target_node) = tree.get_node_mut(target) {
        if target != parent {
            target_node.children.extend(node.children.iter().copied());
        }
        target_node.blocks.extend(moved);
    }

    tree.adopt(target, &node.children);
    Ok(target)
}

/// Replace every non-root Container that has exactly one child by that child.
///
/// Runs to a fixed point; the loop is bounded by the number of nodes.
#[instrument(level = "debug", skip_all)]
pub fn consolidate(tree: &mut DocumentTree) -> usize {
    let root = tree.root();
    let mut total = 0;

    for _ in 0..=tree.len() {
        let mut changed = 0;
        let order: Vec<NodeId> = tree.iter_postorder().map(|(id, _)| id).collect();
        for id in order {
            if id == root {
                continue;
            }
            let sole_child = match tree.get_node(id) {
                Some(node) if node.kind() == NodeKind::Container && node.children.len() == 1 => {
                    node.children[0]
                }
                _ => continue,
            };
            let Some((parent, index)) = tree.position(id) else {
                continue;
            };
            if let Some(container) = tree.take_node(id) {
                trace!(container = %id, title = %container.title, child = %sole_child, "consolidated");
            }
            if let Some(parent_node) = tree.get_node_mut(parent) {
                parent_node.children[index] = sole_child;
            }
            tree.adopt(parent, &[sole_child]);
            changed += 1;
        }
        total += changed;
        if changed == 0 {
            break;
        }
    }
    total
}
