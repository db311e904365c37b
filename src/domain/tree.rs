//! Document tree: an owning map of topic nodes keyed by stable identifiers.
//!
//! Nodes never hold parent pointers as ownership. A node's position is defined
//! by the child sequence that contains it; the parent index kept alongside is a
//! derived lookup rebuilt after every structural mutation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::domain::block::{BlockId, ContentBlock};
use crate::domain::error::{DomainError, DomainResult};

/// Stable node identifier, assigned once from the source position and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Structural node without direct content.
    Container,
    /// Content-bearing node, exported as a standalone topic.
    Topic,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Container => write!(f, "container"),
            NodeKind::Topic => write!(f, "topic"),
        }
    }
}

/// Tree node representing one heading of the source manual.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub title: String,
    /// Source heading level (1-9), `None` for synthetic nodes.
    pub level: Option<u8>,
    /// Source paragraph style name
    pub style: Option<String>,
    pub blocks: Vec<ContentBlock>,
    pub children: Vec<NodeId>,
}

impl Node {
    pub fn new(id: NodeId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            level: None,
            style: None,
            blocks: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Container iff no direct content and at least one child.
    ///
    /// Always derived from the current blocks and children, never stored.
    pub fn kind(&self) -> NodeKind {
        if self.blocks.is_empty() && !self.children.is_empty() {
            NodeKind::Container
        } else {
            NodeKind::Topic
        }
    }

    /// Depth rank used when comparing levels; synthetic nodes rank shallowest.
    pub fn rank(&self) -> u8 {
        self.level.unwrap_or(0)
    }
}

/// Read-only view handed to presentation code.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'a> {
    tree: &'a DocumentTree,
    node: &'a Node,
}

impl<'a> NodeView<'a> {
    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn title(&self) -> &'a str {
        &self.node.title
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind()
    }

    pub fn children(&self) -> &'a [NodeId] {
        &self.node.children
    }

    /// Blocks of this node and its whole subtree in document order.
    pub fn flattened_blocks(&self) -> Vec<&'a ContentBlock> {
        self.tree.flatten_blocks(self.node.id)
    }
}

/// Owning topic tree with a clipboard for detached subtrees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTree {
    root: NodeId,
    nodes: BTreeMap<NodeId, Node>,
    /// Subtrees detached by a cut, keyed by subtree root.
    clipboard: BTreeMap<NodeId, BTreeMap<NodeId, Node>>,
    /// Derived child -> parent lookup for attached nodes
    parents: BTreeMap<NodeId, NodeId>,
    next_block: u64,
}

impl DocumentTree {
    pub fn new(root: Node) -> Self {
        let root_id = root.id;
        let mut tree = Self {
            root: root_id,
            nodes: BTreeMap::new(),
            clipboard: BTreeMap::new(),
            parents: BTreeMap::new(),
            next_block: 0,
        };
        tree.track_blocks(&root.blocks);
        tree.nodes.insert(root_id, root);
        tree
    }

    /// Insert a node as the last child of `parent`.
    #[instrument(level = "trace", skip(self, node), fields(node = %node.id))]
    pub fn insert_node(&mut self, node: Node, parent: NodeId) -> DomainResult<NodeId> {
        let id = node.id;
        if self.nodes.contains_key(&id) || self.in_clipboard(id) {
            return Err(DomainError::structural(format!("node id {id} assigned twice")));
        }
        let parent_node = self
            .nodes
            .get_mut(&parent)
            .ok_or_else(|| DomainError::structural(format!("unknown parent {parent}")))?;
        parent_node.children.push(id);
        self.track_blocks(&node.blocks);
        self.parents.insert(id, parent);
        self.nodes.insert(id, node);
        Ok(id)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn view(&self, id: NodeId) -> Option<NodeView<'_>> {
        self.nodes.get(&id).map(|node| NodeView { tree: self, node })
    }

    /// Whether `id` is part of the attached tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn in_clipboard(&self, id: NodeId) -> bool {
        self.clipboard.values().any(|subtree| subtree.contains_key(&id))
    }

    /// Roots of the subtrees currently held on the clipboard.
    pub fn clipboard_roots(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.clipboard.keys().copied()
    }

    /// Attached nodes in identifier order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    /// Attached nodes, excluding the clipboard.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Parent and sibling index of an attached, non-root node.
    pub fn position(&self, id: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.parent_of(id)?;
        let index = self
            .nodes
            .get(&parent)?
            .children
            .iter()
            .position(|child| *child == id)?;
        Some((parent, index))
    }

    pub fn iter(&self) -> TreeIterator<'_> {
        TreeIterator::new(self, self.root)
    }

    pub fn iter_postorder(&self) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self)
    }

    /// Attached node ids in document (pre-order) sequence.
    pub fn preorder_ids(&self) -> Vec<NodeId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn depth(&self) -> usize {
        self.calculate_depth(self.root)
    }

    fn calculate_depth(&self, id: NodeId) -> usize {
        self.get_node(id)
            .map(|node| {
                1 + node
                    .children
                    .iter()
                    .map(|&child| self.calculate_depth(child))
                    .max()
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }

    /// Ids of `id` and all of its attached descendants, pre-order.
    pub fn subtree_ids(&self, id: NodeId) -> Vec<NodeId> {
        TreeIterator::new(self, id).map(|(id, _)| id).collect()
    }

    /// True when `node` lies inside the attached subtree rooted at `ancestor`.
    pub fn is_within(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent_of(id);
        }
        false
    }

    pub fn flatten_blocks(&self, id: NodeId) -> Vec<&ContentBlock> {
        TreeIterator::new(self, id)
            .flat_map(|(_, node)| node.blocks.iter())
            .collect()
    }

    /// Every block in the tree, attached or on the clipboard.
    pub fn all_blocks(&self) -> impl Iterator<Item = &ContentBlock> + '_ {
        self.nodes
            .values()
            .chain(self.clipboard.values().flat_map(|subtree| subtree.values()))
            .flat_map(|node| node.blocks.iter())
    }

    pub(crate) fn fresh_block_id(&mut self) -> BlockId {
        let id = BlockId(self.next_block);
        self.next_block += 1;
        id
    }

    fn track_blocks(&mut self, blocks: &[ContentBlock]) {
        if let Some(max) = blocks.iter().map(|b| b.id.0).max() {
            self.next_block = self.next_block.max(max + 1);
        }
    }

    /// Point every reference in the tree at renumbered blocks.
    pub(crate) fn rewrite_refs(&mut self, renumbered: &BTreeMap<BlockId, BlockId>) {
        if renumbered.is_empty() {
            return;
        }
        let clipboard_nodes = self.clipboard.values_mut().flat_map(|s| s.values_mut());
        for node in self.nodes.values_mut().chain(clipboard_nodes) {
            for block in &mut node.blocks {
                block.rewrite_refs(renumbered);
            }
        }
    }

    /// Remove a node from the map without touching any child sequence.
    pub(crate) fn take_node(&mut self, id: NodeId) -> Option<Node> {
        self.parents.remove(&id);
        self.nodes.remove(&id)
    }

    /// Rebuild the derived parent index from the child sequences.
    pub(crate) fn reindex(&mut self) {
        self.parents.clear();
        for (id, node) in &self.nodes {
            for child in &node.children {
                self.parents.insert(*child, *id);
            }
        }
    }

    /// Record `parent` as the parent of `children` in the derived index.
    pub(crate) fn adopt(&mut self, parent: NodeId, children: &[NodeId]) {
        for child in children {
            self.parents.insert(*child, parent);
        }
    }

    /// Verify block ids are unique and every reference resolves.
    pub fn check_references(&self, pass: &'static str) -> DomainResult<()> {
        let mut seen = BTreeSet::new();
        for block in self.all_blocks() {
            if !seen.insert(block.id) {
                return Err(DomainError::DuplicateBlock {
                    pass,
                    block: block.id,
                });
            }
        }
        for block in self.all_blocks() {
            if let Some(target) = block.refs.iter().find(|t| !seen.contains(*t)) {
                return Err(DomainError::ReferenceIntegrity {
                    pass,
                    block: block.id,
                    target: *target,
                });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Structural edits used by commands. All validation happens in the
    // callers; these only move ownership around.
    // ------------------------------------------------------------------

    /// Detach an attached subtree onto the clipboard, returning its old position.
    pub(crate) fn detach(&mut self, id: NodeId) -> DomainResult<(NodeId, usize)> {
        let (parent, index) = self
            .position(id)
            .ok_or_else(|| DomainError::invalid_target(id, "node is not attached below the root"))?;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.remove(index);
        }
        let mut subtree = BTreeMap::new();
        for member in self.subtree_ids(id) {
            if let Some(node) = self.nodes.remove(&member) {
                subtree.insert(member, node);
            }
        }
        self.clipboard.insert(id, subtree);
        self.reindex();
        Ok((parent, index))
    }

    /// Attach a clipboard subtree as child `index` of `parent`.
    pub(crate) fn attach(&mut self, id: NodeId, parent: NodeId, index: usize) -> DomainResult<()> {
        if !self.nodes.contains_key(&parent) {
            return Err(DomainError::invalid_target(id, format!("target {parent} does not exist")));
        }
        let subtree = self
            .clipboard
            .remove(&id)
            .ok_or_else(|| DomainError::invalid_target(id, "node is not on the clipboard"))?;
        self.nodes.extend(subtree);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            let index = index.min(parent_node.children.len());
            parent_node.children.insert(index, id);
        }
        self.reindex();
        Ok(())
    }

    /// Move an attached node to child `index` of `parent`; the index is read
    /// after the node has left its current position.
    pub(crate) fn relocate(&mut self, id: NodeId, parent: NodeId, index: usize) -> DomainResult<()> {
        if self.is_within(parent, id) {
            return Err(DomainError::invalid_target(id, "cannot move a node into its own subtree"));
        }
        let (old_parent, old_index) = self
            .position(id)
            .ok_or_else(|| DomainError::invalid_target(id, "node is not attached below the root"))?;
        if let Some(node) = self.nodes.get_mut(&old_parent) {
            node.children.remove(old_index);
        }
        if let Some(node) = self.nodes.get_mut(&parent) {
            let index = index.min(node.children.len());
            node.children.insert(index, id);
        }
        self.reindex();
        Ok(())
    }
}

/// Pre-order iterator over an attached subtree.
pub struct TreeIterator<'a> {
    tree: &'a DocumentTree,
    stack: Vec<NodeId>,
}

impl<'a> TreeIterator<'a> {
    fn new(tree: &'a DocumentTree, start: NodeId) -> Self {
        let stack = if tree.contains(start) {
            vec![start]
        } else {
            Vec::new()
        };
        Self { tree, stack }
    }
}

impl<'a> Iterator for TreeIterator<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(current) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current) {
                // Push children in reverse order for left-to-right traversal
                for &child in node.children.iter().rev() {
                    self.stack.push(child);
                }
                return Some((current, node));
            }
        }
        None
    }
}

pub struct PostOrderIterator<'a> {
    tree: &'a DocumentTree,
    stack: Vec<(NodeId, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(tree: &'a DocumentTree) -> Self {
        Self {
            tree,
            stack: vec![(tree.root(), false)],
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (NodeId, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current, visited)) = self.stack.pop() {
            if let Some(node) = self.tree.get_node(current) {
                if !visited {
                    self.stack.push((current, true));
                    for &child in node.children.iter().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current, node));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::block::ContentBlock;

    fn sample() -> DocumentTree {
        let mut tree = DocumentTree::new(Node::new(NodeId(0), "root"));
        let mut a = Node::new(NodeId(1), "a");
        a.blocks.push(ContentBlock::paragraph(BlockId(4), "pa"));
        tree.insert_node(a, NodeId(0)).unwrap();
        tree.insert_node(Node::new(NodeId(2), "a.1"), NodeId(1)).unwrap();
        tree.insert_node(Node::new(NodeId(3), "b"), NodeId(0)).unwrap();
        tree
    }

    #[test]
    fn given_tree_when_iterating_then_preorder_and_postorder_match_document_order() {
        let tree = sample();

        assert_eq!(
            tree.preorder_ids(),
            vec![NodeId(0), NodeId(1), NodeId(2), NodeId(3)]
        );
        let post: Vec<_> = tree.iter_postorder().map(|(id, _)| id).collect();
        assert_eq!(post, vec![NodeId(2), NodeId(1), NodeId(3), NodeId(0)]);
        assert_eq!(tree.depth(), 3);
    }

    #[test]
    fn given_node_without_blocks_when_it_gains_children_then_kind_is_container() {
        let tree = sample();

        assert_eq!(tree.get_node(NodeId(0)).unwrap().kind(), NodeKind::Container);
        assert_eq!(tree.get_node(NodeId(1)).unwrap().kind(), NodeKind::Topic);
        assert_eq!(tree.get_node(NodeId(3)).unwrap().kind(), NodeKind::Topic);
    }

    #[test]
    fn given_detached_subtree_when_attaching_elsewhere_then_parent_index_follows() {
        let mut tree = sample();

        let origin = tree.detach(NodeId(1)).unwrap();
        assert_eq!(origin, (NodeId(0), 0));
        assert!(!tree.contains(NodeId(2)));
        assert!(tree.in_clipboard(NodeId(2)));

        tree.attach(NodeId(1), NodeId(3), 0).unwrap();
        assert_eq!(tree.parent_of(NodeId(1)), Some(NodeId(3)));
        assert_eq!(tree.parent_of(NodeId(2)), Some(NodeId(1)));
        assert!(tree.clipboard_roots().next().is_none());
    }

    #[test]
    fn given_relocation_into_own_subtree_when_relocating_then_rejects_without_change() {
        let mut tree = sample();
        let before = tree.clone();

        let result = tree.relocate(NodeId(1), NodeId(2), 0);

        assert!(matches!(result, Err(DomainError::InvalidTarget { .. })));
        assert_eq!(tree, before);
    }

    #[test]
    fn given_new_tree_when_allocating_block_ids_then_starts_after_existing_ones() {
        let mut tree = sample();

        assert_eq!(tree.fresh_block_id(), BlockId(5));
        assert_eq!(tree.fresh_block_id(), BlockId(6));
    }
}
