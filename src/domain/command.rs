//! Manual structural edits as replayable, invertible commands.
//!
//! Commands address nodes by identifier and positions by [`Anchor`], so a
//! command recorded against one tree can be replayed on a freshly rebuilt one.
//! `execute` validates everything before it mutates, which keeps a rejected
//! command from leaving a half-edited tree behind.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::error::{DomainError, DomainResult};
use crate::domain::rules::MergeRules;
use crate::domain::tree::{DocumentTree, NodeId};

/// A position in the tree, relative to nodes rather than to tree shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "kebab-case")]
pub enum Anchor {
    /// Child number `index` of `parent` (clamped to the child count).
    Child { parent: NodeId, index: usize },
    /// Directly after `sibling`, under the same parent.
    After { sibling: NodeId },
    /// Last child of `parent`.
    LastChild { parent: NodeId },
}

impl Anchor {
    /// The node this anchor is expressed against.
    pub fn reference(&self) -> NodeId {
        match *self {
            Anchor::Child { parent, .. } | Anchor::LastChild { parent } => parent,
            Anchor::After { sibling } => sibling,
        }
    }

    /// Resolve to `(parent, index)` as seen once `moving` has left its current slot.
    fn resolve(&self, tree: &DocumentTree, moving: NodeId) -> DomainResult<(NodeId, usize)> {
        let reference = self.reference();
        if !tree.contains(reference) {
            let reason = if tree.in_clipboard(reference) {
                format!("target {reference} is inside the cut subtree")
            } else {
                format!("target {reference} does not exist")
            };
            return Err(DomainError::invalid_target(moving, reason));
        }

        // Number of children of `parent` that will remain once `moving` is gone
        // and the slot `moving` currently occupies there, if any.
        let remaining = |parent: NodeId| -> (usize, Option<usize>) {
            let children = tree
                .get_node(parent)
                .map(|n| n.children.as_slice())
                .unwrap_or_default();
            let slot = children.iter().position(|c| *c == moving);
            (children.len() - usize::from(slot.is_some()), slot)
        };

        let (parent, index) = match *self {
            Anchor::Child { parent, index } => (parent, index.min(remaining(parent).0)),
            Anchor::LastChild { parent } => (parent, remaining(parent).0),
            Anchor::After { sibling } => {
                if sibling == moving {
                    return Err(DomainError::invalid_target(moving, "cannot place a node after itself"));
                }
                let (parent, index) = tree.position(sibling).ok_or_else(|| {
                    DomainError::invalid_target(moving, format!("{sibling} has no parent to insert into"))
                })?;
                let shift = match remaining(parent).1 {
                    Some(slot) if slot < index => 1,
                    _ => 0,
                };
                (parent, index + 1 - shift)
            }
        };

        if tree.is_within(parent, moving) {
            return Err(DomainError::invalid_target(
                moving,
                "cannot place a node inside its own subtree",
            ));
        }
        Ok((parent, index))
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anchor::Child { parent, index } => write!(f, "child {index} of {parent}"),
            Anchor::After { sibling } => write!(f, "after {sibling}"),
            Anchor::LastChild { parent } => write!(f, "end of {parent}"),
        }
    }
}

/// One operator action recorded in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Command {
    /// Detach a subtree onto the clipboard. `origin` is where it came from.
    Cut { node: NodeId, origin: Anchor },
    /// Re-attach a clipboard subtree at `target`.
    Paste { node: NodeId, target: Anchor },
    /// Move a node up one nesting level, right after its parent.
    Promote { node: NodeId, origin: Anchor },
    /// Move a node down one level, to the end of its preceding sibling.
    Demote { node: NodeId, origin: Anchor },
    /// Move an attached node; the inverse form of promote and demote.
    Move { node: NodeId, from: Anchor, to: Anchor },
    /// Replace the merge rules. Has no direct effect on a tree.
    ChangeRules {
        previous: MergeRules,
        next: MergeRules,
    },
}

impl Command {
    /// Cut `node` from its current position in `tree`.
    pub fn cut(tree: &DocumentTree, node: NodeId) -> DomainResult<Self> {
        let (parent, index) = attached_position(tree, node)?;
        Ok(Command::Cut {
            node,
            origin: Anchor::Child { parent, index },
        })
    }

    /// Paste a cut node as child `index` of `parent`.
    pub fn paste_into(node: NodeId, parent: NodeId, index: usize) -> Self {
        Command::Paste {
            node,
            target: Anchor::Child { parent, index },
        }
    }

    /// Paste a cut node directly after `sibling`.
    pub fn paste_after(node: NodeId, sibling: NodeId) -> Self {
        Command::Paste {
            node,
            target: Anchor::After { sibling },
        }
    }

    pub fn promote(tree: &DocumentTree, node: NodeId) -> DomainResult<Self> {
        let (parent, index) = attached_position(tree, node)?;
        Ok(Command::Promote {
            node,
            origin: Anchor::Child { parent, index },
        })
    }

    pub fn demote(tree: &DocumentTree, node: NodeId) -> DomainResult<Self> {
        let (parent, index) = attached_position(tree, node)?;
        let sibling = preceding_sibling(tree, node, parent, index)?;
        Ok(Command::Demote {
            node,
            origin: Anchor::After { sibling },
        })
    }

    pub fn change_rules(previous: MergeRules, next: MergeRules) -> Self {
        Command::ChangeRules { previous, next }
    }

    /// Short operation name for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Cut { .. } => "cut",
            Command::Paste { .. } => "paste",
            Command::Promote { .. } => "promote",
            Command::Demote { .. } => "demote",
            Command::Move { .. } => "move",
            Command::ChangeRules { .. } => "change-rules",
        }
    }

    pub fn is_structural(&self) -> bool {
        !matches!(self, Command::ChangeRules { .. })
    }

    /// Node identifiers that must resolve for the command to be replayable.
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            Command::Cut { node, .. } | Command::Promote { node, .. } => vec![*node],
            Command::Paste { node, target } => vec![*node, target.reference()],
            Command::Demote { node, .. } => vec![*node],
            Command::Move { node, to, .. } => vec![*node, to.reference()],
            Command::ChangeRules { .. } => Vec::new(),
        }
    }

    /// The command that undoes this one.
    pub fn invert(&self) -> Command {
        match self.clone() {
            Command::Cut { node, origin } => Command::Paste {
                node,
                target: origin,
            },
            Command::Paste { node, target } => Command::Cut {
                node,
                origin: target,
            },
            Command::Promote { node, origin } => {
                let from = Anchor::After {
                    sibling: origin.reference(),
                };
                Command::Move {
                    node,
                    from,
                    to: origin,
                }
            }
            Command::Demote { node, origin } => Command::Move {
                node,
                from: Anchor::LastChild {
                    parent: origin.reference(),
                },
                to: origin,
            },
            Command::Move { node, from, to } => Command::Move {
                node,
                from: to,
                to: from,
            },
            Command::ChangeRules { previous, next } => Command::ChangeRules {
                previous: next,
                next: previous,
            },
        }
    }

    /// Apply the command to `tree`.
    ///
    /// Returns the command as resolved against this tree: origins reflect where
    /// the node actually was, so the result's [`invert`](Self::invert) restores
    /// this exact tree. On error the tree is unchanged.
    #[instrument(level = "debug", skip(tree), fields(op = self.kind()))]
    pub fn execute(&self, tree: &mut DocumentTree) -> DomainResult<Command> {
        let resolved = match self {
            Command::Cut { node, .. } => {
                let (parent, index) = tree.detach(*node)?;
                Command::Cut {
                    node: *node,
                    origin: Anchor::Child { parent, index },
                }
            }
            Command::Paste { node, target } => {
                if !tree.in_clipboard(*node) {
                    return Err(DomainError::invalid_target(*node, "node is not on the clipboard"));
                }
                if tree.clipboard_roots().all(|root| root != *node) {
                    return Err(DomainError::invalid_target(*node, "node is inside another cut subtree"));
                }
                let (parent, index) = target.resolve(tree, *node)?;
                tree.attach(*node, parent, index)?;
                self.clone()
            }
            Command::Promote { node, .. } => {
                let (parent, index) = attached_position(tree, *node)?;
                let grandparent = tree.parent_of(parent).ok_or_else(|| {
                    DomainError::invalid_target(*node, "already at the top level")
                })?;
                let (_, parent_index) = tree.position(parent).ok_or_else(|| {
                    DomainError::invalid_target(*node, "parent is not attached")
                })?;
                tree.relocate(*node, grandparent, parent_index + 1)?;
                Command::Promote {
                    node: *node,
                    origin: Anchor::Child { parent, index },
                }
            }
            Command::Demote { node, .. } => {
                let (parent, index) = attached_position(tree, *node)?;
                let sibling = preceding_sibling(tree, *node, parent, index)?;
                let end = tree
                    .get_node(sibling)
                    .map(|s| s.children.len())
                    .unwrap_or_default();
                tree.relocate(*node, sibling, end)?;
                Command::Demote {
                    node: *node,
                    origin: Anchor::After { sibling },
                }
            }
            Command::Move { node, to, .. } => {
                let (old_parent, old_index) = attached_position(tree, *node)?;
                let (parent, index) = to.resolve(tree, *node)?;
                tree.relocate(*node, parent, index)?;
                Command::Move {
                    node: *node,
                    from: Anchor::Child {
                        parent: old_parent,
                        index: old_index,
                    },
                    to: *to,
                }
            }
            Command::ChangeRules { .. } => self.clone(),
        };
        debug!(command = %resolved, "executed");
        Ok(resolved)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Cut { node, origin } => write!(f, "cut {node} from {origin}"),
            Command::Paste { node, target } => write!(f, "paste {node} at {target}"),
            Command::Promote { node, .. } => write!(f, "promote {node}"),
            Command::Demote { node, .. } => write!(f, "demote {node}"),
            Command::Move { node, to, .. } => write!(f, "move {node} to {to}"),
            Command::ChangeRules { next, .. } => {
                write!(f, "change rules (max depth {})", next.max_depth)
            }
        }
    }
}

fn attached_position(tree: &DocumentTree, node: NodeId) -> DomainResult<(NodeId, usize)> {
    if node == tree.root() {
        return Err(DomainError::invalid_target(node, "the root cannot be moved"));
    }
    tree.position(node).ok_or_else(|| {
        let reason = if tree.in_clipboard(node) {
            "node is on the clipboard"
        } else {
            "node does not exist"
        };
        DomainError::invalid_target(node, reason)
    })
}

fn preceding_sibling(
    tree: &DocumentTree,
    node: NodeId,
    parent: NodeId,
    index: usize,
) -> DomainResult<NodeId> {
    index
        .checked_sub(1)
        .and_then(|prev| tree.get_node(parent).map(|p| p.children[prev]))
        .ok_or_else(|| DomainError::invalid_target(node, "no preceding sibling to demote into"))
}
