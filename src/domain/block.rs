//! Content blocks: opaque body payloads carried by topic nodes.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a content block, unique across the whole tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "b{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Paragraph,
    List,
    Table,
    Image,
    CrossReference,
}

/// One unit of body content.
///
/// The payload is opaque to the structure engine; only `id` and `refs`
/// take part in merging, where blocks are renumbered and references
/// rewritten so that they keep pointing at the same payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    #[serde(default)]
    pub content: String,
    /// Internal references (link/xref style) to other blocks.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<BlockId>,
}

impl ContentBlock {
    pub fn new(id: BlockId, kind: BlockKind, content: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            content: content.into(),
            refs: Vec::new(),
        }
    }

    pub fn paragraph(id: BlockId, content: impl Into<String>) -> Self {
        Self::new(id, BlockKind::Paragraph, content)
    }

    pub fn cross_reference(id: BlockId, content: impl Into<String>, target: BlockId) -> Self {
        Self {
            refs: vec![target],
            ..Self::new(id, BlockKind::CrossReference, content)
        }
    }

    /// Point references at renumbered blocks. Targets absent from `renumbered` are kept.
    pub fn rewrite_refs(&mut self, renumbered: &BTreeMap<BlockId, BlockId>) {
        for target in &mut self.refs {
            if let Some(new_id) = renumbered.get(target) {
                *target = *new_id;
            }
        }
    }
}

/// Collapse runs of whitespace, the way heading titles are turned into paragraphs.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
