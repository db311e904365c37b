//! Structure builder: turns the classifier's flat heading sequence into a raw topic tree.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::domain::block::ContentBlock;
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::tree::{DocumentTree, Node, NodeId};

pub const MIN_LEVEL: u8 = 1;
pub const MAX_LEVEL: u8 = 9;

/// Title given to the synthetic root when the source carries none.
pub const DEFAULT_ROOT_TITLE: &str = "Document";

/// One classified heading together with the body content that follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingRecord {
    pub level: u8,
    pub style: String,
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<ContentBlock>,
}

impl HeadingRecord {
    pub fn new(level: u8, style: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            level,
            style: style.into(),
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn with_blocks(mut self, blocks: Vec<ContentBlock>) -> Self {
        self.blocks = blocks;
        self
    }
}

/// Classified source manual as handed over by the heading classifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    #[serde(default)]
    pub title: Option<String>,
    /// Content preceding the first heading.
    #[serde(default)]
    pub preamble: Vec<ContentBlock>,
    #[serde(default)]
    pub headings: Vec<HeadingRecord>,
}

impl SourceDocument {
    pub fn new(headings: Vec<HeadingRecord>) -> Self {
        Self {
            headings,
            ..Self::default()
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = &ContentBlock> + '_ {
        self.preamble
            .iter()
            .chain(self.headings.iter().flat_map(|h| h.blocks.iter()))
    }
}

/// Identifier of the synthetic root.
pub const ROOT_ID: NodeId = NodeId(0);

/// Identifier assigned to the heading at `position` in the source sequence.
pub fn heading_node_id(position: usize) -> NodeId {
    NodeId(position as u32 + 1)
}

/// Constructs raw document trees from classified headings.
///
/// Identifiers derive from source positions only, so rebuilding the same
/// source always yields the same ids.
#[derive(Debug, Default)]
pub struct StructureBuilder {
    heading_stack: Vec<(u8, NodeId)>,
}

impl StructureBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(level = "debug", skip(self, source), fields(headings = source.headings.len()))]
    pub fn build(&mut self, source: &SourceDocument) -> DomainResult<DocumentTree> {
        Self::validate(source)?;
        self.heading_stack.clear();

        let mut root = Node::new(
            ROOT_ID,
            source
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_ROOT_TITLE.to_string()),
        );
        // Leading content is never dropped: it lives on the root.
        root.blocks = source.preamble.clone();
        let mut tree = DocumentTree::new(root);

        for (position, record) in source.headings.iter().enumerate() {
            // Remove headings from the stack that are at the same or a deeper level
            while self
                .heading_stack
                .last()
                .is_some_and(|(level, _)| *level >= record.level)
            {
                self.heading_stack.pop();
            }
            let parent = self
                .heading_stack
                .last()
                .map(|(_, id)| *id)
                .unwrap_or(ROOT_ID);

            let id = heading_node_id(position);
            let node = Node {
                level: Some(record.level),
                style: Some(record.style.clone()),
                blocks: record.blocks.clone(),
                ..Node::new(id, record.title.trim())
            };
            tree.insert_node(node, parent)?;
            self.heading_stack.push((record.level, id));
        }

        debug!(nodes = tree.len(), depth = tree.depth(), "raw tree built");
        Ok(tree)
    }

    fn validate(source: &SourceDocument) -> DomainResult<()> {
        for (position, record) in source.headings.iter().enumerate() {
            if !(MIN_LEVEL..=MAX_LEVEL).contains(&record.level) {
                return Err(DomainError::structural(format!(
                    "heading {} '{}' has level {} outside {MIN_LEVEL}-{MAX_LEVEL}",
                    position + 1,
                    record.title,
                    record.level
                )));
            }
            if record.title.trim().is_empty() {
                return Err(DomainError::structural(format!(
                    "heading {} has an empty title",
                    position + 1
                )));
            }
        }

        let mut ids = BTreeSet::new();
        for block in source.blocks() {
            if !ids.insert(block.id) {
                return Err(DomainError::structural(format!(
                    "block id {} appears twice in the source",
                    block.id
                )));
            }
        }
        for block in source.blocks() {
            if let Some(target) = block.refs.iter().find(|t| !ids.contains(*t)) {
                return Err(DomainError::structural(format!(
                    "block {} references unknown block {target}",
                    block.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::block::BlockId;

    #[test]
    fn given_skipped_levels_when_building_then_nests_under_nearest_shallower_heading() {
        let source = SourceDocument::new(vec![
            HeadingRecord::new(1, "Heading 1", "A"),
            HeadingRecord::new(3, "Heading 3", "A.x"),
            HeadingRecord::new(2, "Heading 2", "A.1"),
            HeadingRecord::new(1, "Heading 1", "B"),
        ]);

        let tree = StructureBuilder::new().build(&source).unwrap();

        let a = tree.get_node(NodeId(1)).unwrap();
        assert_eq!(a.children, vec![NodeId(2), NodeId(3)]);
        assert_eq!(
            tree.get_node(ROOT_ID).unwrap().children,
            vec![NodeId(1), NodeId(4)]
        );
    }

    #[test]
    fn given_level_ten_when_building_then_structural_error() {
        let source = SourceDocument::new(vec![HeadingRecord::new(10, "Odd", "Deep")]);

        let result = StructureBuilder::new().build(&source);

        assert!(matches!(result, Err(DomainError::Structural { .. })));
    }

    #[test]
    fn given_dangling_reference_when_building_then_structural_error() {
        let source = SourceDocument::new(vec![HeadingRecord::new(1, "H1", "A")
            .with_blocks(vec![ContentBlock::cross_reference(
                BlockId(1),
                "see",
                BlockId(99),
            )])]);

        let result = StructureBuilder::new().build(&source);

        assert!(matches!(result, Err(DomainError::Structural { .. })));
    }
}
