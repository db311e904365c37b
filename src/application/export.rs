//! Export plan: the map layout a publishing back end writes out.
//!
//! Each attached node below the root becomes one map entry in document order.
//! Nodes without content (containers and empty topics) are emitted as
//! headings without a file; topics with content reference a file
//! whose name is derived deterministically from the node, so regenerating an
//! unchanged tree yields the same names.

use std::collections::BTreeMap;
use std::fmt;

use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::application::error::{ApplicationError, ApplicationResult};
use crate::domain::{DocumentTree, Node, NodeId};

/// Directory that holds topic files, relative to the map.
pub const TOPICS_DIR: &str = "topics";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileNaming {
    /// `topic_<10 hex>.dita` from a digest of the node identity.
    #[default]
    Hashed,
    /// Lower-case title slug, suffixed on collision.
    Slug,
}

impl fmt::Display for FileNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileNaming::Hashed => write!(f, "hashed"),
            FileNaming::Slug => write!(f, "slug"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Navigation titles are rendered upper-case.
    pub uppercase_titles: bool,
    pub file_naming: FileNaming,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            uppercase_titles: true,
            file_naming: FileNaming::Hashed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportElement {
    TopicHead,
    TopicRef { href: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub node: NodeId,
    /// 1 for top-level entries.
    pub depth: usize,
    /// Hierarchical section number, e.g. "2.3".
    pub toc_index: String,
    pub navtitle: String,
    pub element: ExportElement,
    /// Number of content blocks the topic file will carry.
    pub blocks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPlan {
    pub title: String,
    /// Content ahead of the first heading, carried by the map itself.
    pub front_matter: usize,
    pub entries: Vec<ExportEntry>,
}

impl ExportPlan {
    pub fn topics(&self) -> impl Iterator<Item = &ExportEntry> + '_ {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.element, ExportElement::TopicRef { .. }))
    }

    pub fn entry(&self, node: NodeId) -> Option<&ExportEntry> {
        self.entries.iter().find(|entry| entry.node == node)
    }
}

pub struct ExportPlanner {
    options: ExportOptions,
    invalid_chars: Regex,
    separators: Regex,
}

impl ExportPlanner {
    pub fn new(options: ExportOptions) -> ApplicationResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| ApplicationError::Config {
                message: format!("invalid slug pattern {pattern}: {e}"),
            })
        };
        Ok(Self {
            options,
            invalid_chars: compile(r"[^\w\s-]")?,
            separators: compile(r"[-\s]+")?,
        })
    }

    #[instrument(level = "debug", skip_all, fields(nodes = tree.len()))]
    pub fn plan(&self, tree: &DocumentTree) -> ExportPlan {
        let mut entries = Vec::new();
        let mut used_names = BTreeMap::new();
        if let Some(root) = tree.get_node(tree.root()) {
            self.walk(tree, root, &mut Vec::new(), &mut used_names, &mut entries);
        }
        let (title, front_matter) = tree
            .get_node(tree.root())
            .map(|root| (self.navtitle(&root.title), root.blocks.len()))
            .unwrap_or_default();
        debug!(entries = entries.len(), "export plan ready");
        ExportPlan {
            title,
            front_matter,
            entries,
        }
    }

    fn walk(
        &self,
        tree: &DocumentTree,
        parent: &Node,
        counters: &mut Vec<usize>,
        used_names: &mut BTreeMap<String, usize>,
        entries: &mut Vec<ExportEntry>,
    ) {
        for (position, child) in parent.children.iter().enumerate() {
            let Some(node) = tree.get_node(*child) else {
                continue;
            };
            counters.push(position + 1);
            // No file is written for a node without content.
            let element = if node.blocks.is_empty() {
                ExportElement::TopicHead
            } else {
                ExportElement::TopicRef {
                    href: format!("{TOPICS_DIR}/{}", self.file_name(node, used_names)),
                }
            };
            entries.push(ExportEntry {
                node: node.id,
                depth: counters.len(),
                toc_index: counters.iter().join("."),
                navtitle: self.navtitle(&node.title),
                element,
                blocks: node.blocks.len(),
            });
            self.walk(tree, node, counters, used_names, entries);
            counters.pop();
        }
    }

    fn navtitle(&self, title: &str) -> String {
        if self.options.uppercase_titles {
            title.to_uppercase()
        } else {
            title.to_string()
        }
    }

    fn file_name(&self, node: &Node, used_names: &mut BTreeMap<String, usize>) -> String {
        let stem = match self.options.file_naming {
            FileNaming::Hashed => format!("topic_{}", topic_digest(node)),
            FileNaming::Slug => {
                let slug = self.slugify(&node.title);
                if slug.is_empty() {
                    format!("topic_{}", node.id.0)
                } else {
                    slug
                }
            }
        };
        let seen = used_names.entry(stem.clone()).or_insert(0);
        *seen += 1;
        match *seen {
            1 => format!("{stem}.dita"),
            n => format!("{stem}_{n}.dita"),
        }
    }

    /// File-system safe, lower-case version of `text`.
    pub fn slugify(&self, text: &str) -> String {
        let cleaned = self.invalid_chars.replace_all(text, "");
        let cleaned = cleaned.trim().to_lowercase();
        self.separators.replace_all(&cleaned, "_").into_owned()
    }
}

/// First 40 bits of SHA-256 over the node identity, as 10 hex characters.
fn topic_digest(node: &Node) -> String {
    let mut hasher = Sha256::new();
    hasher.update(node.id.0.to_le_bytes());
    hasher.update(node.title.as_bytes());
    let result = hasher.finalize();
    hex::encode(&result[..5])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_punctuated_title_when_slugifying_then_underscored_lowercase() {
        let planner = ExportPlanner::new(ExportOptions::default()).unwrap();

        assert_eq!(planner.slugify("  Safety - Notes (v2)! "), "safety_notes_v2");
    }

    #[test]
    fn given_node_when_hashing_then_ten_hex_characters() {
        let node = Node::new(NodeId(7), "Intro");

        let digest = topic_digest(&node);

        assert_eq!(digest.len(), 10);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, topic_digest(&node));
    }
}
