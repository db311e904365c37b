//! Domain layer: document tree, merge rules and structural edits
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod block;
pub mod builder;
pub mod catalog;
pub mod command;
pub mod error;
pub mod journal;
pub mod merge;
pub mod rules;
pub mod tree;
pub mod validator;

pub use block::{BlockId, BlockKind, ContentBlock};
pub use builder::{HeadingRecord, SourceDocument, StructureBuilder};
pub use catalog::HeadingCatalog;
pub use command::{Anchor, Command};
pub use error::{DomainError, DomainResult};
pub use journal::{Journal, JournalEntry};
pub use merge::{MergeEngine, MergeReport};
pub use rules::MergeRules;
pub use tree::{DocumentTree, Node, NodeId, NodeKind, NodeView};
pub use validator::{ValidationIssue, ValidationReport};
