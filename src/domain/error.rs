//! Domain-level errors (no external dependencies)

use thiserror::Error;

use crate::domain::block::BlockId;
use crate::domain::tree::NodeId;

/// Domain errors represent violations of the topic structure rules.
/// These are independent of infrastructure concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or unanchored heading sequence from the classifier.
    #[error("structural error: {message}")]
    Structural { message: String },

    /// Paste/promote/demote into an invalid or cyclic position.
    #[error("invalid target for node {node}: {reason}")]
    InvalidTarget { node: NodeId, reason: String },

    /// A block reference could not be resolved after a merge pass.
    #[error("reference integrity violated in {pass} pass: block {block} -> {target}")]
    ReferenceIntegrity {
        pass: &'static str,
        block: BlockId,
        target: BlockId,
    },

    /// Two blocks share an identifier after a merge pass.
    #[error("duplicate block id {block} after {pass} pass")]
    DuplicateBlock { pass: &'static str, block: BlockId },

    #[error("invalid merge rules: {0}")]
    InvalidRules(String),
}

impl DomainError {
    pub fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }

    pub fn invalid_target(node: NodeId, reason: impl Into<String>) -> Self {
        Self::InvalidTarget {
            node,
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
