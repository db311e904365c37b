//! Merge rules: which headings start topics and which are folded into others.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::domain::builder::{MAX_LEVEL, MIN_LEVEL};
use crate::domain::error::{DomainError, DomainResult};
use crate::domain::tree::Node;

pub const DEFAULT_MAX_DEPTH: u8 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRules {
    /// Deepest heading level that still starts its own topic.
    pub max_depth: u8,
    /// Heading level -> styles merged regardless of depth.
    #[serde(default)]
    pub exclude: BTreeMap<u8, BTreeSet<String>>,
    /// Remove single-child containers after merging.
    #[serde(default = "default_true")]
    pub consolidate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MergeRules {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            exclude: BTreeMap::new(),
            consolidate: true,
        }
    }
}

impl MergeRules {
    pub fn new(max_depth: u8) -> DomainResult<Self> {
        let rules = Self {
            max_depth,
            ..Self::default()
        };
        rules.validate()?;
        Ok(rules)
    }

    /// Add a style exclusion for one heading level.
    pub fn exclude_style(mut self, level: u8, style: impl Into<String>) -> DomainResult<Self> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&level) {
            return Err(DomainError::InvalidRules(format!(
                "exclusion level {level} outside {MIN_LEVEL}-{MAX_LEVEL}"
            )));
        }
        self.exclude.entry(level).or_default().insert(style.into());
        Ok(self)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !(MIN_LEVEL..=MAX_LEVEL).contains(&self.max_depth) {
            return Err(DomainError::InvalidRules(format!(
                "max_depth {} outside {MIN_LEVEL}-{MAX_LEVEL}",
                self.max_depth
            )));
        }
        if let Some(level) = self
            .exclude
            .keys()
            .find(|level| !(MIN_LEVEL..=MAX_LEVEL).contains(*level))
        {
            return Err(DomainError::InvalidRules(format!(
                "exclusion level {level} outside {MIN_LEVEL}-{MAX_LEVEL}"
            )));
        }
        Ok(())
    }

    pub fn exceeds_depth(&self, node: &Node) -> bool {
        node.level.is_some_and(|level| level > self.max_depth)
    }

    pub fn is_style_excluded(&self, node: &Node) -> bool {
        match (node.level, node.style.as_deref()) {
            (Some(level), Some(style)) => self
                .exclude
                .get(&level)
                .is_some_and(|styles| styles.contains(style)),
            _ => false,
        }
    }
}
