//! Heading catalog: every heading of a source grouped by level and style.
//!
//! Front ends use it to offer style exclusions together with the headings
//! each exclusion would affect.

use std::collections::BTreeMap;

use crate::domain::builder::SourceDocument;
use crate::domain::rules::MergeRules;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadingCatalog {
    levels: BTreeMap<u8, BTreeMap<String, Vec<String>>>,
}

/// One catalog line: a style used at some level and how it is treated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleEntry<'a> {
    pub level: u8,
    pub style: &'a str,
    pub titles: &'a [String],
    pub excluded: bool,
}

impl HeadingCatalog {
    pub fn from_source(source: &SourceDocument) -> Self {
        let mut levels: BTreeMap<u8, BTreeMap<String, Vec<String>>> = BTreeMap::new();
        for record in &source.headings {
            levels
                .entry(record.level)
                .or_default()
                .entry(record.style.clone())
                .or_default()
                .push(record.title.trim().to_string());
        }
        Self { levels }
    }

    pub fn levels(&self) -> impl Iterator<Item = u8> + '_ {
        self.levels.keys().copied()
    }

    pub fn styles(&self, level: u8) -> impl Iterator<Item = &str> + '_ {
        self.levels
            .get(&level)
            .into_iter()
            .flat_map(|styles| styles.keys().map(String::as_str))
    }

    /// Titles of the headings with `style` at `level`, in source order.
    pub fn titles(&self, level: u8, style: &str) -> &[String] {
        self.levels
            .get(&level)
            .and_then(|styles| styles.get(style))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All (level, style) pairs with their exclusion state under `rules`.
    pub fn entries<'a>(&'a self, rules: &'a MergeRules) -> impl Iterator<Item = StyleEntry<'a>> + 'a {
        self.levels.iter().flat_map(move |(&level, styles)| {
            styles.iter().map(move |(style, titles)| StyleEntry {
                level,
                style,
                titles,
                excluded: rules
                    .exclude
                    .get(&level)
                    .is_some_and(|excluded| excluded.contains(style)),
            })
        })
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
