//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

use crate::domain::NodeId;

/// Topic structure engine: derive, merge and reshape topic hierarchies
#[derive(Parser, Debug)]
#[command(name = "topicmap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug output (-d info, -dd debug, -ddd trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Project directory holding .topicmap.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Source document plus rule overrides shared by the tree commands.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Classified source document (JSON)
    #[arg(value_hint = ValueHint::FilePath)]
    pub source: PathBuf,

    /// Edit journal to replay (JSON); created by `edit`
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub journal: Option<PathBuf>,

    /// Override the configured maximum topic depth
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=9))]
    pub max_depth: Option<u8>,

    /// Exclude a heading style at a level, e.g. 3:Note (repeatable)
    #[arg(long = "exclude", value_name = "LEVEL:STYLE", value_parser = parse_exclusion)]
    pub exclusions: Vec<(u8, String)>,

    /// Keep single-child containers
    #[arg(long)]
    pub no_consolidate: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the topic tree
    Tree {
        #[command(flatten)]
        args: SourceArgs,
        /// Show the raw tree before merging
        #[arg(long)]
        raw: bool,
    },

    /// Show the export table of contents
    Toc {
        #[command(flatten)]
        args: SourceArgs,
    },

    /// List headings grouped by level and style
    Headings {
        #[command(flatten)]
        args: SourceArgs,
    },

    /// Validate tree structure and block references
    Check {
        #[command(flatten)]
        args: SourceArgs,
    },

    /// Record a manual edit in the journal
    Edit {
        #[command(flatten)]
        args: SourceArgs,
        #[command(subcommand)]
        command: EditCommands,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum EditCommands {
    /// Detach a node and its subtree onto the clipboard
    Cut {
        #[arg(value_parser = parse_node_id)]
        node: NodeId,
    },

    /// Re-attach a cut node
    Paste {
        #[arg(value_parser = parse_node_id)]
        node: NodeId,
        /// Insert as child of this node
        #[arg(long, value_parser = parse_node_id, conflicts_with = "after", required_unless_present = "after")]
        into: Option<NodeId>,
        /// Child position when using --into (default: first)
        #[arg(long, default_value_t = 0, requires = "into")]
        index: usize,
        /// Insert directly after this node
        #[arg(long, value_parser = parse_node_id)]
        after: Option<NodeId>,
    },

    /// Move a node up one level, after its parent
    Promote {
        #[arg(value_parser = parse_node_id)]
        node: NodeId,
    },

    /// Move a node under its preceding sibling
    Demote {
        #[arg(value_parser = parse_node_id)]
        node: NodeId,
    },

    /// Undo the last applied edit
    Undo,

    /// Redo the last undone edit
    Redo,

    /// Show journal entries
    Log,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective configuration
    Show,

    /// Show config file locations
    Path,

    /// Print a commented config template
    Template,
}

/// Accept `n12` (as displayed) or a plain `12`.
pub fn parse_node_id(value: &str) -> Result<NodeId, String> {
    let digits = value.strip_prefix('n').unwrap_or(value);
    digits
        .parse::<u32>()
        .map(NodeId)
        .map_err(|_| format!("'{value}' is not a node id (expected e.g. n12)"))
}

/// Parse `LEVEL:STYLE`.
pub fn parse_exclusion(value: &str) -> Result<(u8, String), String> {
    let (level, style) = value
        .split_once(':')
        .ok_or_else(|| format!("'{value}' is not LEVEL:STYLE"))?;
    let level = level
        .trim()
        .parse::<u8>()
        .map_err(|_| format!("'{level}' is not a heading level"))?;
    let style = style.trim();
    if style.is_empty() {
        return Err(format!("'{value}' has an empty style"));
    }
    Ok((level, style.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("n12", Some(12))]
    #[case("7", Some(7))]
    #[case("x3", None)]
    #[case("n", None)]
    fn test_parse_node_id(#[case] input: &str, #[case] expected: Option<u32>) {
        assert_eq!(parse_node_id(input).ok(), expected.map(NodeId));
    }

    #[rstest]
    #[case("3:Note", Some((3, "Note")))]
    #[case("2: Heading Note ", Some((2, "Heading Note")))]
    #[case("Note", None)]
    #[case("3:", None)]
    fn test_parse_exclusion(#[case] input: &str, #[case] expected: Option<(u8, &str)>) {
        assert_eq!(
            parse_exclusion(input).ok(),
            expected.map(|(level, style)| (level, style.to_string()))
        );
    }
}
