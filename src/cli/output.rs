//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::Colorize;
use termtree::Tree;

use crate::domain::{DocumentTree, NodeId, NodeKind};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print success status (green checkmark)
pub fn success(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{} {}", "✓".green(), msg);
}

/// Print failure status (red X, indented)
pub fn failure(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {} {}", "✗".red(), msg);
}

/// Print completed action (green label)
pub fn action(label: &str, msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", label.green(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Render the subtree under `id` for display.
///
/// Containers are shown in cyan, topics with their block count.
pub fn topic_tree(tree: &DocumentTree, id: NodeId) -> Tree<String> {
    let Some(node) = tree.get_node(id) else {
        return Tree::new(format!("{id} (missing)"));
    };
    let label = match node.kind() {
        NodeKind::Container => format!("{} {}", node.title.cyan(), id.to_string().dimmed()),
        NodeKind::Topic => format!(
            "{} {} ({} blocks)",
            node.title,
            id.to_string().dimmed(),
            node.blocks.len()
        ),
    };
    let leaves: Vec<_> = node
        .children
        .iter()
        .map(|child| topic_tree(tree, *child))
        .collect();

    Tree::new(label).with_leaves(leaves)
}
