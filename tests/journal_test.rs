use rstest::{fixture, rstest};

use topicmap::domain::{
    Anchor, BlockId, Command, ContentBlock, DocumentTree, DomainError, HeadingRecord, Journal,
    NodeId, SourceDocument, StructureBuilder,
};
use topicmap::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

/// root > A(1) > [A.1(2), A.2(3)], B(4)
#[fixture]
fn tree() -> DocumentTree {
    let para = |id: u64, text: &str| vec![ContentBlock::paragraph(BlockId(id), text)];
    StructureBuilder::new()
        .build(&SourceDocument::new(vec![
            HeadingRecord::new(1, "Heading 1", "A").with_blocks(para(1, "a")),
            HeadingRecord::new(2, "Heading 2", "A.1").with_blocks(para(2, "a1")),
            HeadingRecord::new(2, "Heading 2", "A.2").with_blocks(para(3, "a2")),
            HeadingRecord::new(1, "Heading 1", "B").with_blocks(para(4, "b")),
        ]))
        .unwrap()
}

fn children(tree: &DocumentTree, id: u32) -> Vec<NodeId> {
    tree.get_node(NodeId(id)).unwrap().children.clone()
}

#[rstest]
fn given_cut_and_paste_when_inverted_in_reverse_then_original_tree(tree: DocumentTree) {
    // Arrange
    let original = tree.clone();
    let mut tree = tree;
    let cut = Command::cut(&tree, NodeId(2)).unwrap().execute(&mut tree).unwrap();
    let paste = Command::paste_into(NodeId(2), NodeId(4), 0)
        .execute(&mut tree)
        .unwrap();
    assert_eq!(children(&tree, 4), vec![NodeId(2)]);

    // Act
    paste.invert().execute(&mut tree).unwrap();
    cut.invert().execute(&mut tree).unwrap();

    // Assert
    assert_eq!(tree, original);
}

#[rstest]
fn given_promote_when_inverted_then_node_returns_to_old_slot(tree: DocumentTree) {
    // Arrange
    let original = tree.clone();
    let mut tree = tree;

    // Act
    let promote = Command::promote(&tree, NodeId(2))
        .unwrap()
        .execute(&mut tree)
        .unwrap();

    // Assert
    assert_eq!(children(&tree, 0), vec![NodeId(1), NodeId(2), NodeId(4)]);
    promote.invert().execute(&mut tree).unwrap();
    assert_eq!(tree, original);
}

#[rstest]
fn given_demote_when_inverted_then_node_returns_to_old_slot(tree: DocumentTree) {
    // Arrange
    let original = tree.clone();
    let mut tree = tree;

    // Act
    let demote = Command::demote(&tree, NodeId(4))
        .unwrap()
        .execute(&mut tree)
        .unwrap();

    // Assert
    assert_eq!(children(&tree, 0), vec![NodeId(1)]);
    assert_eq!(children(&tree, 1), vec![NodeId(2), NodeId(3), NodeId(4)]);
    demote.invert().execute(&mut tree).unwrap();
    assert_eq!(tree, original);
}

#[rstest]
fn given_cut_subtree_when_pasting_into_own_descendant_then_invalid_target(tree: DocumentTree) {
    // Arrange
    let mut tree = tree;
    Command::cut(&tree, NodeId(1)).unwrap().execute(&mut tree).unwrap();
    let before = tree.clone();

    // Act
    let result = Command::paste_into(NodeId(1), NodeId(2), 0).execute(&mut tree);

    // Assert
    assert!(matches!(result, Err(DomainError::InvalidTarget { .. })));
    assert_eq!(tree, before);
}

#[rstest]
fn given_missing_target_when_pasting_then_invalid_target(tree: DocumentTree) {
    // Arrange
    let mut tree = tree;
    Command::cut(&tree, NodeId(4)).unwrap().execute(&mut tree).unwrap();

    // Act
    let result = Command::paste_after(NodeId(4), NodeId(99)).execute(&mut tree);

    // Assert
    assert!(matches!(result, Err(DomainError::InvalidTarget { .. })));
    assert!(tree.in_clipboard(NodeId(4)));
}

#[rstest]
#[case::top_level_promote(Command::Promote { node: NodeId(1), origin: Anchor::LastChild { parent: NodeId(0) } })]
#[case::first_child_demote(Command::Demote { node: NodeId(2), origin: Anchor::LastChild { parent: NodeId(1) } })]
#[case::root_cut(Command::Cut { node: NodeId(0), origin: Anchor::LastChild { parent: NodeId(0) } })]
#[case::paste_attached(Command::paste_after(NodeId(2), NodeId(4)))]
fn given_impossible_edit_when_executing_then_tree_unchanged(tree: DocumentTree, #[case] command: Command) {
    // Arrange
    let mut tree = tree;
    let before = tree.clone();

    // Act
    let result = command.execute(&mut tree);

    // Assert
    assert!(matches!(result, Err(DomainError::InvalidTarget { .. })));
    assert_eq!(tree, before);
}

#[rstest]
fn given_journal_when_undoing_all_then_inverses_restore_original(tree: DocumentTree) {
    // Arrange
    let original = tree.clone();
    let mut tree = tree;
    let mut journal = Journal::new();
    let edits = [
        Command::cut(&tree, NodeId(3)).unwrap(),
        Command::paste_after(NodeId(3), NodeId(4)),
    ];
    for edit in edits {
        let resolved = edit.execute(&mut tree).unwrap();
        journal.record(resolved);
    }
    let demote = Command::demote(&tree, NodeId(3)).unwrap();
    journal.record(demote.execute(&mut tree).unwrap());
    let edited = tree.clone();

    // Act
    while let Some(entry) = journal.undo() {
        entry.command.invert().execute(&mut tree).unwrap();
    }

    // Assert
    assert_eq!(tree, original);
    assert_eq!(journal.cursor(), 0);
    while let Some(entry) = journal.redo() {
        entry.command.execute(&mut tree).unwrap();
    }
    assert_eq!(tree, edited);
}

#[test]
fn given_journal_when_serialized_then_commands_are_tagged() {
    // Arrange
    let mut journal = Journal::new();
    journal.record(Command::paste_into(NodeId(2), NodeId(4), 1));

    // Act
    let json = serde_json::to_value(&journal).unwrap();

    // Assert
    assert_eq!(json["cursor"], 1);
    assert_eq!(json["entries"][0]["command"]["op"], "paste");
    assert_eq!(json["entries"][0]["command"]["target"]["at"], "child");
    let back: Journal = serde_json::from_value(json).unwrap();
    assert_eq!(back, journal);
}
