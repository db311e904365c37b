use rstest::rstest;

use topicmap::domain::builder::ROOT_ID;
use topicmap::domain::{
    BlockId, ContentBlock, DomainError, HeadingCatalog, HeadingRecord, MergeRules, NodeId,
    NodeKind, SourceDocument, StructureBuilder,
};
use topicmap::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

fn para(id: u64, text: &str) -> ContentBlock {
    ContentBlock::paragraph(BlockId(id), text)
}

fn manual() -> SourceDocument {
    SourceDocument {
        title: Some("Pump Manual".to_string()),
        preamble: vec![para(100, "Read this first")],
        headings: vec![
            HeadingRecord::new(1, "Heading 1", "Safety"),
            HeadingRecord::new(2, "Heading 2", "Warnings").with_blocks(vec![para(1, "hot")]),
            HeadingRecord::new(2, "Note", "Tip").with_blocks(vec![para(2, "gloves")]),
            HeadingRecord::new(1, "Heading 1", "Operation").with_blocks(vec![para(3, "start")]),
        ],
    }
}

#[test]
fn given_same_source_when_building_twice_then_trees_are_equal() {
    // Arrange
    let source = manual();

    // Act
    let first = StructureBuilder::new().build(&source).unwrap();
    let second = StructureBuilder::new().build(&source).unwrap();

    // Assert
    assert_eq!(first, second);
    assert_eq!(first.preorder_ids(), second.preorder_ids());
}

#[test]
fn given_manual_when_building_then_hierarchy_follows_levels() {
    // Arrange
    let source = manual();

    // Act
    let tree = StructureBuilder::new().build(&source).unwrap();

    // Assert
    let root = tree.get_node(ROOT_ID).unwrap();
    assert_eq!(root.title, "Pump Manual");
    assert_eq!(root.children, vec![NodeId(1), NodeId(4)]);
    assert_eq!(
        tree.get_node(NodeId(1)).unwrap().children,
        vec![NodeId(2), NodeId(3)]
    );
    assert_eq!(tree.get_node(NodeId(1)).unwrap().kind(), NodeKind::Container);
    assert_eq!(tree.get_node(NodeId(4)).unwrap().kind(), NodeKind::Topic);
}

#[test]
fn given_preamble_when_building_then_content_lives_on_root() {
    // Arrange
    let source = manual();

    // Act
    let tree = StructureBuilder::new().build(&source).unwrap();

    // Assert
    let root = tree.get_node(tree.root()).unwrap();
    assert_eq!(root.blocks, vec![para(100, "Read this first")]);
}

#[test]
fn given_empty_source_when_building_then_root_only() {
    // Arrange
    let source = SourceDocument::default();

    // Act
    let tree = StructureBuilder::new().build(&source).unwrap();

    // Assert
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.get_node(ROOT_ID).unwrap().title, "Document");
}

#[test]
fn given_padded_title_when_building_then_title_is_trimmed() {
    // Arrange
    let source = SourceDocument::new(vec![HeadingRecord::new(1, "Heading 1", "  Intro \t")]);

    // Act
    let tree = StructureBuilder::new().build(&source).unwrap();

    // Assert
    assert_eq!(tree.view(NodeId(1)).unwrap().title(), "Intro");
}

#[rstest]
#[case::level_zero(vec![HeadingRecord::new(0, "Heading 0", "Zero")])]
#[case::level_ten(vec![HeadingRecord::new(10, "Heading 10", "Ten")])]
#[case::blank_title(vec![HeadingRecord::new(1, "Heading 1", "   ")])]
#[case::duplicate_block(vec![
    HeadingRecord::new(1, "Heading 1", "A").with_blocks(vec![para(1, "a")]),
    HeadingRecord::new(1, "Heading 1", "B").with_blocks(vec![para(1, "b")]),
])]
#[case::dangling_reference(vec![
    HeadingRecord::new(1, "Heading 1", "A")
        .with_blocks(vec![ContentBlock::cross_reference(BlockId(1), "see", BlockId(9))]),
])]
fn given_malformed_source_when_building_then_structural_error(#[case] headings: Vec<HeadingRecord>) {
    // Arrange
    let source = SourceDocument::new(headings);

    // Act
    let result = StructureBuilder::new().build(&source);

    // Assert
    assert!(matches!(result, Err(DomainError::Structural { .. })));
}

#[test]
fn given_manual_when_cataloging_then_grouped_by_level_and_style() {
    // Arrange
    let catalog = HeadingCatalog::from_source(&manual());
    let rules = MergeRules::default().exclude_style(2, "Note").unwrap();

    // Act
    let entries: Vec<_> = catalog.entries(&rules).collect();

    // Assert
    assert_eq!(catalog.levels().collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(catalog.titles(1, "Heading 1"), ["Safety", "Operation"]);
    assert_eq!(entries.len(), 3);
    let note = entries.iter().find(|e| e.style == "Note").unwrap();
    assert!(note.excluded);
    assert_eq!(note.titles, ["Tip"]);
    assert!(entries.iter().filter(|e| e.style != "Note").all(|e| !e.excluded));
}
