use topicmap::domain::merge::{apply, consolidate};
use topicmap::domain::{
    BlockId, ContentBlock, DocumentTree, HeadingRecord, MergeEngine, MergeRules, NodeId, NodeKind,
    SourceDocument, StructureBuilder,
};
use topicmap::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

fn para(id: u64, text: &str) -> ContentBlock {
    ContentBlock::paragraph(BlockId(id), text)
}

fn build(headings: Vec<HeadingRecord>) -> DocumentTree {
    StructureBuilder::new()
        .build(&SourceDocument::new(headings))
        .unwrap()
}

fn contents(tree: &DocumentTree, id: NodeId) -> Vec<String> {
    tree.get_node(id)
        .unwrap()
        .blocks
        .iter()
        .map(|b| b.content.clone())
        .collect()
}

/// Intro (1) > Details (2) > Aside (3, style "Note")
fn intro_details_aside() -> DocumentTree {
    build(vec![
        HeadingRecord::new(1, "Normal", "Intro").with_blocks(vec![para(1, "p1")]),
        HeadingRecord::new(2, "Normal", "Details").with_blocks(vec![para(2, "p2")]),
        HeadingRecord::new(3, "Note", "Aside").with_blocks(vec![para(3, "p3")]),
    ])
}

#[test]
fn given_level_three_heading_when_max_depth_is_two_then_merged_without_title() {
    // Arrange
    let tree = intro_details_aside();
    let rules = MergeRules::new(2).unwrap();

    // Act
    let merged = apply(&tree, &rules).unwrap();

    // Assert
    let root = merged.get_node(merged.root()).unwrap();
    assert_eq!(root.children, vec![NodeId(1)]);
    assert_eq!(contents(&merged, NodeId(1)), vec!["p1"]);
    assert_eq!(merged.get_node(NodeId(1)).unwrap().children, vec![NodeId(2)]);
    assert_eq!(contents(&merged, NodeId(2)), vec!["p2", "p3"]);
    assert!(!merged.contains(NodeId(3)));
}

#[test]
fn given_excluded_note_style_when_merging_then_title_kept_as_paragraph() {
    // Arrange
    let tree = intro_details_aside();
    let rules = MergeRules::new(9).unwrap().exclude_style(3, "Note").unwrap();

    // Act
    let merged = apply(&tree, &rules).unwrap();

    // Assert
    assert_eq!(contents(&merged, NodeId(2)), vec!["p2", "Aside", "p3"]);
    assert!(merged.get_node(NodeId(2)).unwrap().children.is_empty());
}

#[test]
fn given_rules_without_violations_when_merging_then_tree_unchanged() {
    // Arrange
    let tree = intro_details_aside();
    let rules = MergeRules::new(9).unwrap();

    // Act
    let (merged, report) = MergeEngine::new(&rules).apply(&tree).unwrap();

    // Assert
    assert_eq!(merged, tree);
    assert!(report.is_noop());
}

#[test]
fn given_style_excluded_container_when_passes_swap_order_then_content_order_differs() {
    // Arrange: A[a] > N(Note, no content) > C[c]; C too deep, N style-excluded
    let tree = build(vec![
        HeadingRecord::new(1, "Heading 1", "A").with_blocks(vec![para(1, "a")]),
        HeadingRecord::new(2, "Note", "N"),
        HeadingRecord::new(3, "Heading 3", "C").with_blocks(vec![para(2, "c")]),
    ]);
    let rules = MergeRules::new(2).unwrap().exclude_style(2, "Note").unwrap();
    let engine = MergeEngine::new(&rules);

    // Act
    let mut depth_first = tree.clone();
    engine.depth_pass(&mut depth_first).unwrap();
    engine.style_pass(&mut depth_first).unwrap();

    let mut style_first = tree.clone();
    engine.style_pass(&mut style_first).unwrap();
    engine.depth_pass(&mut style_first).unwrap();

    let (applied, report) = engine.apply(&tree).unwrap();

    // Assert
    assert_eq!(contents(&depth_first, NodeId(1)), vec!["a", "c", "N"]);
    assert_eq!(contents(&style_first, NodeId(1)), vec!["a", "N", "c"]);
    assert_eq!(contents(&applied, NodeId(1)), contents(&depth_first, NodeId(1)));
    assert_eq!(report.depth_merged, 1);
    assert_eq!(report.style_merged, 1);
}

#[test]
fn given_deep_heading_under_container_when_merging_then_folds_into_topic_ancestor() {
    // Arrange
    let tree = build(vec![
        HeadingRecord::new(1, "Heading 1", "Setup").with_blocks(vec![para(1, "intro")]),
        HeadingRecord::new(2, "Heading 2", "Group"),
        HeadingRecord::new(3, "Heading 3", "Step").with_blocks(vec![para(2, "step")]),
    ]);
    let rules = MergeRules {
        consolidate: false,
        ..MergeRules::new(2).unwrap()
    };

    // Act
    let merged = apply(&tree, &rules).unwrap();

    // Assert
    assert_eq!(contents(&merged, NodeId(1)), vec!["intro", "step"]);
    let group = merged.get_node(NodeId(2)).unwrap();
    assert!(group.children.is_empty());
    assert_eq!(group.kind(), NodeKind::Topic);
}

#[test]
fn given_first_heading_too_deep_when_merging_then_content_moves_to_root() {
    // Arrange
    let tree = build(vec![
        HeadingRecord::new(4, "Heading 4", "Orphan").with_blocks(vec![para(1, "lost?")]),
        HeadingRecord::new(1, "Heading 1", "Main").with_blocks(vec![para(2, "main")]),
    ]);
    let rules = MergeRules::new(1).unwrap();

    // Act
    let merged = apply(&tree, &rules).unwrap();

    // Assert
    assert_eq!(contents(&merged, merged.root()), vec!["lost?"]);
    assert_eq!(
        merged.get_node(merged.root()).unwrap().children,
        vec![NodeId(2)]
    );
}

#[test]
fn given_single_child_container_when_consolidating_then_child_takes_its_place() {
    // Arrange
    let tree = build(vec![
        HeadingRecord::new(1, "Heading 1", "Chapter"),
        HeadingRecord::new(2, "Heading 2", "Only").with_blocks(vec![para(1, "only")]),
        HeadingRecord::new(1, "Heading 1", "Next").with_blocks(vec![para(2, "next")]),
    ]);
    let mut consolidated = tree.clone();

    // Act
    let removed = consolidate(&mut consolidated);

    // Assert
    assert_eq!(removed, 1);
    assert_eq!(
        consolidated.get_node(consolidated.root()).unwrap().children,
        vec![NodeId(2), NodeId(3)]
    );
    assert_eq!(consolidated.parent_of(NodeId(2)), Some(consolidated.root()));
}

#[test]
fn given_consolidation_disabled_when_merging_then_single_child_container_kept() {
    // Arrange
    let tree = build(vec![
        HeadingRecord::new(1, "Heading 1", "Chapter"),
        HeadingRecord::new(2, "Heading 2", "Only").with_blocks(vec![para(1, "only")]),
    ]);
    let rules = MergeRules {
        consolidate: false,
        ..MergeRules::default()
    };

    // Act
    let merged = apply(&tree, &rules).unwrap();

    // Assert
    assert!(merged.contains(NodeId(1)));
    assert_eq!(merged.get_node(NodeId(1)).unwrap().kind(), NodeKind::Container);
}

#[test]
fn given_merged_tree_when_applying_again_then_identical() {
    // Arrange
    let tree = intro_details_aside();
    let rules = MergeRules::new(1).unwrap().exclude_style(3, "Note").unwrap();
    let once = apply(&tree, &rules).unwrap();

    // Act
    let twice = apply(&once, &rules).unwrap();

    // Assert
    assert_eq!(once, twice);
}
