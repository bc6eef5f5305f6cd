//! End-to-end editing scenarios over the public model API.

use folio_api::{
    ApiError, BlockContent, BlockNode, BlockTree, BlockType, CheckboxContent, Page, TextContent,
};
use folio_core::engine::MutationEngine;
use folio_core::ids::SequentialIds;
use folio_core::pages::{PageTree, Recents};
use folio_core::table::TableOp;

fn engine() -> MutationEngine<SequentialIds> {
    MutationEngine::new(SequentialIds::new())
}

fn paragraph(id: &str, text: &str) -> BlockNode {
    BlockNode::new(id, BlockType::Paragraph, BlockContent::text(text))
}

#[test]
fn insert_then_retype() {
    let engine = engine();
    let tree = BlockTree::from_nodes(vec![paragraph("b1", "")]).unwrap();

    let edit = engine.insert(&tree, Some("b1"), BlockType::Checkbox).unwrap();
    let tree = edit.tree;
    assert_eq!(tree.top_level().len(), 2);
    let second = tree.find(&tree.top_level()[1]).unwrap();
    assert_eq!(
        second.content,
        BlockContent::Checkbox(CheckboxContent {
            text: String::new(),
            checked: false,
            formatting: vec![],
        })
    );

    let tree = engine.retype(&tree, "b1", BlockType::Heading1).unwrap().tree;
    let b1 = tree.find("b1").unwrap();
    assert_eq!(b1.block_type, BlockType::Heading1);
    assert_eq!(b1.content, BlockContent::Text(TextContent::default()));
    assert_eq!(tree.top_level().len(), 2);
}

#[test]
fn duplicate_toggle_with_children() {
    let engine = engine();
    let tree = BlockTree::from_nodes(vec![BlockNode::new(
        "t1",
        BlockType::Toggle,
        BlockContent::text("Details"),
    )
    .with_children(vec![paragraph("c1", "first"), paragraph("c2", "second")])])
    .unwrap();

    let edit = engine.duplicate(&tree, "t1").unwrap();
    let copy_id = edit.focus.clone().unwrap();
    let next = edit.tree;

    assert_eq!(next.top_level(), &["t1".to_string(), copy_id.clone()]);
    let copy = next.find(&copy_id).unwrap();
    let original = next.find("t1").unwrap();
    assert_eq!(copy.content, original.content);
    assert_eq!(copy.children.len(), 2);
    for child in &copy.children {
        assert!(!["t1", "c1", "c2"].contains(&child.as_str()));
        assert_eq!(next.find(child).unwrap().parent_id.as_deref(), Some(copy_id.as_str()));
    }
    let texts: Vec<_> = next
        .children(&copy_id)
        .unwrap()
        .iter()
        .map(|b| b.text().unwrap_or_default().to_string())
        .collect();
    assert_eq!(texts, vec!["first", "second"]);

    // Original untouched
    assert_eq!(next.subtree_node("t1"), tree.subtree_node("t1"));
    assert!(next.validate().is_ok());
}

#[test]
fn delete_subtree_shrinks_flatten_by_subtree_size() {
    let engine = engine();
    let tree = BlockTree::from_nodes(vec![
        paragraph("a", "a"),
        BlockNode::new("t", BlockType::Toggle, BlockContent::text("t")).with_children(vec![
            paragraph("c1", "1"),
            BlockNode::new("t2", BlockType::Toggle, BlockContent::text("nested"))
                .with_children(vec![paragraph("g1", "deep")]),
        ]),
        paragraph("z", "z"),
    ])
    .unwrap();

    let before = tree.flatten().count();
    let next = engine.remove(&tree, "t").unwrap().tree;
    assert_eq!(next.flatten().count(), before - 4);
    for gone in ["t", "c1", "t2", "g1"] {
        assert_eq!(
            next.find(gone),
            Err(ApiError::BlockNotFound { id: gone.into() })
        );
    }
}

#[test]
fn table_columns_stay_aligned() {
    let engine = engine();
    let tree = engine.insert(&BlockTree::new(), None, BlockType::Table).unwrap();
    let id = tree.focus.clone().unwrap();
    let mut tree = tree.tree;

    for op in [
        TableOp::AddRow,
        TableOp::SetCell { row: 0, column: 0, text: "a0".into() },
        TableOp::SetCell { row: 0, column: 1, text: "b0".into() },
        TableOp::SetCell { row: 1, column: 1, text: "b1".into() },
        TableOp::AddColumn,
        TableOp::SetCell { row: 1, column: 2, text: "c1".into() },
    ] {
        tree = engine.edit_table(&tree, &id, &op).unwrap().tree;
        let table = tree.find(&id).unwrap().content.as_table().unwrap();
        assert!(table.is_rectangular(), "after {op:?}");
    }

    let tree = engine
        .edit_table(&tree, &id, &TableOp::RemoveColumn { index: 0 })
        .unwrap()
        .tree;
    let table = tree.find(&id).unwrap().content.as_table().unwrap();
    assert_eq!(table.headers, vec!["Column 2", "Column 3"]);
    assert_eq!(table.rows[0], vec!["b0", ""]);
    assert_eq!(table.rows[1], vec!["b1", "c1"]);
}

#[test]
fn breadcrumbs_and_favorites() {
    let pages = PageTree::new()
        .create_page(Page::new("A", "A", "me"), None)
        .and_then(|t| t.create_page(Page::new("B", "B", "me"), Some("A")))
        .and_then(|t| t.create_page(Page::new("C", "C", "me"), Some("B")))
        .and_then(|t| t.create_page(Page::new("D", "D", "me"), None))
        .unwrap();

    let trail: Vec<String> = pages
        .breadcrumbs("C", &Recents::default())
        .unwrap()
        .into_iter()
        .map(|crumb| crumb.title)
        .collect();
    assert_eq!(trail, vec!["A", "B", "C"]);

    // Favorite in reverse document order; result is still pre-order
    let pages = pages
        .toggle_favorite("D")
        .and_then(|t| t.toggle_favorite("C"))
        .and_then(|t| t.toggle_favorite("A"))
        .unwrap();
    let favorites: Vec<&str> = pages.favorites().iter().map(|p| p.id.as_str()).collect();
    assert_eq!(favorites, vec!["A", "C", "D"]);
}
