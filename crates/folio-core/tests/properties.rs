//! Property-based tests for the mutation engine
//!
//! Random sequences of structural edits must keep ids unique and the tree
//! internally consistent; move and retype obey their ordering and text
//! carry-over rules for any input.

use std::collections::HashSet;

use folio_api::{BlockContent, BlockNode, BlockTree, BlockType};
use folio_core::engine::MutationEngine;
use folio_core::ids::SequentialIds;
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert { anchor: usize, block_type: BlockType },
    InsertChild { anchor: usize },
    Duplicate { target: usize },
    Remove { target: usize },
    Move { target: usize, index: usize },
    Retype { target: usize, block_type: BlockType },
}

fn block_type_strategy() -> impl Strategy<Value = BlockType> {
    prop::sample::select(BlockType::ALL.to_vec())
}

fn text_type_strategy() -> impl Strategy<Value = BlockType> {
    prop::sample::select(vec![
        BlockType::Paragraph,
        BlockType::Heading1,
        BlockType::Heading2,
        BlockType::Heading3,
        BlockType::BulletedList,
        BlockType::NumberedList,
        BlockType::Quote,
        BlockType::Checkbox,
        BlockType::Callout,
    ])
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (any::<usize>(), block_type_strategy())
            .prop_map(|(anchor, block_type)| Op::Insert { anchor, block_type }),
        1 => any::<usize>().prop_map(|anchor| Op::InsertChild { anchor }),
        2 => any::<usize>().prop_map(|target| Op::Duplicate { target }),
        1 => any::<usize>().prop_map(|target| Op::Remove { target }),
        2 => (any::<usize>(), 0..12usize).prop_map(|(target, index)| Op::Move { target, index }),
        1 => (any::<usize>(), block_type_strategy())
            .prop_map(|(target, block_type)| Op::Retype { target, block_type }),
    ]
}

/// Pick the n-th block (mod count) of the tree in pre-order.
fn pick(tree: &BlockTree, n: usize) -> Option<String> {
    let ids: Vec<String> = tree.flatten().map(|b| b.id.clone()).collect();
    if ids.is_empty() {
        None
    } else {
        Some(ids[n % ids.len()].clone())
    }
}

fn apply(engine: &MutationEngine<SequentialIds>, tree: &BlockTree, op: &Op) -> BlockTree {
    let result = match op {
        Op::Insert { anchor, block_type } => {
            let anchor = pick(tree, *anchor);
            engine.insert(tree, anchor.as_deref(), *block_type)
        }
        Op::InsertChild { anchor } => {
            let toggle = tree
                .flatten()
                .filter(|b| b.block_type == BlockType::Toggle)
                .map(|b| b.id.clone())
                .nth(*anchor % 4);
            match toggle {
                Some(id) => engine.insert_child(tree, &id, BlockType::Paragraph),
                None => engine.insert(tree, None, BlockType::Toggle),
            }
        }
        Op::Duplicate { target } => match pick(tree, *target) {
            Some(id) => engine.duplicate(tree, &id),
            None => return tree.clone(),
        },
        Op::Remove { target } => match pick(tree, *target) {
            Some(id) => engine.remove(tree, &id),
            None => return tree.clone(),
        },
        Op::Move { target, index } => match pick(tree, *target) {
            Some(id) => engine.move_block(tree, &id, *index),
            None => return tree.clone(),
        },
        Op::Retype { target, block_type } => match pick(tree, *target) {
            Some(id) => engine.retype(tree, &id, *block_type),
            None => return tree.clone(),
        },
    };
    result.expect("operation on an existing block must succeed").tree
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    #[test]
    fn ids_stay_unique(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let engine = MutationEngine::new(SequentialIds::new());
        let mut tree = BlockTree::new();
        for op in &ops {
            tree = apply(&engine, &tree, op);
            let ids: Vec<String> = tree.flatten().map(|b| b.id.clone()).collect();
            let unique: HashSet<&String> = ids.iter().collect();
            prop_assert_eq!(unique.len(), ids.len(), "duplicate id after {:?}", op);
            prop_assert!(tree.validate().is_ok(), "inconsistent tree after {:?}", op);
        }
    }

    #[test]
    fn move_preserves_relative_order(count in 1..10usize, from in 0..10usize, to in 0..20usize) {
        let engine = MutationEngine::new(SequentialIds::new());
        let nodes: Vec<BlockNode> = (0..count)
            .map(|i| BlockNode::new(format!("b{i}"), BlockType::Paragraph, BlockContent::text("")))
            .collect();
        let tree = BlockTree::from_nodes(nodes).unwrap();
        let id = format!("b{}", from % count);

        let next = engine.move_block(&tree, &id, to).unwrap().tree;
        let expected_index = to.min(count - 1);
        prop_assert_eq!(next.index_of(&id).unwrap(), expected_index);

        let others_before: Vec<&String> = tree.top_level().iter().filter(|s| **s != id).collect();
        let others_after: Vec<&String> = next.top_level().iter().filter(|s| **s != id).collect();
        prop_assert_eq!(others_before, others_after);
    }

    #[test]
    fn retype_round_trip_keeps_text(text in "[a-zA-Z0-9 ]{0,40}", start in text_type_strategy()) {
        let engine = MutationEngine::new(SequentialIds::new());
        let mut content = folio_core::registry::default_content(start);
        content.set_text(text.clone());
        let tree = BlockTree::from_nodes(vec![BlockNode::new("b", start, content)]).unwrap();

        let tree = engine.retype(&tree, "b", BlockType::Heading1).unwrap().tree;
        let tree = engine.retype(&tree, "b", BlockType::Paragraph).unwrap().tree;
        prop_assert_eq!(tree.find("b").unwrap().text(), Some(text.as_str()));
    }
}
