//! Arena-backed block tree
//!
//! A `BlockTree` is the ordered content of one page, or of one nested
//! container (a column of a `columns` block). Blocks live in a flat map keyed
//! by id; ordering is expressed only by the `order` list (top level) and each
//! block's `children` list. There is no rank field.
//!
//! Column trees hang off their `columns` block's content. Lookups by id
//! (`find`, `index_of`, `locate`) descend into them, so a page's ids must be
//! unique across all of its nested trees.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::block::{Block, BlockContent, BlockNode};
use crate::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(into = "Vec<BlockNode>", try_from = "Vec<BlockNode>")]
pub struct BlockTree {
    /// All blocks of this tree by id
    blocks: HashMap<String, Block>,
    /// Top-level block ids in display order
    order: Vec<String>,
}

impl BlockTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from nested nodes. Fails with `DuplicateId` if any id
    /// (including ids inside column trees) appears twice.
    pub fn from_nodes(nodes: Vec<BlockNode>) -> Result<Self, ApiError> {
        let mut tree = BlockTree::new();
        for node in nodes {
            let id = node.id.clone();
            if tree.blocks.contains_key(&id) {
                return Err(ApiError::DuplicateId { id });
            }
            tree.insert_node(None, node)?;
            tree.order.push(id);
        }
        tree.ensure_unique_ids()?;
        Ok(tree)
    }

    /// Nested form of the whole tree, in display order.
    pub fn to_nodes(&self) -> Vec<BlockNode> {
        self.order
            .iter()
            .filter_map(|id| self.subtree_node(id))
            .collect()
    }

    /// Nested copy of the subtree rooted at `id` (this tree's arena only).
    pub fn subtree_node(&self, id: &str) -> Option<BlockNode> {
        let block = self.blocks.get(id)?;
        Some(BlockNode {
            id: block.id.clone(),
            block_type: block.block_type,
            content: block.content.clone(),
            properties: block.properties.clone(),
            children: block
                .children
                .iter()
                .filter_map(|child| self.subtree_node(child))
                .collect(),
            metadata: block.metadata.clone(),
        })
    }

    // ===== Queries =====

    /// No top-level blocks.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of blocks in this tree's arena (excluding column trees).
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Top-level block ids in display order.
    pub fn top_level(&self) -> &[String] {
        &self.order
    }

    /// Top-level blocks in display order.
    pub fn top_level_blocks(&self) -> impl Iterator<Item = &Block> {
        self.order.iter().filter_map(|id| self.blocks.get(id))
    }

    /// Block from this tree's own arena.
    pub fn get(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    /// Whether `id` is anywhere in this tree, column trees included.
    pub fn contains(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    /// Find a block anywhere in the tree (toggle bodies and columns included).
    pub fn find(&self, id: &str) -> Result<&Block, ApiError> {
        self.locate(id)
            .and_then(|tree| tree.blocks.get(id))
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })
    }

    /// Position of a block among its siblings.
    pub fn index_of(&self, id: &str) -> Result<usize, ApiError> {
        let siblings = self.siblings(id)?;
        siblings
            .iter()
            .position(|s| s == id)
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })
    }

    /// Ids of the sibling list that contains `id` (itself included).
    pub fn siblings(&self, id: &str) -> Result<&[String], ApiError> {
        let not_found = || ApiError::BlockNotFound { id: id.to_string() };
        let tree = self.locate(id).ok_or_else(not_found)?;
        let block = tree.blocks.get(id).ok_or_else(not_found)?;
        match &block.parent_id {
            None => Ok(&tree.order),
            Some(parent) => tree
                .blocks
                .get(parent)
                .map(|p| p.children.as_slice())
                .ok_or_else(not_found),
        }
    }

    /// Direct children of a container block, in order.
    pub fn children(&self, id: &str) -> Result<Vec<&Block>, ApiError> {
        let tree = self
            .locate(id)
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })?;
        let block = tree.find(id)?;
        Ok(block
            .children
            .iter()
            .filter_map(|child| tree.blocks.get(child))
            .collect())
    }

    /// Pre-order traversal of every block, nested ones included.
    ///
    /// Each call yields a fresh iterator; nothing is cached between calls.
    pub fn flatten(&self) -> Flatten<'_> {
        Flatten {
            stack: vec![(self, self.order.iter())],
        }
    }

    /// Total block count including toggle bodies and column trees.
    pub fn total_len(&self) -> usize {
        self.flatten().count()
    }

    /// Ids of the subtree rooted at `id` in pre-order, `id` first.
    /// Column trees nested below are included.
    pub fn subtree_ids(&self, id: &str) -> Result<Vec<String>, ApiError> {
        let tree = self
            .locate(id)
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })?;
        let mut out = Vec::new();
        tree.collect_subtree_ids(id, &mut out);
        Ok(out)
    }

    fn collect_subtree_ids(&self, id: &str, out: &mut Vec<String>) {
        let Some(block) = self.blocks.get(id) else {
            return;
        };
        out.push(block.id.clone());
        for column in block.nested_trees() {
            out.extend(column.flatten().map(|b| b.id.clone()));
        }
        for child in &block.children {
            self.collect_subtree_ids(child, out);
        }
    }

    /// The tree (this one or a nested column tree) whose arena holds `id`.
    pub fn locate(&self, id: &str) -> Option<&BlockTree> {
        if self.blocks.contains_key(id) {
            return Some(self);
        }
        self.blocks
            .values()
            .flat_map(|block| block.nested_trees())
            .find_map(|column| column.locate(id))
    }

    /// Mutable variant of [`BlockTree::locate`].
    pub fn locate_mut(&mut self, id: &str) -> Option<&mut BlockTree> {
        if self.blocks.contains_key(id) {
            return Some(self);
        }
        for block in self.blocks.values_mut() {
            if let BlockContent::Columns(cols) = &mut block.content {
                for column in cols.columns.iter_mut() {
                    if let Some(tree) = column.locate_mut(id) {
                        return Some(tree);
                    }
                }
            }
        }
        None
    }

    // ===== Consistency =====

    /// Fails with `DuplicateId` on the first id seen twice in pre-order.
    pub fn ensure_unique_ids(&self) -> Result<(), ApiError> {
        let mut seen = HashSet::new();
        for block in self.flatten() {
            if !seen.insert(block.id.as_str()) {
                return Err(ApiError::DuplicateId {
                    id: block.id.clone(),
                });
            }
        }
        Ok(())
    }

    /// Check every structural invariant: unique ids, each block reachable
    /// exactly once from the ordering lists, parent links agreeing with
    /// children lists, content shapes matching block types, and rectangular
    /// tables.
    pub fn validate(&self) -> Result<(), ApiError> {
        self.ensure_unique_ids()?;
        self.validate_arena()
    }

    fn validate_arena(&self) -> Result<(), ApiError> {
        let broken = |message: String| ApiError::InvalidOperation { message };

        let mut reachable = 0usize;
        for id in &self.order {
            let block = self
                .blocks
                .get(id)
                .ok_or_else(|| broken(format!("top-level id {id} missing from arena")))?;
            if block.parent_id.is_some() {
                return Err(broken(format!("top-level block {id} has a parent")));
            }
            reachable += self.count_reachable(id)?;
        }
        if reachable != self.blocks.len() {
            return Err(broken(format!(
                "{} blocks in arena but {} reachable",
                self.blocks.len(),
                reachable
            )));
        }

        for block in self.blocks.values() {
            if !block.content_matches_type() {
                return Err(ApiError::InvalidContent {
                    block_type: block.block_type.to_string(),
                    message: format!("block {} carries a {:?} payload", block.id, block.content.family()),
                });
            }
            if let BlockContent::Table(table) = &block.content {
                if !table.is_rectangular() {
                    return Err(broken(format!("table {} has ragged rows", block.id)));
                }
            }
            for column in block.nested_trees() {
                column.validate_arena()?;
            }
        }
        Ok(())
    }

    fn count_reachable(&self, id: &str) -> Result<usize, ApiError> {
        let block = self.blocks.get(id).ok_or_else(|| ApiError::InvalidOperation {
            message: format!("child id {id} missing from arena"),
        })?;
        let mut count = 1;
        for child in &block.children {
            let child_block = self.blocks.get(child).ok_or_else(|| ApiError::InvalidOperation {
                message: format!("child id {child} missing from arena"),
            })?;
            if child_block.parent_id.as_deref() != Some(id) {
                return Err(ApiError::InvalidOperation {
                    message: format!("block {child} does not point back to parent {id}"),
                });
            }
            count += self.count_reachable(child)?;
        }
        Ok(count)
    }

    // ===== Structural primitives (this tree's arena only) =====

    /// Mutable access to a block of this tree's own arena.
    pub fn block_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    /// Insert a nested node (and its descendants) under `parent` at `index`
    /// (clamped to the sibling count). All-or-nothing: incoming ids are
    /// checked against the whole tree before anything is inserted.
    pub fn graft(
        &mut self,
        parent: Option<&str>,
        index: usize,
        node: BlockNode,
    ) -> Result<String, ApiError> {
        if let Some(parent_id) = parent {
            if !self.blocks.contains_key(parent_id) {
                return Err(ApiError::BlockNotFound {
                    id: parent_id.to_string(),
                });
            }
        }

        let mut incoming = HashSet::new();
        for id in node.ids() {
            if !incoming.insert(id) || self.contains(id) {
                return Err(ApiError::DuplicateId { id: id.to_string() });
            }
        }

        let id = node.id.clone();
        self.insert_node(parent, node)?;
        let siblings = self.siblings_mut(parent)?;
        let index = index.min(siblings.len());
        siblings.insert(index, id.clone());
        Ok(id)
    }

    /// Remove the subtree rooted at `id` and hand it back in nested form.
    pub fn detach(&mut self, id: &str) -> Result<BlockNode, ApiError> {
        let parent = self
            .blocks
            .get(id)
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })?
            .parent_id
            .clone();
        self.siblings_mut(parent.as_deref())?.retain(|s| s != id);
        self.take_node(id)
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })
    }

    /// Move `id` to `target` among its current siblings. `target` is
    /// clamped into range; the final index is returned.
    pub fn reorder(&mut self, id: &str, target: usize) -> Result<usize, ApiError> {
        let parent = self
            .blocks
            .get(id)
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })?
            .parent_id
            .clone();
        let siblings = self.siblings_mut(parent.as_deref())?;
        let from = siblings
            .iter()
            .position(|s| s == id)
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })?;
        let moved = siblings.remove(from);
        let to = target.min(siblings.len());
        siblings.insert(to, moved);
        Ok(to)
    }

    fn siblings_mut(&mut self, parent: Option<&str>) -> Result<&mut Vec<String>, ApiError> {
        match parent {
            None => Ok(&mut self.order),
            Some(parent_id) => self
                .blocks
                .get_mut(parent_id)
                .map(|p| &mut p.children)
                .ok_or_else(|| ApiError::BlockNotFound {
                    id: parent_id.to_string(),
                }),
        }
    }

    fn insert_node(&mut self, parent: Option<&str>, node: BlockNode) -> Result<(), ApiError> {
        let BlockNode {
            id,
            block_type,
            content,
            properties,
            children,
            metadata,
        } = node;

        let child_ids: Vec<String> = children.iter().map(|c| c.id.clone()).collect();
        self.blocks.insert(
            id.clone(),
            Block {
                id: id.clone(),
                parent_id: parent.map(str::to_string),
                block_type,
                content,
                properties,
                children: child_ids,
                metadata,
            },
        );
        for child in children {
            if self.blocks.contains_key(&child.id) {
                return Err(ApiError::DuplicateId { id: child.id });
            }
            self.insert_node(Some(&id), child)?;
        }
        Ok(())
    }

    fn take_node(&mut self, id: &str) -> Option<BlockNode> {
        let block = self.blocks.remove(id)?;
        let children = block
            .children
            .iter()
            .filter_map(|child| self.take_node(child))
            .collect();
        Some(BlockNode {
            id: block.id,
            block_type: block.block_type,
            content: block.content,
            properties: block.properties,
            children,
            metadata: block.metadata,
        })
    }
}

impl From<BlockTree> for Vec<BlockNode> {
    fn from(tree: BlockTree) -> Self {
        tree.to_nodes()
    }
}

impl TryFrom<Vec<BlockNode>> for BlockTree {
    type Error = ApiError;

    fn try_from(nodes: Vec<BlockNode>) -> Result<Self, Self::Error> {
        BlockTree::from_nodes(nodes)
    }
}

/// Lazy pre-order iterator returned by [`BlockTree::flatten`].
///
/// A block is followed by its toggle children, then by the contents of each
/// of its columns, left to right.
pub struct Flatten<'a> {
    stack: Vec<(&'a BlockTree, std::slice::Iter<'a, String>)>,
}

impl<'a> Iterator for Flatten<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<&'a Block> {
        loop {
            let (tree, ids) = self.stack.last_mut()?;
            let tree: &'a BlockTree = *tree;
            match ids.next() {
                Some(id) => {
                    let Some(block) = tree.blocks.get(id) else {
                        continue;
                    };
                    for column in block.nested_trees().iter().rev() {
                        self.stack.push((column, column.order.iter()));
                    }
                    if !block.children.is_empty() {
                        self.stack.push((tree, block.children.iter()));
                    }
                    return Some(block);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockType, ColumnsContent};

    fn text(id: &str, s: &str) -> BlockNode {
        BlockNode::new(id, BlockType::Paragraph, BlockContent::text(s))
    }

    fn toggle(id: &str, children: Vec<BlockNode>) -> BlockNode {
        BlockNode::new(id, BlockType::Toggle, BlockContent::text("toggle")).with_children(children)
    }

    fn columns(id: &str, cols: Vec<Vec<BlockNode>>) -> BlockNode {
        let columns = cols
            .into_iter()
            .map(|nodes| BlockTree::from_nodes(nodes).unwrap())
            .collect::<Vec<_>>();
        BlockNode::new(
            id,
            BlockType::Columns,
            BlockContent::Columns(ColumnsContent {
                column_count: columns.len(),
                columns,
            }),
        )
    }

    fn sample() -> BlockTree {
        BlockTree::from_nodes(vec![
            text("a", "first"),
            toggle("t", vec![text("t1", "inner 1"), text("t2", "inner 2")]),
            columns("cols", vec![vec![text("l1", "left")], vec![text("r1", "right")]]),
            text("z", "last"),
        ])
        .unwrap()
    }

    #[test]
    fn test_flatten_is_pre_order() {
        let tree = sample();
        let ids: Vec<&str> = tree.flatten().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "t", "t1", "t2", "cols", "l1", "r1", "z"]);
        // Fresh iterator per call
        assert_eq!(tree.flatten().count(), 8);
        assert_eq!(tree.total_len(), 8);
    }

    #[test]
    fn test_find_descends_into_containers() {
        let tree = sample();
        assert_eq!(tree.find("t2").unwrap().text(), Some("inner 2"));
        assert_eq!(tree.find("r1").unwrap().text(), Some("right"));
        assert_eq!(tree.find("t2").unwrap().parent_id.as_deref(), Some("t"));
        assert!(matches!(
            tree.find("missing"),
            Err(ApiError::BlockNotFound { .. })
        ));
    }

    #[test]
    fn test_index_of_is_sibling_relative() {
        let tree = sample();
        assert_eq!(tree.index_of("a").unwrap(), 0);
        assert_eq!(tree.index_of("z").unwrap(), 3);
        assert_eq!(tree.index_of("t2").unwrap(), 1);
        assert_eq!(tree.index_of("r1").unwrap(), 0);
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let err = BlockTree::from_nodes(vec![text("a", "x"), text("a", "y")]).unwrap_err();
        assert_eq!(err, ApiError::DuplicateId { id: "a".into() });

        let err = BlockTree::from_nodes(vec![
            text("a", "x"),
            columns("cols", vec![vec![text("a", "shadow")]]),
        ])
        .unwrap_err();
        assert_eq!(err, ApiError::DuplicateId { id: "a".into() });
    }

    #[test]
    fn test_graft_and_detach() {
        let mut tree = sample();
        tree.graft(Some("t"), 1, text("t1b", "between")).unwrap();
        let order: Vec<&str> = tree
            .children("t")
            .unwrap()
            .iter()
            .map(|b| b.id.as_str())
            .collect();
        assert_eq!(order, vec!["t1", "t1b", "t2"]);

        let node = tree.detach("t").unwrap();
        assert_eq!(node.children.len(), 3);
        assert!(!tree.contains("t1"));
        assert!(tree.validate().is_ok());

        let err = tree.graft(None, 0, text("a", "dup")).unwrap_err();
        assert_eq!(err, ApiError::DuplicateId { id: "a".into() });
    }

    #[test]
    fn test_reorder_clamps() {
        let mut tree = sample();
        assert_eq!(tree.reorder("a", 99).unwrap(), 3);
        assert_eq!(tree.top_level(), &["t", "cols", "z", "a"]);
    }

    #[test]
    fn test_serde_uses_nested_form() {
        let tree = sample();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json[1]["children"][0]["id"], "t1");
        assert_eq!(json[2]["content"]["columns"][1][0]["id"], "r1");
        assert_eq!(json[2]["content"]["columnCount"], 2);

        let back: BlockTree = serde_json::from_value(json).unwrap();
        assert_eq!(back, tree);
        assert!(back.validate().is_ok());
    }
}
