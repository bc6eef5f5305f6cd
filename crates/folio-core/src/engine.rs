//! Block mutation engine
//!
//! Every editing primitive takes a tree snapshot by reference and returns an
//! [`Edit`] holding a new snapshot. The input is never modified, so a failed
//! call leaves the caller with its previous, still-valid tree.
//!
//! Blocks are addressed by id anywhere in the page, including inside toggle
//! bodies and column trees; the structural change is applied to whichever
//! tree's arena holds the block.

use std::collections::HashSet;

use folio_api::{
    ApiError, Block, BlockContent, BlockMetadata, BlockNode, BlockProperties, BlockTree,
    BlockType, ColumnsContent,
};
use tracing::{debug, warn};

use crate::ids::{IdGenerator, UuidIds};
use crate::registry;
use crate::table::{self, TableOp};
use crate::Result;

/// Outcome of an edit: the new snapshot and the block the editing surface
/// should focus next, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub tree: BlockTree,
    pub focus: Option<String>,
}

impl Edit {
    fn new(tree: BlockTree, focus: Option<String>) -> Self {
        Self { tree, focus }
    }
}

/// Stateless editing primitives, parameterized over the id source.
#[derive(Debug, Clone, Default)]
pub struct MutationEngine<G = UuidIds> {
    ids: G,
}

impl<G: IdGenerator> MutationEngine<G> {
    pub fn new(ids: G) -> Self {
        Self { ids }
    }

    pub fn ids(&self) -> &G {
        &self.ids
    }

    /// A fresh block of `block_type` with the registry's default content.
    pub fn new_block(&self, block_type: BlockType) -> BlockNode {
        let mut node = BlockNode::new(
            self.ids.next_id(),
            block_type,
            registry::default_content(block_type),
        );
        node.metadata = BlockMetadata::now();
        node
    }

    /// Insert a new block right after `after`, or at index 0 of the top level
    /// when no anchor is given.
    pub fn insert(
        &self,
        tree: &BlockTree,
        after: Option<&str>,
        block_type: BlockType,
    ) -> Result<Edit> {
        let node = self.new_block(block_type);
        let mut next = tree.clone();
        let id = graft_after(&mut next, after, node)?;
        debug!(op = "insert", block_id = %id, block_type = %block_type, "Inserted block");
        Ok(Edit::new(next, Some(id)))
    }

    /// Append a new block to the body of a container block.
    pub fn insert_child(
        &self,
        tree: &BlockTree,
        parent_id: &str,
        block_type: BlockType,
    ) -> Result<Edit> {
        let parent = tree.find(parent_id).map_err(|_| ApiError::AnchorNotFound {
            id: parent_id.to_string(),
        })?;
        if !parent.block_type.is_container() {
            return Err(ApiError::invalid_operation(format!(
                "{} block {} cannot hold children",
                parent.block_type, parent_id
            )));
        }
        let index = parent.children.len();

        let node = self.new_block(block_type);
        let mut next = tree.clone();
        let arena = locate_mut(&mut next, parent_id)?;
        let id = arena.graft(Some(parent_id), index, node)?;
        debug!(op = "insert_child", block_id = %id, parent_id = %parent_id, "Inserted child block");
        Ok(Edit::new(next, Some(id)))
    }

    /// Splice every top-level block of `blocks` (with their subtrees) after
    /// `after`, keeping their order. Incoming ids must not already exist.
    pub fn insert_blocks(
        &self,
        tree: &BlockTree,
        after: Option<&str>,
        blocks: &BlockTree,
    ) -> Result<Edit> {
        if let Some(anchor) = after {
            if !tree.contains(anchor) {
                return Err(ApiError::AnchorNotFound {
                    id: anchor.to_string(),
                });
            }
        }
        blocks.ensure_unique_ids()?;
        if let Some(clash) = blocks.flatten().find(|b| tree.contains(&b.id)) {
            return Err(ApiError::DuplicateId {
                id: clash.id.clone(),
            });
        }

        let mut next = tree.clone();
        let mut anchor = after.map(str::to_string);
        for node in blocks.to_nodes() {
            let id = graft_after(&mut next, anchor.as_deref(), node)?;
            anchor = Some(id);
        }
        debug!(op = "insert_blocks", count = blocks.top_level().len(), "Inserted blocks");
        Ok(Edit::new(next, anchor))
    }

    /// Replace a block's content verbatim. Type and properties are untouched.
    /// Column trees in `content` must not reuse ids found elsewhere on the
    /// page.
    pub fn update(&self, tree: &BlockTree, id: &str, content: BlockContent) -> Result<Edit> {
        check_column_ids(tree, id, &content)?;
        let next = edit_block(tree, id, |block| {
            if content.family() != block.block_type.family() {
                warn!(
                    block_id = %id,
                    block_type = %block.block_type,
                    "Content shape {:?} does not match block type",
                    content.family()
                );
            }
            block.content = content;
            Ok(())
        })?;
        debug!(op = "update", block_id = %id, "Updated block content");
        Ok(Edit::new(next, Some(id.to_string())))
    }

    /// Change a block's type, re-materializing its content from the registry
    /// default. `text` is carried over when both shapes define it.
    ///
    /// Retyping a toggle into a non-container type hoists its children to
    /// the following sibling positions so none of them is lost.
    pub fn retype(&self, tree: &BlockTree, id: &str, new_type: BlockType) -> Result<Edit> {
        let mut next = edit_block(tree, id, |block| {
            let mut content = registry::default_content(new_type);
            if let Some(text) = block.content.as_text() {
                content.set_text(text);
            }
            block.block_type = new_type;
            block.content = content;
            Ok(())
        })?;

        if !new_type.is_container() {
            hoist_children(&mut next, id)?;
        }
        debug!(op = "retype", block_id = %id, block_type = %new_type, "Retyped block");
        Ok(Edit::new(next, Some(id.to_string())))
    }

    /// Remove a block and its whole subtree. An empty tree is a valid result.
    pub fn remove(&self, tree: &BlockTree, id: &str) -> Result<Edit> {
        let mut next = tree.clone();
        let arena = locate_mut(&mut next, id)?;
        let focus = {
            let parent = arena.find(id)?.parent_id.clone();
            let siblings = arena.siblings(id)?;
            let index = arena.index_of(id)?;
            if index > 0 {
                Some(siblings[index - 1].clone())
            } else if parent.is_some() {
                parent
            } else {
                siblings.get(1).cloned()
            }
        };
        let removed = arena.detach(id)?;
        debug!(op = "remove", block_id = %id, removed = removed.ids().len(), "Removed block");
        Ok(Edit::new(next, focus))
    }

    /// Deep-copy a block with fresh ids throughout and place the copy right
    /// after the original.
    pub fn duplicate(&self, tree: &BlockTree, id: &str) -> Result<Edit> {
        let mut next = tree.clone();
        let arena = locate_mut(&mut next, id)?;
        let original = arena
            .subtree_node(id)
            .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })?;
        let parent = arena.find(id)?.parent_id.clone();
        let index = arena.index_of(id)? + 1;

        let copy = fresh_copy(original, &self.ids)?;
        let copy_id = arena.graft(parent.as_deref(), index, copy)?;
        debug!(op = "duplicate", block_id = %id, copy_id = %copy_id, "Duplicated block");
        Ok(Edit::new(next, Some(copy_id)))
    }

    /// Move a block among its current siblings. `target` is clamped into
    /// `[0, sibling_count - 1]`.
    pub fn move_block(&self, tree: &BlockTree, id: &str, target: usize) -> Result<Edit> {
        let mut next = tree.clone();
        let index = locate_mut(&mut next, id)?.reorder(id, target)?;
        debug!(op = "move", block_id = %id, index, "Moved block");
        Ok(Edit::new(next, Some(id.to_string())))
    }

    /// Replace a block's display properties.
    pub fn set_properties(
        &self,
        tree: &BlockTree,
        id: &str,
        properties: BlockProperties,
    ) -> Result<Edit> {
        let next = edit_block(tree, id, |block| {
            block.properties = properties;
            Ok(())
        })?;
        debug!(op = "set_properties", block_id = %id, "Updated block properties");
        Ok(Edit::new(next, Some(id.to_string())))
    }

    /// Flip the `checked` flag of a checkbox block.
    pub fn toggle_checked(&self, tree: &BlockTree, id: &str) -> Result<Edit> {
        let next = edit_block(tree, id, |block| match &mut block.content {
            BlockContent::Checkbox(c) => {
                c.checked = !c.checked;
                Ok(())
            }
            _ => Err(ApiError::invalid_operation(format!(
                "{} block {} has no checked state",
                block.block_type, block.id
            ))),
        })?;
        debug!(op = "toggle_checked", block_id = %id, "Toggled checkbox");
        Ok(Edit::new(next, Some(id.to_string())))
    }

    /// Apply a simple-table edit to a `table` block.
    pub fn edit_table(&self, tree: &BlockTree, id: &str, op: &TableOp) -> Result<Edit> {
        let next = edit_block(tree, id, |block| {
            let block_type = block.block_type;
            let table_content = block.content.as_table_mut().ok_or_else(|| {
                ApiError::invalid_operation(format!("{block_type} block {id} is not a table"))
            })?;
            let mut edited = table_content.clone();
            table::apply(&mut edited, op)?;
            *table_content = edited;
            Ok(())
        })?;
        debug!(op = "edit_table", block_id = %id, table_op = op.name(), "Edited table");
        Ok(Edit::new(next, Some(id.to_string())))
    }
}

/// Whether a block counts as empty for backspace-to-delete.
///
/// Dividers are never empty. Shapes with a single editable string (`text`,
/// `code`, `formula`, `url`) are empty when it trims to nothing. Everything
/// else (tables, columns, databases, structural blocks) is never empty.
pub fn is_empty(block: &Block) -> bool {
    if block.block_type == BlockType::Divider {
        return false;
    }
    match block.content.primary_text() {
        Some(text) => text.trim().is_empty(),
        None => false,
    }
}

/// Copy of `node` where the block and every descendant (column trees
/// included) carries a freshly generated id.
pub fn fresh_copy<G: IdGenerator + ?Sized>(node: BlockNode, ids: &G) -> Result<BlockNode> {
    let BlockNode {
        block_type,
        content,
        properties,
        children,
        ..
    } = node;

    let content = match content {
        BlockContent::Columns(cols) => {
            let mut columns = Vec::with_capacity(cols.columns.len());
            for column in cols.columns {
                columns.push(fresh_tree(&column, ids)?);
            }
            BlockContent::Columns(ColumnsContent {
                column_count: cols.column_count,
                columns,
            })
        }
        other => other,
    };

    let mut copy = BlockNode::new(ids.next_id(), block_type, content);
    copy.properties = properties;
    copy.metadata = BlockMetadata::now();
    copy.children = children
        .into_iter()
        .map(|child| fresh_copy(child, ids))
        .collect::<Result<Vec<_>>>()?;
    Ok(copy)
}

/// Copy of a whole tree with fresh ids throughout.
pub fn fresh_tree<G: IdGenerator + ?Sized>(tree: &BlockTree, ids: &G) -> Result<BlockTree> {
    let nodes = tree
        .to_nodes()
        .into_iter()
        .map(|node| fresh_copy(node, ids))
        .collect::<Result<Vec<_>>>()?;
    BlockTree::from_nodes(nodes)
}

fn locate_mut<'a>(tree: &'a mut BlockTree, id: &str) -> Result<&'a mut BlockTree> {
    tree.locate_mut(id)
        .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })
}

/// Clone `tree`, apply `f` to block `id`, bump its `updated_at`.
fn edit_block<F>(tree: &BlockTree, id: &str, f: F) -> Result<BlockTree>
where
    F: FnOnce(&mut Block) -> Result<()>,
{
    let mut next = tree.clone();
    let block = locate_mut(&mut next, id)?
        .block_mut(id)
        .ok_or_else(|| ApiError::BlockNotFound { id: id.to_string() })?;
    f(block)?;
    block.metadata.touch();
    Ok(next)
}

/// Column trees about to replace the content of block `id` may only reuse
/// ids from the columns they replace; anything else already on the page is
/// a `DuplicateId`.
fn check_column_ids(tree: &BlockTree, id: &str, content: &BlockContent) -> Result<()> {
    let BlockContent::Columns(incoming) = content else {
        return Ok(());
    };
    let replaced: HashSet<&str> = tree
        .find(id)?
        .nested_trees()
        .iter()
        .flat_map(|column| column.flatten())
        .map(|b| b.id.as_str())
        .collect();

    let mut seen = HashSet::new();
    for block in incoming.columns.iter().flat_map(|column| column.flatten()) {
        let block_id = block.id.as_str();
        let clashes = block_id == id || (tree.contains(block_id) && !replaced.contains(block_id));
        if !seen.insert(block_id) || clashes {
            return Err(ApiError::DuplicateId {
                id: block_id.to_string(),
            });
        }
    }
    Ok(())
}

/// Insert `node` right after `after` in whichever tree holds it, or at the
/// start of the top level.
fn graft_after(tree: &mut BlockTree, after: Option<&str>, node: BlockNode) -> Result<String> {
    match after {
        None => tree.graft(None, 0, node),
        Some(anchor) => {
            // Ids must stay unique across the whole page, not just the arena
            // the node lands in.
            for id in node.ids() {
                if tree.contains(id) {
                    return Err(ApiError::DuplicateId { id: id.to_string() });
                }
            }
            let arena = tree.locate_mut(anchor).ok_or_else(|| ApiError::AnchorNotFound {
                id: anchor.to_string(),
            })?;
            let parent = arena.find(anchor)?.parent_id.clone();
            let index = arena.index_of(anchor)? + 1;
            arena.graft(parent.as_deref(), index, node)
        }
    }
}

/// Move the children of `id` to the sibling positions right after it.
fn hoist_children(tree: &mut BlockTree, id: &str) -> Result<()> {
    let arena = locate_mut(tree, id)?;
    let block = arena.find(id)?;
    if block.children.is_empty() {
        return Ok(());
    }
    let parent = block.parent_id.clone();
    let children = block.children.clone();
    let mut index = arena.index_of(id)? + 1;
    for child in children {
        let node = arena.detach(&child)?;
        arena.graft(parent.as_deref(), index, node)?;
        index += 1;
    }
    Ok(())
}
