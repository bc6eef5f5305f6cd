//! Persisted row layout.
//!
//! Stores keep pages, blocks and database parts as flat rows ordered by an
//! integer `position` within each sibling set. Converting a snapshot to
//! records re-sequences every sibling set as `0..n`; converting back sorts
//! by position and rebuilds the nested structure.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use folio_api::{
    ApiError, BlockContent, BlockMetadata, BlockNode, BlockProperties, BlockTree, BlockType,
    ColumnsContent, DatabaseContent, DatabaseProperty, DatabaseRow, DatabaseView, Page,
    PageMetadata, PropertyOptions, PropertyType, ViewFilter, ViewSort, ViewType,
};
use serde::{Deserialize, Serialize};

use crate::pages::PageTree;
use crate::Result;

fn store_error(context: &str, err: impl std::fmt::Display) -> ApiError {
    ApiError::StoreError {
        message: format!("{context}: {err}"),
    }
}

// =============================================================================
// Blocks
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub id: String,
    pub page_id: String,
    /// Owning toggle or columns block; `None` at the page's top level
    pub parent_block_id: Option<String>,
    /// Column index when the parent is a `columns` block
    pub column: Option<usize>,
    /// Persisted type tag
    pub block_type: String,
    pub content: serde_json::Value,
    pub properties: serde_json::Value,
    pub position: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Flatten a page's block tree into rows.
pub fn tree_to_records(page_id: &str, tree: &BlockTree) -> Result<Vec<BlockRecord>> {
    let mut out = Vec::with_capacity(tree.total_len());
    for (position, node) in tree.to_nodes().into_iter().enumerate() {
        push_node(page_id, None, None, position, node, &mut out)?;
    }
    Ok(out)
}

fn push_node(
    page_id: &str,
    parent: Option<&str>,
    column: Option<usize>,
    position: usize,
    node: BlockNode,
    out: &mut Vec<BlockRecord>,
) -> Result<()> {
    let BlockNode {
        id,
        block_type,
        content,
        properties,
        children,
        metadata,
    } = node;

    // Column trees are stored as their own rows; the payload keeps the count
    let (content, columns) = match content {
        BlockContent::Columns(cols) => (
            BlockContent::Columns(ColumnsContent {
                column_count: cols.column_count,
                columns: Vec::new(),
            }),
            cols.columns,
        ),
        other => (other, Vec::new()),
    };

    out.push(BlockRecord {
        id: id.clone(),
        page_id: page_id.to_string(),
        parent_block_id: parent.map(str::to_string),
        column,
        block_type: block_type.to_string(),
        content: serde_json::to_value(&content).map_err(|e| store_error("encode content", e))?,
        properties: serde_json::to_value(&properties)
            .map_err(|e| store_error("encode properties", e))?,
        position: position as i64,
        created_at: metadata.created_at,
        updated_at: metadata.updated_at,
    });

    for (index, column_tree) in columns.iter().enumerate() {
        for (pos, child) in column_tree.to_nodes().into_iter().enumerate() {
            push_node(page_id, Some(&id), Some(index), pos, child, out)?;
        }
    }
    for (pos, child) in children.into_iter().enumerate() {
        push_node(page_id, Some(&id), None, pos, child, out)?;
    }
    Ok(())
}

/// Rebuild a block tree from rows. Rows of other pages must be filtered out
/// by the caller; unknown type tags fail with `UnknownBlockType`.
pub fn records_to_tree(records: &[BlockRecord]) -> Result<BlockTree> {
    let mut groups: HashMap<(Option<&str>, Option<usize>), Vec<&BlockRecord>> = HashMap::new();
    for record in records {
        groups
            .entry((record.parent_block_id.as_deref(), record.column))
            .or_default()
            .push(record);
    }
    for group in groups.values_mut() {
        group.sort_by_key(|r| r.position);
    }

    let roots = build_level(&groups, None, None)?;
    let tree = BlockTree::from_nodes(roots)?;
    if tree.total_len() != records.len() {
        return Err(ApiError::StoreError {
            message: format!(
                "{} block rows but {} reachable from the page root",
                records.len(),
                tree.total_len()
            ),
        });
    }
    Ok(tree)
}

type Groups<'a> = HashMap<(Option<&'a str>, Option<usize>), Vec<&'a BlockRecord>>;

fn build_level(groups: &Groups<'_>, parent: Option<&str>, column: Option<usize>) -> Result<Vec<BlockNode>> {
    let Some(records) = groups.get(&(parent, column)) else {
        return Ok(Vec::new());
    };
    records.iter().map(|record| build_node(groups, record)).collect()
}

fn build_node(groups: &Groups<'_>, record: &BlockRecord) -> Result<BlockNode> {
    let block_type: BlockType = record.block_type.parse()?;
    let mut content = BlockContent::from_json(block_type, record.content.clone())?;
    if let BlockContent::Columns(cols) = &mut content {
        let mut columns = Vec::with_capacity(cols.column_count);
        for index in 0..cols.column_count {
            let nodes = build_level(groups, Some(&record.id), Some(index))?;
            columns.push(BlockTree::from_nodes(nodes)?);
        }
        cols.columns = columns;
    }
    let properties: BlockProperties = if record.properties.is_null() {
        BlockProperties::default()
    } else {
        serde_json::from_value(record.properties.clone())
            .map_err(|e| store_error("decode block properties", e))?
    };

    Ok(BlockNode {
        id: record.id.clone(),
        block_type,
        content,
        properties,
        children: build_level(groups, Some(&record.id), None)?,
        metadata: BlockMetadata {
            created_at: record.created_at,
            updated_at: record.updated_at,
        },
    })
}

// =============================================================================
// Pages
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: String,
    pub title: String,
    pub icon: Option<String>,
    pub cover: Option<String>,
    pub parent_id: Option<String>,
    pub position: i64,
    pub is_favorite: bool,
    pub is_public: bool,
    pub owner: String,
    pub tags: Vec<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Page rows in pre-order, without block content.
pub fn pages_to_records(pages: &PageTree) -> Vec<PageRecord> {
    let mut positions: HashMap<&str, i64> = HashMap::new();
    for (pos, id) in pages.roots().iter().enumerate() {
        positions.insert(id, pos as i64);
    }
    let flat = pages.flatten();
    for page in &flat {
        for (pos, child) in page.children.iter().enumerate() {
            positions.insert(child, pos as i64);
        }
    }

    flat.into_iter()
        .map(|page| PageRecord {
            id: page.id.clone(),
            title: page.title.clone(),
            icon: page.icon.clone(),
            cover: page.cover.clone(),
            parent_id: page.parent_id.clone(),
            position: positions.get(page.id.as_str()).copied().unwrap_or_default(),
            is_favorite: page.is_favorite,
            is_public: page.is_public,
            owner: page.created_by.clone(),
            tags: page.metadata.tags.clone(),
            description: page.metadata.description.clone(),
            created_at: page.created_at,
            updated_at: page.updated_at,
        })
        .collect()
}

/// Rebuild the page hierarchy (block content left empty).
pub fn records_to_pages(records: &[PageRecord]) -> Result<PageTree> {
    let mut sorted: Vec<&PageRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.position);

    let mut children: HashMap<&str, Vec<String>> = HashMap::new();
    for record in &sorted {
        if let Some(parent) = record.parent_id.as_deref() {
            children.entry(parent).or_default().push(record.id.clone());
        }
    }

    let pages = sorted
        .iter()
        .map(|record| Page {
            id: record.id.clone(),
            title: record.title.clone(),
            icon: record.icon.clone(),
            cover: record.cover.clone(),
            parent_id: record.parent_id.clone(),
            children: children.remove(record.id.as_str()).unwrap_or_default(),
            is_favorite: record.is_favorite,
            is_public: record.is_public,
            created_at: record.created_at,
            updated_at: record.updated_at,
            created_by: record.owner.clone(),
            content: BlockTree::new(),
            metadata: PageMetadata {
                tags: record.tags.clone(),
                description: record.description.clone(),
            },
        })
        .collect();
    PageTree::from_pages(pages)
}

// =============================================================================
// Databases
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: String,
    pub name: String,
    pub property_type: PropertyType,
    pub options: Option<PropertyOptions>,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowRecord {
    pub id: String,
    pub properties: serde_json::Value,
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewRecord {
    pub id: String,
    pub name: String,
    pub view_type: ViewType,
    pub filters: Vec<ViewFilter>,
    pub sorts: Vec<ViewSort>,
    pub group_by: Option<String>,
    pub position: i64,
}

/// Database parts keyed by the owning block id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseRecord {
    pub database_id: String,
    pub title: String,
    pub description: Option<String>,
    pub current_view: Option<String>,
    pub properties: Vec<PropertyRecord>,
    pub rows: Vec<RowRecord>,
    pub views: Vec<ViewRecord>,
}

impl DatabaseRecord {
    pub fn from_content(database_id: &str, content: &DatabaseContent) -> Result<Self> {
        let rows = content
            .rows
            .iter()
            .enumerate()
            .map(|(pos, row)| {
                Ok(RowRecord {
                    id: row.id.clone(),
                    properties: serde_json::to_value(&row.properties)
                        .map_err(|e| store_error("encode row", e))?,
                    position: pos as i64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            database_id: database_id.to_string(),
            title: content.title.clone(),
            description: content.description.clone(),
            current_view: content.current_view.clone(),
            properties: content
                .properties
                .iter()
                .enumerate()
                .map(|(pos, p)| PropertyRecord {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    property_type: p.property_type,
                    options: p.options.clone(),
                    position: pos as i64,
                })
                .collect(),
            rows,
            views: content
                .views
                .iter()
                .enumerate()
                .map(|(pos, v)| ViewRecord {
                    id: v.id.clone(),
                    name: v.name.clone(),
                    view_type: v.view_type,
                    filters: v.filters.clone(),
                    sorts: v.sorts.clone(),
                    group_by: v.group_by.clone(),
                    position: pos as i64,
                })
                .collect(),
        })
    }

    pub fn into_content(self) -> Result<DatabaseContent> {
        let DatabaseRecord {
            title,
            description,
            current_view,
            mut properties,
            mut rows,
            mut views,
            ..
        } = self;
        properties.sort_by_key(|p| p.position);
        rows.sort_by_key(|r| r.position);
        views.sort_by_key(|v| v.position);

        let rows = rows
            .into_iter()
            .map(|r| {
                let properties = if r.properties.is_null() {
                    HashMap::new()
                } else {
                    serde_json::from_value(r.properties).map_err(|e| store_error("decode row", e))?
                };
                Ok(DatabaseRow { id: r.id, properties })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(DatabaseContent {
            title,
            description,
            properties: properties
                .into_iter()
                .map(|p| DatabaseProperty {
                    id: p.id,
                    name: p.name,
                    property_type: p.property_type,
                    options: p.options,
                })
                .collect(),
            rows,
            views: views
                .into_iter()
                .map(|v| DatabaseView {
                    id: v.id,
                    name: v.name,
                    view_type: v.view_type,
                    filters: v.filters,
                    sorts: v.sorts,
                    group_by: v.group_by,
                })
                .collect(),
            current_view,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_api::Value;

    fn nested_tree() -> BlockTree {
        let left = BlockTree::from_nodes(vec![BlockNode::new(
            "l1",
            BlockType::Paragraph,
            BlockContent::text("left"),
        )])
        .unwrap();
        BlockTree::from_nodes(vec![
            BlockNode::new("h", BlockType::Heading1, BlockContent::text("Title")),
            BlockNode::new("t", BlockType::Toggle, BlockContent::text("more")).with_children(vec![
                BlockNode::new("t1", BlockType::Quote, BlockContent::text("inside")),
            ]),
            BlockNode::new(
                "cols",
                BlockType::Columns,
                BlockContent::Columns(ColumnsContent {
                    column_count: 2,
                    columns: vec![left, BlockTree::new()],
                }),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_block_records_positions_per_sibling_set() {
        let records = tree_to_records("page", &nested_tree()).unwrap();
        assert_eq!(records.len(), 5);
        let by_id: HashMap<&str, &BlockRecord> =
            records.iter().map(|r| (r.id.as_str(), r)).collect();
        assert_eq!(by_id["cols"].position, 2);
        assert_eq!(by_id["t1"].position, 0);
        assert_eq!(by_id["t1"].parent_block_id.as_deref(), Some("t"));
        assert_eq!(by_id["l1"].column, Some(0));
        assert_eq!(by_id["cols"].content["columns"], serde_json::json!([]));
    }

    #[test]
    fn test_block_records_rebuild_tree() {
        let tree = nested_tree();
        let mut records = tree_to_records("page", &tree).unwrap();
        records.reverse();
        assert_eq!(records_to_tree(&records).unwrap(), tree);
    }

    #[test]
    fn test_unknown_tag_is_reported() {
        let mut records = tree_to_records("page", &nested_tree()).unwrap();
        records[0].block_type = "hologram".to_string();
        assert_eq!(
            records_to_tree(&records),
            Err(ApiError::UnknownBlockType {
                tag: "hologram".into()
            })
        );
    }

    #[test]
    fn test_orphan_rows_are_rejected() {
        let mut records = tree_to_records("page", &nested_tree()).unwrap();
        records.retain(|r| r.id != "t");
        assert!(matches!(
            records_to_tree(&records),
            Err(ApiError::StoreError { .. })
        ));
    }

    #[test]
    fn test_database_record_keeps_order() {
        let mut content = DatabaseContent::default();
        content.properties.push(DatabaseProperty::new("a", "A", PropertyType::Text));
        content.properties.push(DatabaseProperty::new("b", "B", PropertyType::Number));
        let mut row = DatabaseRow::new("r1");
        row.properties.insert("a".into(), Value::from("x"));
        content.rows.push(row);

        let mut record = DatabaseRecord::from_content("db", &content).unwrap();
        assert_eq!(record.properties[1].position, 1);
        record.properties.reverse();
        assert_eq!(record.into_content().unwrap(), content);
    }
}
