//! Block type registry
//!
//! A total mapping from [`BlockType`] to the block's default content and its
//! slash-menu presentation. String tags are parsed through [`lookup`], which
//! fails with `UnknownBlockType` instead of falling back to a paragraph.

use folio_api::{
    BlockContent, BlockType, BookmarkContent, CalloutContent, CheckboxContent, CodeContent,
    ColumnsContent, DatabaseContent, DatabaseProperty, DatabaseView, EmptyContent, MathContent,
    MediaContent, PropertyType, TableContent, TextContent, ViewType,
};
use folio_api::{BlockTree, ContentFamily};

use crate::Result;

pub const DEFAULT_CALLOUT_ICON: &str = "💡";
pub const DEFAULT_CODE_LANGUAGE: &str = "plaintext";
pub const DEFAULT_COLUMN_COUNT: usize = 2;

/// Registry entry for one block type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    pub block_type: BlockType,
    /// Slash-menu group heading
    pub group: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

impl BlockSpec {
    /// Fresh default content for this type.
    pub fn default_content(&self) -> BlockContent {
        default_content(self.block_type)
    }
}

/// Registry entry for `block_type`. Total over the enumeration.
pub fn spec(block_type: BlockType) -> BlockSpec {
    let (group, label, icon, description) = match block_type {
        BlockType::Paragraph => ("Basic blocks", "Text", "type", "Just start writing with plain text."),
        BlockType::Heading1 => ("Basic blocks", "Heading 1", "heading-1", "Big section heading."),
        BlockType::Heading2 => ("Basic blocks", "Heading 2", "heading-2", "Medium section heading."),
        BlockType::Heading3 => ("Basic blocks", "Heading 3", "heading-3", "Small section heading."),
        BlockType::BulletedList => ("Basic blocks", "Bulleted list", "list", "Create a simple bulleted list."),
        BlockType::NumberedList => ("Basic blocks", "Numbered list", "list-ordered", "Create a list with numbering."),
        BlockType::Checkbox => ("Basic blocks", "To-do list", "check-square", "Track tasks with a to-do list."),
        BlockType::Toggle => ("Basic blocks", "Toggle list", "chevron-right", "Toggles can hide and show content inside."),
        BlockType::Quote => ("Basic blocks", "Quote", "quote", "Capture a quote."),
        BlockType::Callout => ("Basic blocks", "Callout", "message-square", "Make writing stand out."),
        BlockType::Divider => ("Basic blocks", "Divider", "minus", "Visually divide blocks."),
        BlockType::Image => ("Media", "Image", "image", "Upload or embed with a link."),
        BlockType::Video => ("Media", "Video", "video", "Embed from YouTube, Vimeo, etc."),
        BlockType::Audio => ("Media", "Audio", "music", "Embed an audio recording."),
        BlockType::File => ("Media", "File", "file-text", "Upload a file."),
        BlockType::Pdf => ("Media", "PDF", "file", "Embed a PDF document."),
        BlockType::Bookmark => ("Media", "Web bookmark", "bookmark", "Save a link as a visual bookmark."),
        BlockType::LinkPreview => ("Media", "Link preview", "link", "Show a rich preview of a link."),
        BlockType::DatabaseFull => ("Database", "Database - Full page", "database", "Add a database as a full page."),
        BlockType::DatabaseInline => ("Database", "Database - Inline", "table-2", "Add a database inside this page."),
        BlockType::Table => ("Advanced blocks", "Table", "table", "Add a simple table."),
        BlockType::Code => ("Advanced blocks", "Code", "code", "Capture a code snippet."),
        BlockType::Math => ("Advanced blocks", "Math equation", "calculator", "Display mathematical expressions."),
        BlockType::Columns => ("Advanced blocks", "Columns", "columns", "Create columns of content."),
        BlockType::Breadcrumb => ("Advanced blocks", "Breadcrumb", "navigation", "Show where this page sits."),
        BlockType::TableOfContents => ("Advanced blocks", "Table of contents", "list-tree", "Outline the headings of this page."),
        BlockType::Template => ("Advanced blocks", "Template button", "copy", "Insert a reusable set of blocks."),
    };

    BlockSpec {
        block_type,
        group,
        label,
        icon,
        description,
    }
}

/// Parse a persisted tag and return its entry.
pub fn lookup(tag: &str) -> Result<BlockSpec> {
    let block_type: BlockType = tag.parse()?;
    Ok(spec(block_type))
}

/// Every registry entry, in enumeration order.
pub fn all() -> impl Iterator<Item = BlockSpec> {
    BlockType::ALL.into_iter().map(spec)
}

/// Default content for a block type. Every call builds a new value.
pub fn default_content(block_type: BlockType) -> BlockContent {
    match block_type.family() {
        ContentFamily::Text => BlockContent::Text(TextContent::default()),
        ContentFamily::Checkbox => BlockContent::Checkbox(CheckboxContent::default()),
        ContentFamily::Callout => BlockContent::Callout(CalloutContent {
            icon: DEFAULT_CALLOUT_ICON.to_string(),
            ..Default::default()
        }),
        ContentFamily::Code => BlockContent::Code(CodeContent {
            code: String::new(),
            language: DEFAULT_CODE_LANGUAGE.to_string(),
        }),
        ContentFamily::Math => BlockContent::Math(MathContent::default()),
        ContentFamily::Media => BlockContent::Media(MediaContent::default()),
        ContentFamily::Bookmark => BlockContent::Bookmark(BookmarkContent::default()),
        ContentFamily::Table => BlockContent::Table(TableContent {
            headers: vec!["Column 1".to_string(), "Column 2".to_string()],
            rows: vec![vec![String::new(), String::new()]],
            has_header: true,
        }),
        ContentFamily::Columns => BlockContent::Columns(ColumnsContent {
            column_count: DEFAULT_COLUMN_COUNT,
            columns: vec![BlockTree::new(); DEFAULT_COLUMN_COUNT],
        }),
        ContentFamily::Database => BlockContent::Database(default_database()),
        ContentFamily::Empty => BlockContent::Empty(EmptyContent {}),
    }
}

fn default_database() -> DatabaseContent {
    DatabaseContent {
        title: "Untitled".to_string(),
        description: None,
        properties: vec![DatabaseProperty::new("title", "Name", PropertyType::Title)],
        rows: Vec::new(),
        views: vec![DatabaseView::new("default", "Table", ViewType::Table)],
        current_view: Some("default".to_string()),
    }
}

/// Slash-menu filtering: entries whose label or description contains
/// `query`, case-insensitively. An empty query matches everything.
pub fn search(query: &str) -> Vec<BlockSpec> {
    let query = query.trim().to_lowercase();
    all()
        .filter(|entry| {
            query.is_empty()
                || entry.label.to_lowercase().contains(&query)
                || entry.description.to_lowercase().contains(&query)
        })
        .collect()
}

/// Entries grouped by slash-menu heading, groups in first-seen order.
pub fn grouped(entries: &[BlockSpec]) -> Vec<(&'static str, Vec<BlockSpec>)> {
    let mut groups: Vec<(&'static str, Vec<BlockSpec>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(group, _)| *group == entry.group) {
            Some((_, items)) => items.push(*entry),
            None => groups.push((entry.group, vec![*entry])),
        }
    }
    groups
}

/// Targets offered by the block options "Turn into" menu.
pub fn turn_into_options() -> Vec<BlockSpec> {
    [
        BlockType::Paragraph,
        BlockType::Heading1,
        BlockType::Heading2,
        BlockType::Heading3,
        BlockType::BulletedList,
        BlockType::NumberedList,
        BlockType::Checkbox,
        BlockType::Quote,
        BlockType::Callout,
        BlockType::Code,
    ]
    .into_iter()
    .map(spec)
    .collect()
}
