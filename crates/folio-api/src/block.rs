use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::DatabaseContent;
use crate::tree::BlockTree;
use crate::ApiError;

// =============================================================================
// BlockType - closed enumeration of block tags
// =============================================================================

/// Tag identifying what a block is.
///
/// The wire form is the kebab-case tag used by the persisted `type` column
/// (`heading-1`, `database-inline`, ...). Parsing an unrecognized tag fails
/// with `ApiError::UnknownBlockType`; there is no silent fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum BlockType {
    Paragraph,
    Heading1,
    Heading2,
    Heading3,
    BulletedList,
    NumberedList,
    Quote,
    Toggle,
    Checkbox,
    Callout,
    Code,
    Math,
    Image,
    Video,
    Audio,
    File,
    Pdf,
    Bookmark,
    LinkPreview,
    Table,
    Columns,
    DatabaseFull,
    DatabaseInline,
    Divider,
    Breadcrumb,
    TableOfContents,
    Template,
}

impl BlockType {
    pub const ALL: [BlockType; 27] = [
        BlockType::Paragraph,
        BlockType::Heading1,
        BlockType::Heading2,
        BlockType::Heading3,
        BlockType::BulletedList,
        BlockType::NumberedList,
        BlockType::Quote,
        BlockType::Toggle,
        BlockType::Checkbox,
        BlockType::Callout,
        BlockType::Code,
        BlockType::Math,
        BlockType::Image,
        BlockType::Video,
        BlockType::Audio,
        BlockType::File,
        BlockType::Pdf,
        BlockType::Bookmark,
        BlockType::LinkPreview,
        BlockType::Table,
        BlockType::Columns,
        BlockType::DatabaseFull,
        BlockType::DatabaseInline,
        BlockType::Divider,
        BlockType::Breadcrumb,
        BlockType::TableOfContents,
        BlockType::Template,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Paragraph => "paragraph",
            BlockType::Heading1 => "heading-1",
            BlockType::Heading2 => "heading-2",
            BlockType::Heading3 => "heading-3",
            BlockType::BulletedList => "bulleted-list",
            BlockType::NumberedList => "numbered-list",
            BlockType::Quote => "quote",
            BlockType::Toggle => "toggle",
            BlockType::Checkbox => "checkbox",
            BlockType::Callout => "callout",
            BlockType::Code => "code",
            BlockType::Math => "math",
            BlockType::Image => "image",
            BlockType::Video => "video",
            BlockType::Audio => "audio",
            BlockType::File => "file",
            BlockType::Pdf => "pdf",
            BlockType::Bookmark => "bookmark",
            BlockType::LinkPreview => "link-preview",
            BlockType::Table => "table",
            BlockType::Columns => "columns",
            BlockType::DatabaseFull => "database-full",
            BlockType::DatabaseInline => "database-inline",
            BlockType::Divider => "divider",
            BlockType::Breadcrumb => "breadcrumb",
            BlockType::TableOfContents => "table-of-contents",
            BlockType::Template => "template",
        }
    }

    /// The content shape every block of this type carries.
    pub fn family(&self) -> ContentFamily {
        match self {
            BlockType::Paragraph
            | BlockType::Heading1
            | BlockType::Heading2
            | BlockType::Heading3
            | BlockType::BulletedList
            | BlockType::NumberedList
            | BlockType::Quote
            | BlockType::Toggle => ContentFamily::Text,
            BlockType::Checkbox => ContentFamily::Checkbox,
            BlockType::Callout => ContentFamily::Callout,
            BlockType::Code => ContentFamily::Code,
            BlockType::Math => ContentFamily::Math,
            BlockType::Image
            | BlockType::Video
            | BlockType::Audio
            | BlockType::File
            | BlockType::Pdf => ContentFamily::Media,
            BlockType::Bookmark | BlockType::LinkPreview => ContentFamily::Bookmark,
            BlockType::Table => ContentFamily::Table,
            BlockType::Columns => ContentFamily::Columns,
            BlockType::DatabaseFull | BlockType::DatabaseInline => ContentFamily::Database,
            BlockType::Divider
            | BlockType::Breadcrumb
            | BlockType::TableOfContents
            | BlockType::Template => ContentFamily::Empty,
        }
    }

    /// Only toggles own a `children` body.
    pub fn is_container(&self) -> bool {
        matches!(self, BlockType::Toggle)
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockType::ALL
            .iter()
            .find(|t| t.as_str() == s)
            .copied()
            .ok_or_else(|| ApiError::UnknownBlockType { tag: s.to_string() })
    }
}

impl TryFrom<String> for BlockType {
    type Error = ApiError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BlockType> for String {
    fn from(t: BlockType) -> Self {
        t.as_str().to_string()
    }
}

/// Content shape shared by a group of block types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFamily {
    Text,
    Checkbox,
    Callout,
    Code,
    Math,
    Media,
    Bookmark,
    Table,
    Columns,
    Database,
    Empty,
}

impl ContentFamily {
    /// Whether the shape has a `text` field.
    pub fn has_text(&self) -> bool {
        matches!(
            self,
            ContentFamily::Text | ContentFamily::Checkbox | ContentFamily::Callout
        )
    }
}

// =============================================================================
// Content payloads
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormattingKind {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Code,
    Link,
}

/// An inline formatting span over `[start, end)` of a block's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextFormatting {
    #[serde(rename = "type")]
    pub kind: FormattingKind,
    pub start: usize,
    pub end: usize,
    /// Link target for `FormattingKind::Link`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TextContent {
    pub text: String,
    pub formatting: Vec<TextFormatting>,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            formatting: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckboxContent {
    pub text: String,
    pub checked: bool,
    pub formatting: Vec<TextFormatting>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalloutContent {
    pub text: String,
    pub icon: String,
    pub formatting: Vec<TextFormatting>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeContent {
    pub code: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MathContent {
    pub formula: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaContent {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarkContent {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A simple grid of strings.
///
/// Every row has exactly `headers.len()` cells; the table editing operations
/// update all rows in the same step as the headers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TableContent {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub has_header: bool,
}

impl TableContent {
    /// Whether every row is as wide as the header row.
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|row| row.len() == self.headers.len())
    }
}

/// Side-by-side layout; each column is its own ordered block tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnsContent {
    pub column_count: usize,
    pub columns: Vec<BlockTree>,
}

/// Content with no persisted fields (`{}`).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EmptyContent {}

/// Content of a block, one variant per content family.
///
/// Serialized untagged: the `type` of the owning block determines which shape
/// is expected, see [`BlockContent::from_json`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BlockContent {
    Text(TextContent),
    Checkbox(CheckboxContent),
    Callout(CalloutContent),
    Code(CodeContent),
    Math(MathContent),
    Media(MediaContent),
    Bookmark(BookmarkContent),
    Table(TableContent),
    Columns(ColumnsContent),
    Database(DatabaseContent),
    Empty(EmptyContent),
}

impl Default for BlockContent {
    fn default() -> Self {
        BlockContent::Text(TextContent::default())
    }
}

impl BlockContent {
    /// Plain text content
    pub fn text(text: impl Into<String>) -> Self {
        BlockContent::Text(TextContent::new(text))
    }

    pub fn family(&self) -> ContentFamily {
        match self {
            BlockContent::Text(_) => ContentFamily::Text,
            BlockContent::Checkbox(_) => ContentFamily::Checkbox,
            BlockContent::Callout(_) => ContentFamily::Callout,
            BlockContent::Code(_) => ContentFamily::Code,
            BlockContent::Math(_) => ContentFamily::Math,
            BlockContent::Media(_) => ContentFamily::Media,
            BlockContent::Bookmark(_) => ContentFamily::Bookmark,
            BlockContent::Table(_) => ContentFamily::Table,
            BlockContent::Columns(_) => ContentFamily::Columns,
            BlockContent::Database(_) => ContentFamily::Database,
            BlockContent::Empty(_) => ContentFamily::Empty,
        }
    }

    /// Parse the shape expected by `block_type` out of untyped JSON.
    ///
    /// `null` parses as the family's empty payload. Unknown keys are ignored.
    pub fn from_json(block_type: BlockType, value: serde_json::Value) -> Result<Self, ApiError> {
        let value = if value.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            value
        };

        fn parse<T: serde::de::DeserializeOwned>(
            block_type: BlockType,
            value: serde_json::Value,
        ) -> Result<T, ApiError> {
            serde_json::from_value(value).map_err(|e| ApiError::InvalidContent {
                block_type: block_type.to_string(),
                message: e.to_string(),
            })
        }

        Ok(match block_type.family() {
            ContentFamily::Text => BlockContent::Text(parse(block_type, value)?),
            ContentFamily::Checkbox => BlockContent::Checkbox(parse(block_type, value)?),
            ContentFamily::Callout => BlockContent::Callout(parse(block_type, value)?),
            ContentFamily::Code => BlockContent::Code(parse(block_type, value)?),
            ContentFamily::Math => BlockContent::Math(parse(block_type, value)?),
            ContentFamily::Media => BlockContent::Media(parse(block_type, value)?),
            ContentFamily::Bookmark => BlockContent::Bookmark(parse(block_type, value)?),
            ContentFamily::Table => BlockContent::Table(parse(block_type, value)?),
            ContentFamily::Columns => BlockContent::Columns(parse(block_type, value)?),
            ContentFamily::Database => BlockContent::Database(parse(block_type, value)?),
            ContentFamily::Empty => BlockContent::Empty(parse(block_type, value)?),
        })
    }

    /// The `text` field, for shapes that define one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            BlockContent::Text(c) => Some(&c.text),
            BlockContent::Checkbox(c) => Some(&c.text),
            BlockContent::Callout(c) => Some(&c.text),
            _ => None,
        }
    }

    /// Overwrite the `text` field. Returns false if the shape has none.
    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        match self {
            BlockContent::Text(c) => c.text = text.into(),
            BlockContent::Checkbox(c) => c.text = text.into(),
            BlockContent::Callout(c) => c.text = text.into(),
            _ => return false,
        }
        true
    }

    /// The single editable string of "text-like" shapes:
    /// `text`, `code`, `formula` or `url`.
    pub fn primary_text(&self) -> Option<&str> {
        match self {
            BlockContent::Code(c) => Some(&c.code),
            BlockContent::Math(c) => Some(&c.formula),
            BlockContent::Media(c) => Some(&c.url),
            BlockContent::Bookmark(c) => Some(&c.url),
            other => other.as_text(),
        }
    }

    /// Plain text representation handed to search and table-of-contents.
    pub fn to_plain_text(&self) -> String {
        match self {
            BlockContent::Table(t) => t
                .headers
                .iter()
                .chain(t.rows.iter().flatten())
                .filter(|s| !s.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" "),
            BlockContent::Database(db) => db.title.clone(),
            BlockContent::Bookmark(b) => b.title.clone().unwrap_or_else(|| b.url.clone()),
            BlockContent::Media(m) => m.caption.clone().unwrap_or_default(),
            other => other.primary_text().unwrap_or_default().to_string(),
        }
    }

    pub fn as_table(&self) -> Option<&TableContent> {
        match self {
            BlockContent::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut TableContent> {
        match self {
            BlockContent::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_columns(&self) -> Option<&ColumnsContent> {
        match self {
            BlockContent::Columns(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_columns_mut(&mut self) -> Option<&mut ColumnsContent> {
        match self {
            BlockContent::Columns(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_database(&self) -> Option<&DatabaseContent> {
        match self {
            BlockContent::Database(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_database_mut(&mut self) -> Option<&mut DatabaseContent> {
        match self {
            BlockContent::Database(d) => Some(d),
            _ => None,
        }
    }
}

// =============================================================================
// Block
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Left,
    Center,
    Right,
}

/// Display attributes orthogonal to a block's type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
}

impl BlockProperties {
    pub fn is_empty(&self) -> bool {
        self.background_color.is_none() && self.text_color.is_none() && self.alignment.is_none()
    }
}

/// Metadata associated with a block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BlockMetadata {
    /// Unix timestamp (milliseconds) when block was created
    pub created_at: i64,
    /// Unix timestamp (milliseconds) when block was last updated
    pub updated_at: i64,
}

impl BlockMetadata {
    pub fn now() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

/// A block as stored in a [`BlockTree`] arena.
///
/// `children` lists child ids in display order and is the only ownership
/// structure. `parent_id` is a lookup aid (`None` for the top level of the
/// tree that holds the block).
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: String,
    pub parent_id: Option<String>,
    pub block_type: BlockType,
    pub content: BlockContent,
    pub properties: BlockProperties,
    pub children: Vec<String>,
    pub metadata: BlockMetadata,
}

impl Block {
    pub fn new(id: impl Into<String>, block_type: BlockType, content: BlockContent) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            block_type,
            content,
            properties: BlockProperties::default(),
            children: Vec::new(),
            metadata: BlockMetadata::default(),
        }
    }

    /// Whether `content` has the shape registered for `block_type`.
    pub fn content_matches_type(&self) -> bool {
        self.content.family() == self.block_type.family()
    }

    pub fn text(&self) -> Option<&str> {
        self.content.as_text()
    }

    /// Column trees nested in this block (empty unless it is a `columns` block).
    pub fn nested_trees(&self) -> &[BlockTree] {
        match &self.content {
            BlockContent::Columns(c) => &c.columns,
            _ => &[],
        }
    }
}

// =============================================================================
// BlockNode - nested, self-contained form of a block subtree
// =============================================================================

/// A block with its children inlined, as exchanged with templates and stores.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNode {
    pub id: String,
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub content: BlockContent,
    #[serde(skip_serializing_if = "BlockProperties::is_empty")]
    pub properties: BlockProperties,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<BlockNode>,
    pub metadata: BlockMetadata,
}

impl BlockNode {
    pub fn new(id: impl Into<String>, block_type: BlockType, content: BlockContent) -> Self {
        Self {
            id: id.into(),
            block_type,
            content,
            properties: BlockProperties::default(),
            children: Vec::new(),
            metadata: BlockMetadata::default(),
        }
    }

    /// Builder: set children
    pub fn with_children(mut self, children: Vec<BlockNode>) -> Self {
        self.children = children;
        self
    }

    /// Every id in this subtree, pre-order, including column trees.
    pub fn ids(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out
    }

    fn collect_ids<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.id);
        if let BlockContent::Columns(cols) = &self.content {
            for column in &cols.columns {
                out.extend(column.flatten().map(|b| b.id.as_str()));
            }
        }
        for child in &self.children {
            child.collect_ids(out);
        }
    }
}

#[derive(Deserialize)]
struct RawBlockNode {
    id: String,
    #[serde(rename = "type")]
    block_type: BlockType,
    #[serde(default)]
    content: serde_json::Value,
    #[serde(default)]
    properties: BlockProperties,
    #[serde(default)]
    children: Vec<BlockNode>,
    #[serde(default)]
    metadata: BlockMetadata,
}

impl<'de> Deserialize<'de> for BlockNode {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawBlockNode::deserialize(deserializer)?;
        let content = BlockContent::from_json(raw.block_type, raw.content)
            .map_err(serde::de::Error::custom)?;
        Ok(BlockNode {
            id: raw.id,
            block_type: raw.block_type,
            content,
            properties: raw.properties,
            children: raw.children,
            metadata: raw.metadata,
        })
    }
}
