//! Page and database templates.
//!
//! A template never shares block ids with a live page: instantiating one
//! re-ids every block, and saving a page as a template re-ids the snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use folio_api::{
    ApiError, BlockContent, BlockNode, BlockTree, BlockType, DatabaseContent, DatabaseProperty,
    DatabaseRow, DatabaseView, PropertyType, Value, ViewType,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::engine::fresh_tree;
use crate::ids::IdGenerator;
use crate::registry;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TemplateMetadata {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageTemplate {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub category: String,
    pub is_public: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub blocks: BlockTree,
    #[serde(default)]
    pub metadata: TemplateMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseTemplate {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub category: String,
    pub properties: Vec<DatabaseProperty>,
    /// Sample rows keyed by property *name*
    #[serde(default)]
    pub sample_rows: Vec<HashMap<String, Value>>,
    pub is_public: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateCategory {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub order: u32,
}

/// Descriptive fields for [`TemplateLibrary::save_as_template`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTemplate {
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub icon: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateLibrary {
    pages: Vec<PageTemplate>,
    databases: Vec<DatabaseTemplate>,
    categories: Vec<TemplateCategory>,
}

impl TemplateLibrary {
    /// An empty library with no categories.
    pub fn new() -> Self {
        Self::default()
    }

    /// The library shipped with the application.
    pub fn builtin() -> Self {
        Self {
            pages: vec![meeting_notes(), project_planning()],
            databases: vec![task_management()],
            categories: builtin_categories(),
        }
    }

    // ===== Lookup =====

    pub fn page_templates(&self) -> &[PageTemplate] {
        &self.pages
    }

    pub fn page_template(&self, id: &str) -> Result<&PageTemplate> {
        self.pages
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::TemplateNotFound { id: id.to_string() })
    }

    pub fn page_templates_by_category(&self, category: &str) -> Vec<&PageTemplate> {
        self.pages.iter().filter(|t| t.category == category).collect()
    }

    pub fn database_templates(&self) -> &[DatabaseTemplate] {
        &self.databases
    }

    pub fn database_template(&self, id: &str) -> Result<&DatabaseTemplate> {
        self.databases
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| ApiError::TemplateNotFound { id: id.to_string() })
    }

    pub fn database_templates_by_category(&self, category: &str) -> Vec<&DatabaseTemplate> {
        self.databases
            .iter()
            .filter(|t| t.category == category)
            .collect()
    }

    /// Categories in display order.
    pub fn categories(&self) -> Vec<&TemplateCategory> {
        let mut categories: Vec<&TemplateCategory> = self.categories.iter().collect();
        categories.sort_by_key(|c| c.order);
        categories
    }

    // ===== Instantiate / save =====

    /// Blocks of a page template, every id freshly generated.
    pub fn instantiate_page_template<G: IdGenerator + ?Sized>(
        &self,
        id: &str,
        ids: &G,
    ) -> Result<BlockTree> {
        let template = self.page_template(id)?;
        let tree = instantiate_blocks(&template.blocks, ids)?;
        info!(template_id = %id, blocks = tree.total_len(), "Instantiated page template");
        Ok(tree)
    }

    /// Store a snapshot of `blocks` as a new private template. The stored
    /// copy is re-ided so it never aliases the live page.
    pub fn save_as_template<G: IdGenerator + ?Sized>(
        &mut self,
        new: NewTemplate,
        blocks: &BlockTree,
        created_by: &str,
        ids: &G,
    ) -> Result<PageTemplate> {
        let now = Utc::now();
        let template = PageTemplate {
            id: format!("template-{}", ids.next_id()),
            title: new.title,
            description: new.description,
            icon: new.icon,
            cover_image: None,
            category: new.category,
            is_public: false,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            blocks: instantiate_blocks(blocks, ids)?,
            metadata: TemplateMetadata::default(),
        };
        info!(template_id = %template.id, "Saved page as template");
        self.pages.push(template.clone());
        Ok(template)
    }

    pub fn add_database_template(&mut self, template: DatabaseTemplate) {
        self.databases.push(template);
    }

    /// Database content built from a template: fresh property ids, sample
    /// rows re-keyed from property names to the new ids, one table view.
    pub fn instantiate_database_template<G: IdGenerator + ?Sized>(
        &self,
        id: &str,
        ids: &G,
    ) -> Result<DatabaseContent> {
        let template = self.database_template(id)?;

        let properties: Vec<DatabaseProperty> = template
            .properties
            .iter()
            .map(|p| DatabaseProperty {
                id: ids.next_id(),
                ..p.clone()
            })
            .collect();
        let by_name: HashMap<&str, &str> = properties
            .iter()
            .map(|p| (p.name.as_str(), p.id.as_str()))
            .collect();

        let rows = template
            .sample_rows
            .iter()
            .map(|sample| {
                let mut row = DatabaseRow::new(ids.next_id());
                for (name, value) in sample {
                    match by_name.get(name.as_str()) {
                        Some(property_id) => {
                            row.properties.insert(property_id.to_string(), value.clone());
                        }
                        None => debug!(column = %name, "Sample value has no matching property"),
                    }
                }
                row
            })
            .collect();

        let view = DatabaseView::new(ids.next_id(), "Table", ViewType::Table);
        let content = DatabaseContent {
            title: template.title.clone(),
            description: template.description.clone(),
            current_view: Some(view.id.clone()),
            properties,
            rows,
            views: vec![view],
        };
        info!(template_id = %id, "Instantiated database template");
        Ok(content)
    }
}

/// Copy of `blocks` with fresh ids throughout.
pub fn instantiate_blocks<G: IdGenerator + ?Sized>(blocks: &BlockTree, ids: &G) -> Result<BlockTree> {
    fresh_tree(blocks, ids)
}

// =============================================================================
// Built-in templates
// =============================================================================

fn text_block(id: &str, block_type: BlockType, text: &str) -> BlockNode {
    let mut content = registry::default_content(block_type);
    content.set_text(text);
    BlockNode::new(id, block_type, content)
}

fn callout(id: &str, text: &str, icon: &str) -> BlockNode {
    let mut node = text_block(id, BlockType::Callout, text);
    if let BlockContent::Callout(c) = &mut node.content {
        c.icon = icon.to_string();
    }
    node
}

fn system_tree(nodes: Vec<BlockNode>) -> BlockTree {
    // Built-in ids are literal and distinct
    BlockTree::from_nodes(nodes).unwrap_or_default()
}

fn meeting_notes() -> PageTemplate {
    let now = Utc::now();
    PageTemplate {
        id: "template-1".to_string(),
        title: "Meeting Notes".to_string(),
        description: Some("Template for taking meeting notes with agenda and action items".to_string()),
        icon: Some("📝".to_string()),
        cover_image: None,
        category: "productivity".to_string(),
        is_public: true,
        created_by: "system".to_string(),
        created_at: now,
        updated_at: now,
        blocks: system_tree(vec![
            text_block("block-1", BlockType::Heading1, "Meeting Notes - [Date]"),
            text_block("block-2", BlockType::Heading2, "Attendees"),
            text_block("block-3", BlockType::BulletedList, ""),
            text_block("block-4", BlockType::Heading2, "Agenda"),
            text_block("block-5", BlockType::NumberedList, ""),
            text_block("block-6", BlockType::Heading2, "Action Items"),
            text_block("block-7", BlockType::Checkbox, ""),
        ]),
        metadata: TemplateMetadata {
            tags: vec!["meetings".to_string(), "productivity".to_string()],
            difficulty: Some(Difficulty::Beginner),
            estimated_time: None,
        },
    }
}

fn project_planning() -> PageTemplate {
    let now = Utc::now();
    PageTemplate {
        id: "template-2".to_string(),
        title: "Project Planning".to_string(),
        description: Some(
            "Comprehensive project planning template with goals, timeline, and resources".to_string(),
        ),
        icon: Some("🎯".to_string()),
        cover_image: None,
        category: "project-management".to_string(),
        is_public: true,
        created_by: "system".to_string(),
        created_at: now,
        updated_at: now,
        blocks: system_tree(vec![
            text_block("block-1", BlockType::Heading1, "Project: [Project Name]"),
            callout("block-2", "Project overview and objectives", "🎯"),
            text_block("block-3", BlockType::Heading2, "Goals & Objectives"),
            text_block("block-4", BlockType::Heading2, "Timeline"),
            text_block("block-5", BlockType::Heading2, "Resources"),
            text_block("block-6", BlockType::Heading2, "Risks & Mitigation"),
        ]),
        metadata: TemplateMetadata {
            tags: vec!["project".to_string(), "planning".to_string()],
            difficulty: Some(Difficulty::Intermediate),
            estimated_time: None,
        },
    }
}

fn task_management() -> DatabaseTemplate {
    let now = Utc::now();
    let mut sample = HashMap::new();
    sample.insert("Task".to_string(), Value::from("Complete project proposal"));
    sample.insert("Status".to_string(), Value::from("In Progress"));
    sample.insert("Priority".to_string(), Value::from("High"));
    sample.insert("Due Date".to_string(), Value::from("2024-06-15"));

    DatabaseTemplate {
        id: "db-template-1".to_string(),
        title: "Task Management".to_string(),
        description: Some("Simple task tracking with status, priority, and assignee".to_string()),
        icon: Some("✅".to_string()),
        category: "productivity".to_string(),
        properties: vec![
            DatabaseProperty::new("prop-1", "Task", PropertyType::Title),
            DatabaseProperty::new("prop-2", "Status", PropertyType::Select)
                .with_choices(["Not Started", "In Progress", "Completed"]),
            DatabaseProperty::new("prop-3", "Priority", PropertyType::Select)
                .with_choices(["Low", "Medium", "High"]),
            DatabaseProperty::new("prop-4", "Due Date", PropertyType::Date),
            DatabaseProperty::new("prop-5", "Assignee", PropertyType::Person),
        ],
        sample_rows: vec![sample],
        is_public: true,
        created_by: "system".to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn builtin_categories() -> Vec<TemplateCategory> {
    [
        ("productivity", "Productivity", "⚡"),
        ("project-management", "Project Management", "📊"),
        ("personal", "Personal", "👤"),
        ("education", "Education", "📚"),
        ("business", "Business", "💼"),
    ]
    .into_iter()
    .zip(1..)
    .map(|((id, name, icon), order)| TemplateCategory {
        id: id.to_string(),
        name: name.to_string(),
        description: None,
        icon: Some(icon.to_string()),
        order,
    })
    .collect()
}
