use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tree::BlockTree;

/// A page in the sidebar hierarchy.
///
/// Pages mirror the block convention: `children` (ids, in display order) is
/// the ownership structure of the page tree, `parent_id` is a lookup aid.
/// Each page owns exactly one root [`BlockTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    #[serde(default)]
    pub content: BlockTree,
    #[serde(default)]
    pub metadata: PageMetadata,
}

impl Page {
    pub fn new(id: impl Into<String>, title: impl Into<String>, created_by: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            icon: None,
            cover: None,
            parent_id: None,
            children: Vec::new(),
            is_favorite: false,
            is_public: false,
            created_at: now,
            updated_at: now,
            created_by: created_by.into(),
            content: BlockTree::new(),
            metadata: PageMetadata::default(),
        }
    }

    pub fn summary(&self) -> PageSummary {
        PageSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            icon: self.icon.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageMetadata {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The few page fields the sidebar and recents list display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSummary {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

pub type BreadcrumbItem = PageSummary;
