//! Persistence collaborator
//!
//! The model never talks to a storage backend directly; it consumes the
//! [`PageStore`] trait. [`MemoryStore`] is a table-shaped in-memory
//! implementation used by tests and as a reference for real backends.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use folio_api::{ApiError, BlockTree, DatabaseContent};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::pages::PageTree;
use crate::records::{
    pages_to_records, records_to_pages, records_to_tree, tree_to_records, BlockRecord,
    DatabaseRecord, PageRecord,
};
use crate::Result;

/// Load/save operations the model needs from a store.
///
/// Store failures surface as `ApiError::StoreError`; callers keep their
/// in-memory snapshot unchanged when a save fails.
#[async_trait]
pub trait PageStore: Send + Sync {
    async fn load_page_tree(&self, page_id: &str) -> Result<BlockTree>;

    async fn save_page_tree(&self, page_id: &str, tree: &BlockTree) -> Result<()>;

    /// The page hierarchy without block content.
    async fn load_page_hierarchy(&self) -> Result<PageTree>;

    async fn save_page_hierarchy(&self, pages: &PageTree) -> Result<()>;

    async fn load_database(&self, database_id: &str) -> Result<DatabaseContent>;

    async fn save_database(&self, database_id: &str, content: &DatabaseContent) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tables {
    pages: Vec<PageRecord>,
    /// Block rows by page id
    blocks: HashMap<String, Vec<BlockRecord>>,
    databases: HashMap<String, DatabaseRecord>,
}

/// In-memory store over record tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    /// When set, every save fails (simulates an unreachable backend)
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self, operation: &str) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            warn!(operation, "Store is offline");
            return Err(ApiError::StoreError {
                message: format!("{operation}: store unavailable"),
            });
        }
        Ok(())
    }

    /// Raw block rows of a page, as a backend would hold them.
    pub async fn block_records(&self, page_id: &str) -> Vec<BlockRecord> {
        let tables = self.tables.read().await;
        tables.blocks.get(page_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PageStore for MemoryStore {
    async fn load_page_tree(&self, page_id: &str) -> Result<BlockTree> {
        let tables = self.tables.read().await;
        match tables.blocks.get(page_id) {
            Some(records) => records_to_tree(records),
            None if tables.pages.iter().any(|p| p.id == page_id) => Ok(BlockTree::new()),
            None => Err(ApiError::PageNotFound {
                id: page_id.to_string(),
            }),
        }
    }

    async fn save_page_tree(&self, page_id: &str, tree: &BlockTree) -> Result<()> {
        self.check_online("save_page_tree")?;
        let records = tree_to_records(page_id, tree)?;
        let count = records.len();
        let current: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
        let mut tables = self.tables.write().await;
        // Database records go with database blocks removed from the page
        if let Some(previous) = tables.blocks.insert(page_id.to_string(), records) {
            for record in previous {
                if !current.contains(&record.id) {
                    tables.databases.remove(&record.id);
                }
            }
        }
        info!(page_id = %page_id, blocks = count, "Saved page tree");
        Ok(())
    }

    async fn load_page_hierarchy(&self) -> Result<PageTree> {
        let tables = self.tables.read().await;
        records_to_pages(&tables.pages)
    }

    async fn save_page_hierarchy(&self, pages: &PageTree) -> Result<()> {
        self.check_online("save_page_hierarchy")?;
        let records = pages_to_records(pages);
        let mut tables = self.tables.write().await;
        // Blocks of pages that no longer exist go with them, and so do their
        // database records
        let live: HashSet<&str> = records.iter().map(|r| r.id.as_str()).collect();
        let orphaned: Vec<String> = tables
            .blocks
            .iter()
            .filter(|(page_id, _)| !live.contains(page_id.as_str()))
            .flat_map(|(_, blocks)| blocks.iter().map(|b| b.id.clone()))
            .collect();
        tables.blocks.retain(|page_id, _| live.contains(page_id.as_str()));
        for id in orphaned {
            tables.databases.remove(&id);
        }
        info!(pages = records.len(), "Saved page hierarchy");
        tables.pages = records;
        Ok(())
    }

    async fn load_database(&self, database_id: &str) -> Result<DatabaseContent> {
        let tables = self.tables.read().await;
        let record = tables
            .databases
            .get(database_id)
            .cloned()
            .ok_or_else(|| ApiError::BlockNotFound {
                id: database_id.to_string(),
            })?;
        record.into_content()
    }

    async fn save_database(&self, database_id: &str, content: &DatabaseContent) -> Result<()> {
        self.check_online("save_database")?;
        let record = DatabaseRecord::from_content(database_id, content)?;
        self.tables
            .write()
            .await
            .databases
            .insert(database_id.to_string(), record);
        info!(database_id = %database_id, "Saved database");
        Ok(())
    }
}
