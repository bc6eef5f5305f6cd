//! Session context
//!
//! A [`Workspace`] owns the page hierarchy, the recents list, undo history,
//! the id source and the template library. It is passed explicitly to
//! whatever drives the editor; nothing here is global, so independent
//! workspaces can coexist (one per test, for instance).

use folio_api::{
    ApiError, BlockContent, BlockTree, BlockType, BreadcrumbItem, DatabaseContent, Page,
};
use tracing::{debug, info};

use crate::config::WorkspaceConfig;
use crate::database::DatabaseModel;
use crate::engine::{Edit, MutationEngine};
use crate::ids::IdGenerator;
use crate::pages::{PageTree, PageUpdate, Recents};
use crate::store::PageStore;
use crate::templates::{NewTemplate, PageTemplate, TemplateLibrary};
use crate::undo::UndoStack;
use crate::Result;

pub type SessionEngine = MutationEngine<Box<dyn IdGenerator>>;

/// Block content of one page at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSnapshot {
    pub page_id: String,
    pub tree: BlockTree,
}

pub struct Workspace {
    config: WorkspaceConfig,
    pages: PageTree,
    recents: Recents,
    history: UndoStack<ContentSnapshot>,
    engine: SessionEngine,
    templates: TemplateLibrary,
    selected: Option<String>,
}

impl Workspace {
    pub fn new(config: WorkspaceConfig) -> Self {
        let ids = config.id_scheme.generator();
        Self::with_ids(config, ids)
    }

    pub fn with_ids(config: WorkspaceConfig, ids: Box<dyn IdGenerator>) -> Self {
        Self {
            recents: Recents::with_max(config.max_recent),
            history: UndoStack::with_max_size(config.undo_depth),
            engine: MutationEngine::new(ids),
            templates: TemplateLibrary::builtin(),
            pages: PageTree::new(),
            selected: None,
            config,
        }
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    pub fn pages(&self) -> &PageTree {
        &self.pages
    }

    pub fn recents(&self) -> &Recents {
        &self.recents
    }

    pub fn engine(&self) -> &SessionEngine {
        &self.engine
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    pub fn selected_page(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn page(&self, id: &str) -> Result<&Page> {
        self.pages.get(id)
    }

    fn ids(&self) -> &dyn IdGenerator {
        &**self.engine.ids()
    }

    // ===== Pages =====

    /// Create a page holding one empty paragraph. Returns the new page id.
    pub fn create_page(
        &mut self,
        title: &str,
        parent: Option<&str>,
        icon: Option<String>,
    ) -> Result<String> {
        let mut page = Page::new(self.ids().next_id(), title, self.config.default_owner.clone());
        page.icon = Some(icon.unwrap_or_else(|| self.config.default_page_icon.clone()));
        page.content = self.engine.insert(&BlockTree::new(), None, BlockType::Paragraph)?.tree;

        let id = page.id.clone();
        self.pages = self.pages.create_page(page, parent)?;
        Ok(id)
    }

    pub fn update_page(&mut self, id: &str, update: PageUpdate) -> Result<()> {
        self.pages = self.pages.update_page(id, update)?;
        if let Ok(page) = self.pages.get(id) {
            if self.recents.get(id).is_some() {
                self.recents.refresh(page.summary());
            }
        }
        Ok(())
    }

    /// Delete a page and its descendants; they also leave recents, the
    /// selection and the undo history.
    pub fn delete_page(&mut self, id: &str) -> Result<Vec<String>> {
        let (pages, removed) = self.pages.delete_page(id)?;
        self.pages = pages;
        for page_id in &removed {
            self.recents.remove(page_id);
        }
        if self
            .selected
            .as_ref()
            .is_some_and(|s| removed.contains(s))
        {
            self.selected = None;
        }
        self.history
            .discard_where(|entry| removed.contains(&entry.before.page_id));
        Ok(removed)
    }

    pub fn toggle_favorite(&mut self, id: &str) -> Result<bool> {
        self.pages = self.pages.toggle_favorite(id)?;
        Ok(self.pages.get(id)?.is_favorite)
    }

    pub fn move_page(&mut self, id: &str, new_parent: Option<&str>) -> Result<()> {
        self.pages = self.pages.move_page(id, new_parent)?;
        Ok(())
    }

    pub fn favorites(&self) -> Vec<&Page> {
        self.pages.favorites()
    }

    pub fn breadcrumbs(&self, id: &str) -> Result<Vec<BreadcrumbItem>> {
        self.pages.breadcrumbs(id, &self.recents)
    }

    /// Make `id` the selected page and move it to the front of recents.
    pub fn select_page(&mut self, id: &str) -> Result<&Page> {
        let summary = self.pages.get(id)?.summary();
        self.recents.touch(summary);
        self.selected = Some(id.to_string());
        debug!(page_id = %id, "Selected page");
        self.pages.get(id)
    }

    // ===== Block editing =====

    /// Apply an engine operation to a page's content.
    ///
    /// The page keeps its previous tree if `f` fails. On success the edit is
    /// recorded for undo under `label` and the new focus is returned.
    pub fn edit_page<F>(&mut self, page_id: &str, label: &str, f: F) -> Result<Option<String>>
    where
        F: FnOnce(&SessionEngine, &BlockTree) -> Result<Edit>,
    {
        let before = self.pages.get(page_id)?.content.clone();
        let Edit { tree, focus } = f(&self.engine, &before)?;

        self.history.push(
            label,
            ContentSnapshot {
                page_id: page_id.to_string(),
                tree: before,
            },
            ContentSnapshot {
                page_id: page_id.to_string(),
                tree: tree.clone(),
            },
        );
        self.pages.set_content(page_id, tree)?;
        debug!(page_id = %page_id, label, "Applied page edit");
        Ok(focus)
    }

    /// Backspace-on-empty-block policy: remove the block, and if that
    /// leaves the page without top-level blocks, add a fresh empty
    /// paragraph in the same step.
    pub fn delete_block_ui(&mut self, page_id: &str, block_id: &str) -> Result<Option<String>> {
        self.edit_page(page_id, "Delete block", |engine, tree| {
            let edit = engine.remove(tree, block_id)?;
            if edit.tree.is_empty() {
                engine.insert(&edit.tree, None, BlockType::Paragraph)
            } else {
                Ok(edit)
            }
        })
    }

    /// Restore the page content before the latest edit. Returns the label
    /// of the undone edit.
    pub fn undo(&mut self) -> Result<Option<String>> {
        let Some(entry) = self.history.pop_for_undo() else {
            return Ok(None);
        };
        self.pages
            .set_content(&entry.before.page_id, entry.before.tree)?;
        debug!(page_id = %entry.before.page_id, label = %entry.label, "Undo");
        Ok(Some(entry.label))
    }

    pub fn redo(&mut self) -> Result<Option<String>> {
        let Some(entry) = self.history.pop_for_redo() else {
            return Ok(None);
        };
        self.pages.set_content(&entry.after.page_id, entry.after.tree)?;
        debug!(page_id = %entry.after.page_id, label = %entry.label, "Redo");
        Ok(Some(entry.label))
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ===== Databases =====

    /// Apply a database model operation to a database block of a page.
    pub fn edit_database<F>(
        &mut self,
        page_id: &str,
        block_id: &str,
        label: &str,
        f: F,
    ) -> Result<()>
    where
        F: FnOnce(&DatabaseModel<&dyn IdGenerator>, &DatabaseContent) -> Result<DatabaseContent>,
    {
        self.edit_page(page_id, label, |engine, tree| {
            let block = tree.find(block_id)?;
            let content = block.content.as_database().ok_or_else(|| {
                ApiError::invalid_operation(format!(
                    "{} block {} is not a database",
                    block.block_type, block_id
                ))
            })?;
            let ids: &dyn IdGenerator = &**engine.ids();
            let model = DatabaseModel::new(ids);
            let next = f(&model, content)?;
            engine.update(tree, block_id, BlockContent::Database(next))
        })?;
        Ok(())
    }

    // ===== Templates =====

    /// Insert a fresh copy of a page template's blocks after `after`.
    pub fn apply_template(
        &mut self,
        page_id: &str,
        after: Option<&str>,
        template_id: &str,
    ) -> Result<Option<String>> {
        let blocks = self
            .templates
            .instantiate_page_template(template_id, self.ids())?;
        self.edit_page(page_id, "Apply template", |engine, tree| {
            engine.insert_blocks(tree, after, &blocks)
        })
    }

    /// Create a page from a template. Returns the new page id.
    pub fn create_page_from_template(
        &mut self,
        template_id: &str,
        parent: Option<&str>,
    ) -> Result<String> {
        let template = self.templates.page_template(template_id)?;
        let title = template.title.clone();
        let icon = template.icon.clone();
        let blocks = self
            .templates
            .instantiate_page_template(template_id, self.ids())?;

        let id = self.create_page(&title, parent, icon)?;
        self.pages.set_content(&id, blocks)?;
        info!(page_id = %id, template_id = %template_id, "Created page from template");
        Ok(id)
    }

    pub fn save_page_as_template(&mut self, page_id: &str, new: NewTemplate) -> Result<PageTemplate> {
        let blocks = self.pages.get(page_id)?.content.clone();
        let owner = self.config.default_owner.clone();
        let ids: &dyn IdGenerator = &**self.engine.ids();
        self.templates.save_as_template(new, &blocks, &owner, ids)
    }

    /// Insert a database block built from a database template.
    pub fn insert_database_from_template(
        &mut self,
        page_id: &str,
        after: Option<&str>,
        template_id: &str,
        inline: bool,
    ) -> Result<Option<String>> {
        let content = self
            .templates
            .instantiate_database_template(template_id, self.ids())?;
        let block_type = if inline {
            BlockType::DatabaseInline
        } else {
            BlockType::DatabaseFull
        };
        self.edit_page(page_id, "Insert database", |engine, tree| {
            let edit = engine.insert(tree, after, block_type)?;
            let id = edit.focus.clone().unwrap_or_default();
            engine.update(&edit.tree, &id, BlockContent::Database(content))
        })
    }

    // ===== Persistence =====

    /// Build a workspace from a store: hierarchy first, then every page's
    /// blocks. Database blocks take their content from the database tables
    /// when the store has a record for them.
    pub async fn load(config: WorkspaceConfig, store: &dyn PageStore) -> Result<Self> {
        let mut workspace = Self::new(config);
        let mut pages = store.load_page_hierarchy().await?;
        let ids: Vec<String> = pages.flatten().iter().map(|p| p.id.clone()).collect();
        for page_id in &ids {
            let mut tree = store.load_page_tree(page_id).await?;
            let databases: Vec<String> = tree
                .flatten()
                .filter(|b| b.content.as_database().is_some())
                .map(|b| b.id.clone())
                .collect();
            for database_id in databases {
                match store.load_database(&database_id).await {
                    Ok(content) => {
                        if let Some(block) = tree
                            .locate_mut(&database_id)
                            .and_then(|arena| arena.block_mut(&database_id))
                        {
                            block.content = BlockContent::Database(content);
                        }
                    }
                    Err(ApiError::BlockNotFound { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            pages.set_content(page_id, tree)?;
        }
        workspace.reserve_ids(&pages);
        info!(pages = ids.len(), "Loaded workspace");
        workspace.pages = pages;
        Ok(workspace)
    }

    /// Tell the id source about every page, block and database id in
    /// `pages` so fresh ids never collide with loaded ones.
    fn reserve_ids(&self, pages: &PageTree) {
        let ids = self.ids();
        for page in pages.flatten() {
            ids.reserve(&page.id);
            for block in page.content.flatten() {
                ids.reserve(&block.id);
                if let Some(database) = block.content.as_database() {
                    database.properties.iter().for_each(|p| ids.reserve(&p.id));
                    database.rows.iter().for_each(|r| ids.reserve(&r.id));
                    database.views.iter().for_each(|v| ids.reserve(&v.id));
                }
            }
        }
    }

    /// Write the hierarchy, every page's blocks and every database block.
    pub async fn save(&self, store: &dyn PageStore) -> Result<()> {
        store.save_page_hierarchy(&self.pages).await?;
        for page in self.pages.flatten() {
            store.save_page_tree(&page.id, &page.content).await?;
            for block in page.content.flatten() {
                if let Some(content) = block.content.as_database() {
                    store.save_database(&block.id, content).await?;
                }
            }
        }
        info!(pages = self.pages.len(), "Saved workspace");
        Ok(())
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(WorkspaceConfig::default())
    }
}
