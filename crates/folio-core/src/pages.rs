//! Page hierarchy: the sidebar tree of pages, plus the favorites and
//! recents projections and breadcrumbs.
//!
//! Pages follow the block convention: a page's `children` list is the only
//! ownership structure, `parent_id` is a lookup aid kept in sync with it.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use folio_api::{ApiError, BlockTree, BreadcrumbItem, Page, PageSummary};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;

pub const DEFAULT_MAX_RECENT: usize = 10;

/// Fields of a page that can be edited in place. `None` leaves a field alone;
/// `Some(None)` clears an optional one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageUpdate {
    pub title: Option<String>,
    pub icon: Option<Option<String>>,
    pub cover: Option<Option<String>>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageTree {
    pages: HashMap<String, Page>,
    /// Root page ids in sidebar order
    roots: Vec<String>,
}

impl PageTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assemble a tree from pages whose `parent_id` / `children` fields are
    /// already set. Roots keep the order they appear in `pages`.
    pub fn from_pages(pages: Vec<Page>) -> Result<Self> {
        let mut tree = PageTree::new();
        for page in pages {
            if page.parent_id.is_none() {
                tree.roots.push(page.id.clone());
            }
            let id = page.id.clone();
            if tree.pages.insert(id.clone(), page).is_some() {
                return Err(ApiError::invalid_operation(format!("duplicate page id {id}")));
            }
        }
        tree.validate()?;
        Ok(tree)
    }

    /// Parent links agree with children lists and every page is reachable
    /// exactly once from the roots.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        let mut stack: Vec<&String> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            let page = self.get(id)?;
            if !seen.insert(id.as_str()) {
                return Err(ApiError::invalid_operation(format!(
                    "page {id} reachable twice"
                )));
            }
            for child in page.children.iter().rev() {
                let child_page = self.get(child)?;
                if child_page.parent_id.as_deref() != Some(id.as_str()) {
                    return Err(ApiError::invalid_operation(format!(
                        "page {child} does not point back to parent {id}"
                    )));
                }
                stack.push(child);
            }
        }
        if seen.len() != self.pages.len() {
            return Err(ApiError::invalid_operation(format!(
                "{} pages stored but {} reachable",
                self.pages.len(),
                seen.len()
            )));
        }
        Ok(())
    }

    // ===== Queries =====

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn contains(&self, id: &str) -> bool {
        self.pages.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Result<&Page> {
        self.pages
            .get(id)
            .ok_or_else(|| ApiError::PageNotFound { id: id.to_string() })
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Result<&mut Page> {
        self.pages
            .get_mut(id)
            .ok_or_else(|| ApiError::PageNotFound { id: id.to_string() })
    }

    pub fn children(&self, id: &str) -> Result<Vec<&Page>> {
        let page = self.get(id)?;
        Ok(page
            .children
            .iter()
            .filter_map(|child| self.pages.get(child))
            .collect())
    }

    /// Every page in pre-order (sidebar document order).
    pub fn flatten(&self) -> Vec<&Page> {
        let mut out = Vec::with_capacity(self.pages.len());
        let mut stack: Vec<&String> = self.roots.iter().rev().collect();
        while let Some(id) = stack.pop() {
            if let Some(page) = self.pages.get(id) {
                out.push(page);
                stack.extend(page.children.iter().rev());
            }
        }
        out
    }

    /// Favorited pages at any depth, in pre-order.
    pub fn favorites(&self) -> Vec<&Page> {
        self.flatten().into_iter().filter(|p| p.is_favorite).collect()
    }

    /// Ids of the pages above `id`, nearest first.
    pub fn ancestors(&self, id: &str) -> Result<Vec<String>> {
        let mut ancestors = Vec::new();
        let mut current = self.get(id)?;
        while let Some(parent) = &current.parent_id {
            if ancestors.contains(parent) || ancestors.len() > self.pages.len() {
                break;
            }
            ancestors.push(parent.clone());
            current = self.get(parent)?;
        }
        Ok(ancestors)
    }

    /// Whether `candidate` lies in the subtree rooted at `id` (itself included).
    pub fn is_in_subtree(&self, id: &str, candidate: &str) -> Result<bool> {
        if id == candidate {
            return Ok(true);
        }
        Ok(self.ancestors(candidate)?.iter().any(|a| a == id))
    }

    /// Path from the root down to `id`.
    ///
    /// A page missing from the tree but present in `recents` (e.g. opened
    /// from a shared link) yields just that page.
    pub fn breadcrumbs(&self, id: &str, recents: &Recents) -> Result<Vec<BreadcrumbItem>> {
        match self.pages.get(id) {
            Some(page) => {
                let mut trail = vec![page.summary()];
                for ancestor in self.ancestors(id)? {
                    trail.push(self.get(&ancestor)?.summary());
                }
                trail.reverse();
                Ok(trail)
            }
            None => recents
                .get(id)
                .map(|summary| vec![summary.clone()])
                .ok_or_else(|| ApiError::PageNotFound { id: id.to_string() }),
        }
    }

    // ===== Mutations (snapshot in, snapshot out) =====

    /// Add `page` under `parent` (or as a new root), appended after its
    /// siblings.
    pub fn create_page(&self, mut page: Page, parent: Option<&str>) -> Result<PageTree> {
        if self.contains(&page.id) {
            return Err(ApiError::invalid_operation(format!(
                "page {} already exists",
                page.id
            )));
        }
        let mut next = self.clone();
        page.parent_id = parent.map(str::to_string);
        page.children.clear();
        let id = page.id.clone();
        match parent {
            Some(parent_id) => next.get_mut(parent_id)?.children.push(id.clone()),
            None => next.roots.push(id.clone()),
        }
        info!(page_id = %id, parent_id = ?parent, "Created page");
        next.pages.insert(id, page);
        Ok(next)
    }

    pub fn update_page(&self, id: &str, update: PageUpdate) -> Result<PageTree> {
        let mut next = self.clone();
        let page = next.get_mut(id)?;
        if let Some(title) = update.title {
            page.title = title;
        }
        if let Some(icon) = update.icon {
            page.icon = icon;
        }
        if let Some(cover) = update.cover {
            page.cover = cover;
        }
        if let Some(is_public) = update.is_public {
            page.is_public = is_public;
        }
        page.updated_at = Utc::now();
        debug!(page_id = %id, "Updated page");
        Ok(next)
    }

    /// Remove a page and all its descendants. Returns the removed ids,
    /// the page itself first.
    pub fn delete_page(&self, id: &str) -> Result<(PageTree, Vec<String>)> {
        let parent = self.get(id)?.parent_id.clone();
        let mut next = self.clone();
        next.unlink(id, parent.as_deref())?;

        let mut removed = Vec::new();
        let mut stack = vec![id.to_string()];
        while let Some(current) = stack.pop() {
            if let Some(page) = next.pages.remove(&current) {
                stack.extend(page.children.into_iter().rev());
                removed.push(current);
            }
        }
        info!(page_id = %id, removed = removed.len(), "Deleted page");
        Ok((next, removed))
    }

    pub fn toggle_favorite(&self, id: &str) -> Result<PageTree> {
        let mut next = self.clone();
        let page = next.get_mut(id)?;
        page.is_favorite = !page.is_favorite;
        page.updated_at = Utc::now();
        debug!(page_id = %id, is_favorite = page.is_favorite, "Toggled favorite");
        Ok(next)
    }

    /// Reattach a page (with its subtree) under `new_parent`, or at the root.
    /// Moving a page under itself or one of its descendants fails with
    /// `CyclicMove`.
    pub fn move_page(&self, id: &str, new_parent: Option<&str>) -> Result<PageTree> {
        let old_parent = self.get(id)?.parent_id.clone();
        if let Some(target) = new_parent {
            self.get(target)?;
            if self.is_in_subtree(id, target)? {
                return Err(ApiError::CyclicMove {
                    id: id.to_string(),
                    target_parent: target.to_string(),
                });
            }
        }

        let mut next = self.clone();
        next.unlink(id, old_parent.as_deref())?;
        match new_parent {
            Some(target) => next.get_mut(target)?.children.push(id.to_string()),
            None => next.roots.push(id.to_string()),
        }
        let page = next.get_mut(id)?;
        page.parent_id = new_parent.map(str::to_string);
        page.updated_at = Utc::now();
        info!(page_id = %id, parent_id = ?new_parent, "Moved page");
        Ok(next)
    }

    /// Replace a page's block content in place.
    pub fn set_content(&mut self, id: &str, content: BlockTree) -> Result<()> {
        let page = self.get_mut(id)?;
        page.content = content;
        page.updated_at = Utc::now();
        Ok(())
    }

    fn unlink(&mut self, id: &str, parent: Option<&str>) -> Result<()> {
        match parent {
            Some(parent_id) => self.get_mut(parent_id)?.children.retain(|c| c != id),
            None => self.roots.retain(|r| r != id),
        }
        Ok(())
    }
}

/// Most-recently-selected pages, newest first, capped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recents {
    max: usize,
    items: VecDeque<PageSummary>,
}

impl Default for Recents {
    fn default() -> Self {
        Self::with_max(DEFAULT_MAX_RECENT)
    }
}

impl Recents {
    pub fn with_max(max: usize) -> Self {
        Self {
            max,
            items: VecDeque::with_capacity(max),
        }
    }

    /// Record a selection: the page moves to the front, never duplicated.
    pub fn touch(&mut self, page: PageSummary) {
        self.items.retain(|p| p.id != page.id);
        self.items.push_front(page);
        self.items.truncate(self.max);
    }

    /// Update the stored title/icon of a page without changing its rank.
    pub fn refresh(&mut self, page: PageSummary) {
        if let Some(slot) = self.items.iter_mut().find(|p| p.id == page.id) {
            *slot = page;
        }
    }

    pub fn remove(&mut self, id: &str) {
        self.items.retain(|p| p.id != id);
    }

    pub fn get(&self, id: &str) -> Option<&PageSummary> {
        self.items.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PageSummary> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(id: &str) -> Page {
        Page::new(id, id.to_uppercase(), "tester")
    }

    fn chain() -> PageTree {
        PageTree::new()
            .create_page(page("a"), None)
            .and_then(|t| t.create_page(page("b"), Some("a")))
            .and_then(|t| t.create_page(page("c"), Some("b")))
            .unwrap()
    }

    #[test]
    fn test_breadcrumbs_root_first() {
        let tree = chain();
        let trail: Vec<String> = tree
            .breadcrumbs("c", &Recents::default())
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(trail, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_breadcrumbs_fall_back_to_recents() {
        let tree = chain();
        let mut recents = Recents::default();
        recents.touch(PageSummary {
            id: "shared".into(),
            title: "Shared".into(),
            icon: None,
        });
        assert_eq!(tree.breadcrumbs("shared", &recents).unwrap().len(), 1);
        assert_eq!(
            tree.breadcrumbs("ghost", &recents),
            Err(ApiError::PageNotFound { id: "ghost".into() })
        );
    }

    #[test]
    fn test_move_rejects_cycles() {
        let tree = chain();
        assert_eq!(
            tree.move_page("a", Some("c")),
            Err(ApiError::CyclicMove {
                id: "a".into(),
                target_parent: "c".into()
            })
        );
        assert!(matches!(
            tree.move_page("a", Some("a")),
            Err(ApiError::CyclicMove { .. })
        ));

        let moved = tree.move_page("c", None).unwrap();
        assert_eq!(moved.roots(), &["a", "c"]);
        assert!(moved.get("b").unwrap().children.is_empty());
        assert!(moved.validate().is_ok());
        // Input untouched
        assert_eq!(tree.roots(), &["a"]);
    }

    #[test]
    fn test_delete_is_recursive() {
        let tree = chain();
        let (next, removed) = tree.delete_page("b").unwrap();
        assert_eq!(removed, vec!["b", "c"]);
        assert_eq!(next.len(), 1);
        assert!(next.get("a").unwrap().children.is_empty());
        assert!(matches!(next.get("c"), Err(ApiError::PageNotFound { .. })));
    }

    #[test]
    fn test_update_page_fields() {
        let tree = chain();
        let next = tree
            .update_page(
                "b",
                PageUpdate {
                    title: Some("Bee".into()),
                    icon: Some(Some("🐝".into())),
                    ..Default::default()
                },
            )
            .unwrap();
        let b = next.get("b").unwrap();
        assert_eq!(b.title, "Bee");
        assert_eq!(b.icon.as_deref(), Some("🐝"));
    }

    #[test]
    fn test_recents_move_to_front_and_cap() {
        let mut recents = Recents::with_max(3);
        for id in ["a", "b", "c", "a", "d"] {
            recents.touch(page(id).summary());
        }
        let ids: Vec<&str> = recents.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["d", "a", "c"]);
    }
}
