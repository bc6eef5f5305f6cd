//! Block, page and property id generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh identifiers.
///
/// Every id handed out is distinct from every id previously handed out by the
/// same generator. Uniqueness within a page is additionally enforced by the
/// tree (`DuplicateId`), so a generator only has to avoid self-collisions.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> String;

    /// Note an id that already exists (e.g. loaded from a store) so it is
    /// never handed out again. Random schemes can ignore this.
    fn reserve(&self, _id: &str) {}
}

/// Random v4 UUIDs, the production scheme.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidIds;

impl IdGenerator for UuidIds {
    fn next_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Counter-based ids (`block-0`, `block-1`, ...).
///
/// The same sequence of operations always produces the same ids, which keeps
/// tests and property-based runs deterministic.
#[derive(Debug)]
pub struct SequentialIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialIds {
    pub fn new() -> Self {
        Self::with_prefix("block")
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{}", self.prefix, n)
    }

    /// Move the counter past `<prefix>-N`. Ids in any other form cannot
    /// collide with this generator's output and are ignored.
    fn reserve(&self, id: &str) {
        let counter = id
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|n| n.parse::<u64>().ok());
        if let Some(n) = counter {
            self.next.fetch_max(n.saturating_add(1), Ordering::Relaxed);
        }
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for Box<G> {
    fn next_id(&self) -> String {
        (**self).next_id()
    }

    fn reserve(&self, id: &str) {
        (**self).reserve(id)
    }
}

impl<G: IdGenerator + ?Sized> IdGenerator for &G {
    fn next_id(&self) -> String {
        (**self).next_id()
    }

    fn reserve(&self, id: &str) {
        (**self).reserve(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_sequential_ids_are_deterministic() {
        let ids = SequentialIds::new();
        assert_eq!(ids.next_id(), "block-0");
        assert_eq!(ids.next_id(), "block-1");

        let pages = SequentialIds::with_prefix("page");
        assert_eq!(pages.next_id(), "page-0");
    }

    #[test]
    fn test_reserve_skips_existing_ids() {
        let ids = SequentialIds::new();
        ids.reserve("block-4");
        ids.reserve("block-2");
        ids.reserve("page-9");
        ids.reserve("block-x");
        ids.reserve("blocky-7");
        assert_eq!(ids.next_id(), "block-5");

        // Boxed generators forward the reservation
        let boxed: Box<dyn IdGenerator> = Box::new(SequentialIds::new());
        boxed.reserve("block-0");
        assert_eq!(boxed.next_id(), "block-1");
    }

    #[test]
    fn test_uuid_ids_do_not_repeat() {
        let ids = UuidIds;
        let seen: HashSet<String> = (0..100).map(|_| ids.next_id()).collect();
        assert_eq!(seen.len(), 100);
    }
}
