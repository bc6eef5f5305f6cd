//! Undo/redo history over snapshots
//!
//! Edits are pure snapshot transitions, so undoing one is restoring the
//! snapshot it started from. Each entry keeps both ends of the transition.

/// One recorded edit.
#[derive(Debug, Clone, PartialEq)]
pub struct UndoEntry<S> {
    /// Display name for the UI ("Insert block", "Retype block", ...)
    pub label: String,
    pub before: S,
    pub after: S,
}

/// Undo/redo history stack
///
/// Maintains two stacks:
/// - `undo`: edits that can be undone, most recent last
/// - `redo`: edits that were undone and can be redone, most recent last
#[derive(Debug, Clone)]
pub struct UndoStack<S> {
    undo: Vec<UndoEntry<S>>,
    redo: Vec<UndoEntry<S>>,
    /// Maximum number of entries to keep in the undo stack
    max_size: usize,
}

impl<S: Clone> UndoStack<S> {
    /// Create a new undo stack with default max size
    pub fn new() -> Self {
        Self::with_max_size(100)
    }

    pub fn with_max_size(max_size: usize) -> Self {
        Self {
            undo: Vec::new(),
            redo: Vec::new(),
            max_size,
        }
    }

    /// Record an edit. Clears the redo stack.
    pub fn push(&mut self, label: impl Into<String>, before: S, after: S) {
        self.redo.clear();

        self.undo.push(UndoEntry {
            label: label.into(),
            before,
            after,
        });

        if self.undo.len() > self.max_size {
            self.undo.remove(0);
        }
    }

    /// Pop the latest edit and return it; its `before` snapshot is what
    /// should be restored. The entry moves to the redo stack.
    pub fn pop_for_undo(&mut self) -> Option<UndoEntry<S>> {
        let entry = self.undo.pop()?;
        self.redo.push(entry.clone());
        Some(entry)
    }

    /// Pop the latest undone edit; its `after` snapshot is what should be
    /// restored. The entry moves back to the undo stack.
    pub fn pop_for_redo(&mut self) -> Option<UndoEntry<S>> {
        let entry = self.redo.pop()?;
        self.undo.push(entry.clone());
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }

    /// Drop every entry, in both stacks, matching `pred`.
    pub fn discard_where<F>(&mut self, mut pred: F)
    where
        F: FnMut(&UndoEntry<S>) -> bool,
    {
        self.undo.retain(|e| !pred(e));
        self.redo.retain(|e| !pred(e));
    }

    /// Label of the next undo operation (for UI)
    pub fn next_undo_label(&self) -> Option<&str> {
        self.undo.last().map(|e| e.label.as_str())
    }

    /// Label of the next redo operation (for UI)
    pub fn next_redo_label(&self) -> Option<&str> {
        self.redo.last().map(|e| e.label.as_str())
    }
}

impl<S: Clone> Default for UndoStack<S> {
    fn default() -> Self {
        Self::new()
    }
}
