//! In-process model of a block-based page editor.
//!
//! Every editing primitive is a pure function over an immutable snapshot:
//! it takes a `BlockTree` (or page list, or database content) by reference
//! and returns a new value, leaving its input untouched on success and on
//! failure alike. Session state (selected page, recents, undo history) lives
//! in an explicit [`workspace::Workspace`] value.

pub mod config;
pub mod database;
pub mod engine;
pub mod ids;
pub mod pages;
pub mod records;
pub mod registry;
pub mod store;
pub mod table;
pub mod telemetry;
pub mod templates;
pub mod undo;
pub mod workspace;

pub use folio_api::{ApiError, Value};

pub use config::{IdScheme, WorkspaceConfig};
pub use engine::{is_empty, Edit, MutationEngine};
pub use ids::{IdGenerator, SequentialIds, UuidIds};
pub use pages::{PageTree, PageUpdate, Recents};
pub use registry::BlockSpec;
pub use store::{MemoryStore, PageStore};
pub use table::TableOp;
pub use templates::{DatabaseTemplate, PageTemplate, TemplateCategory, TemplateLibrary};
pub use undo::UndoStack;
pub use workspace::Workspace;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ApiError>;
