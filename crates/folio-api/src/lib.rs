use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub mod block;
pub mod database;
pub mod page;
pub mod tree;

// Re-export block types
pub use block::{
    Alignment, Block, BlockContent, BlockMetadata, BlockNode, BlockProperties, BlockType,
    BookmarkContent, CalloutContent, CheckboxContent, CodeContent, ColumnsContent, ContentFamily,
    EmptyContent, FormattingKind, MathContent, MediaContent, TableContent, TextContent,
    TextFormatting,
};

// Re-export database types
pub use database::{
    DatabaseContent, DatabaseProperty, DatabaseRow, DatabaseView, FilterOp, PropertyOptions,
    PropertyType, SortDirection, ViewFilter, ViewSort, ViewType,
};

// Re-export page types
pub use page::{BreadcrumbItem, Page, PageMetadata, PageSummary};

pub use tree::{BlockTree, Flatten};

/// Dynamic value stored in database cells.
///
/// Cells are deliberately loosely typed: the editing surface decides what it
/// writes, and the database model only coerces on the few paths that need it.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Array(Vec<Value>),
    Object(HashMap<String, Value>),
    Null,
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

impl Value {
    /// Create a Value from a serde_json::Value
    pub fn from_json_value(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Integer(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::String(n.to_string())
                }
            }
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from_json_value).collect())
            }
            serde_json::Value::Object(obj) => Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, Value::from_json_value(v)))
                    .collect(),
            ),
        }
    }

    /// Get string value, returning None if not a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// True for null, blank strings and empty arrays.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Array(arr) => arr.is_empty(),
            _ => false,
        }
    }

    /// Plain text rendering used for filtering and grouping.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::String(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Array(arr) => arr
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(", "),
            Value::Object(_) => serde_json::to_string(self).unwrap_or_default(),
            Value::Null => String::new(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T> From<Vec<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(|x| x.into()).collect())
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json_value(v)
    }
}

impl From<Value> for serde_json::Value {
    fn from(v: Value) -> Self {
        match v {
            Value::String(s) => serde_json::Value::String(s),
            Value::Integer(i) => serde_json::Value::Number(serde_json::Number::from(i)),
            Value::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Boolean(b) => serde_json::Value::Bool(b),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.into_iter().map(Into::into).collect())
            }
            Value::Object(obj) => {
                serde_json::Value::Object(obj.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            Value::Null => serde_json::Value::Null,
        }
    }
}

/// Structured error types for model operations.
///
/// Every variant is a local, synchronous failure of a single call. The
/// snapshot the call was given stays valid and untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum ApiError {
    #[error("Block not found: {id}")]
    BlockNotFound { id: String },

    #[error("Anchor block not found: {id}")]
    AnchorNotFound { id: String },

    #[error("Page not found: {id}")]
    PageNotFound { id: String },

    #[error("Unknown block type: {tag}")]
    UnknownBlockType { tag: String },

    #[error("Duplicate block id: {id}")]
    DuplicateId { id: String },

    #[error("Cyclic move detected: cannot move {id} under its descendant {target_parent}")]
    CyclicMove { id: String, target_parent: String },

    #[error("Invalid value for property {property_id}: {message}")]
    InvalidPropertyValue {
        property_id: String,
        message: String,
    },

    #[error("Property not found: {id}")]
    PropertyNotFound { id: String },

    #[error("Row not found: {id}")]
    RowNotFound { id: String },

    #[error("View not found: {id}")]
    ViewNotFound { id: String },

    #[error("Template not found: {id}")]
    TemplateNotFound { id: String },

    #[error("Invalid content for {block_type}: {message}")]
    InvalidContent { block_type: String, message: String },

    #[error("Invalid operation: {message}")]
    InvalidOperation { message: String },

    #[error("Store error: {message}")]
    StoreError { message: String },
}

impl ApiError {
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        ApiError::InvalidOperation {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_accessors() {
        let v = Value::Boolean(true);
        assert_eq!(v.as_bool(), Some(true));
        assert_eq!(v.as_f64(), None);

        let v = Value::Integer(42);
        assert_eq!(v.as_f64(), Some(42.0));

        let v: Value = vec!["a", "b"].into();
        assert_eq!(v.as_array().map(Vec::len), Some(2));

        let v = Value::String("hello".to_string());
        assert_eq!(v.as_string(), Some("hello"));

        assert!(Value::Null.is_null());
        assert!(Value::String("   ".into()).is_blank());
        assert!(!Value::Boolean(false).is_blank());
    }

    #[test]
    fn test_value_from() {
        let v: Value = None::<i64>.into();
        assert_eq!(v, Value::Null);

        let v: Value = Some(42).into();
        assert_eq!(v, Value::Integer(42));

        let v: Value = vec!["a", "b"].into();
        assert_eq!(v.to_display_string(), "a, b");
    }

    #[test]
    fn test_value_json_untagged() {
        let parsed: Value = serde_json::from_str(r#"{"done": true, "n": 3}"#).unwrap();
        let Value::Object(obj) = parsed else {
            panic!("expected an object, got {parsed:?}");
        };
        assert_eq!(obj.get("done"), Some(&Value::Boolean(true)));
        assert_eq!(obj.get("n"), Some(&Value::Integer(3)));
    }

    #[test]
    fn test_api_error_serialization() {
        let errors = vec![
            ApiError::BlockNotFound {
                id: "b1".to_string(),
            },
            ApiError::CyclicMove {
                id: "p1".to_string(),
                target_parent: "p2".to_string(),
            },
            ApiError::UnknownBlockType {
                tag: "hologram".to_string(),
            },
            ApiError::invalid_operation("nope"),
        ];

        for error in errors {
            let json = serde_json::to_string(&error).expect("Failed to serialize error");
            let deserialized: ApiError =
                serde_json::from_str(&json).expect("Failed to deserialize error");
            assert_eq!(error, deserialized);
        }
    }
}
