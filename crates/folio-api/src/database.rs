//! Types for in-page databases (`database-full` / `database-inline` blocks).
//!
//! A database is a typed property schema, rows keyed by property id, and a
//! set of saved views. Views are projections: they never rewrite rows.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PropertyType {
    Title,
    Text,
    Number,
    Select,
    MultiSelect,
    Date,
    Person,
    Files,
    Checkbox,
    Url,
    Email,
    Phone,
    Formula,
    Relation,
    Rollup,
    CreatedTime,
    CreatedBy,
    LastEditedTime,
    LastEditedBy,
}

impl PropertyType {
    /// The value a cell of this type shows when the row has no entry for it.
    pub fn empty_value(&self) -> Value {
        match self {
            PropertyType::Checkbox => Value::Boolean(false),
            PropertyType::MultiSelect | PropertyType::Files | PropertyType::Person => {
                Value::Array(Vec::new())
            }
            PropertyType::Number
            | PropertyType::Date
            | PropertyType::Select
            | PropertyType::CreatedTime
            | PropertyType::LastEditedTime => Value::Null,
            _ => Value::String(String::new()),
        }
    }
}

/// Type-dependent property options.
///
/// `options` holds the choices of select / multi-select properties; anything
/// else a client stored is kept verbatim in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyOptions {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl PropertyOptions {
    pub fn choices<I, S>(choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            options: choices.into_iter().map(Into::into).collect(),
            extra: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseProperty {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<PropertyOptions>,
}

impl DatabaseProperty {
    pub fn new(id: impl Into<String>, name: impl Into<String>, property_type: PropertyType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            property_type,
            options: None,
        }
    }

    /// Builder: set select choices
    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(PropertyOptions::choices(choices));
        self
    }
}

/// A row: cell values keyed by property id.
///
/// Keys that no longer match a schema property are kept (ignored on read,
/// preserved on write).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatabaseRow {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, Value>,
}

impl DatabaseRow {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            properties: HashMap::new(),
        }
    }

    pub fn get(&self, property_id: &str) -> Option<&Value> {
        self.properties.get(property_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewType {
    Table,
    Board,
    Calendar,
    Timeline,
    Gallery,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOp {
    Equals,
    NotEquals,
    Contains,
    IsEmpty,
    IsNotEmpty,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFilter {
    pub property_id: String,
    pub op: FilterOp,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewSort {
    pub property_id: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// A saved projection over the rows of a database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseView {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub view_type: ViewType,
    #[serde(default)]
    pub filters: Vec<ViewFilter>,
    #[serde(default)]
    pub sorts: Vec<ViewSort>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
}

impl DatabaseView {
    pub fn new(id: impl Into<String>, name: impl Into<String>, view_type: ViewType) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            view_type,
            filters: Vec::new(),
            sorts: Vec::new(),
            group_by: None,
        }
    }
}

/// Content payload of a database block.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DatabaseContent {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub properties: Vec<DatabaseProperty>,
    pub rows: Vec<DatabaseRow>,
    pub views: Vec<DatabaseView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_view: Option<String>,
}

impl DatabaseContent {
    pub fn property(&self, id: &str) -> Option<&DatabaseProperty> {
        self.properties.iter().find(|p| p.id == id)
    }

    pub fn view(&self, id: &str) -> Option<&DatabaseView> {
        self.views.iter().find(|v| v.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_wire_shape() {
        let prop = DatabaseProperty::new("p1", "Status", PropertyType::MultiSelect)
            .with_choices(["Todo", "Done"]);
        let json = serde_json::to_value(&prop).unwrap();
        assert_eq!(json["type"], "multi-select");
        assert_eq!(json["options"]["options"][1], "Done");
    }

    #[test]
    fn test_property_options_keep_unknown_keys() {
        let json = serde_json::json!({"options": ["A"], "format": "percent"});
        let options: PropertyOptions = serde_json::from_value(json).unwrap();
        assert_eq!(options.options, vec!["A".to_string()]);
        assert_eq!(options.extra.get("format"), Some(&serde_json::json!("percent")));
    }

    #[test]
    fn test_empty_values() {
        assert_eq!(PropertyType::Checkbox.empty_value(), Value::Boolean(false));
        assert_eq!(PropertyType::MultiSelect.empty_value(), Value::Array(vec![]));
        assert_eq!(PropertyType::Number.empty_value(), Value::Null);
        assert_eq!(
            PropertyType::Title.empty_value(),
            Value::String(String::new())
        );
    }
}
