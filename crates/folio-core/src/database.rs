//! Database model: property schema, rows and saved views of one database
//! block.
//!
//! All operations take the current [`DatabaseContent`] by reference and
//! return a new one. Cell values are accepted permissively: coercion is
//! advisory, and a value that does not fit its property type is logged and
//! stored as given.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, NaiveDate};
use folio_api::{
    ApiError, DatabaseContent, DatabaseProperty, DatabaseRow, DatabaseView, FilterOp,
    PropertyOptions, PropertyType, SortDirection, Value, ViewFilter, ViewType,
};
use tracing::{debug, warn};

use crate::ids::{IdGenerator, UuidIds};
use crate::Result;

/// Partial update of a property definition; `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyPatch {
    pub name: Option<String>,
    pub property_type: Option<PropertyType>,
    pub options: Option<PropertyOptions>,
}

/// Rows grouped under one value of a view's `group_by` property.
#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup<'a> {
    /// Display form of the grouping value (empty for rows without one)
    pub key: String,
    pub rows: Vec<&'a DatabaseRow>,
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseModel<G = UuidIds> {
    ids: G,
}

impl<G: IdGenerator> DatabaseModel<G> {
    pub fn new(ids: G) -> Self {
        Self { ids }
    }

    // ===== Schema =====

    /// Property definition with a freshly generated id.
    pub fn new_property(&self, name: impl Into<String>, property_type: PropertyType) -> DatabaseProperty {
        DatabaseProperty::new(self.ids.next_id(), name, property_type)
    }

    /// Append a property. Names may repeat; properties are identified by id.
    pub fn add_property(
        &self,
        content: &DatabaseContent,
        property: DatabaseProperty,
    ) -> Result<DatabaseContent> {
        if content.property(&property.id).is_some() {
            return Err(ApiError::DuplicateId { id: property.id });
        }
        let mut next = content.clone();
        debug!(property_id = %property.id, name = %property.name, "Added database property");
        next.properties.push(property);
        Ok(next)
    }

    pub fn update_property(
        &self,
        content: &DatabaseContent,
        property_id: &str,
        patch: PropertyPatch,
    ) -> Result<DatabaseContent> {
        let mut next = content.clone();
        let property = next
            .properties
            .iter_mut()
            .find(|p| p.id == property_id)
            .ok_or_else(|| ApiError::PropertyNotFound {
                id: property_id.to_string(),
            })?;
        if let Some(name) = patch.name {
            property.name = name;
        }
        if let Some(property_type) = patch.property_type {
            property.property_type = property_type;
        }
        if let Some(options) = patch.options {
            property.options = Some(options);
        }
        debug!(property_id = %property_id, "Updated database property");
        Ok(next)
    }

    /// Remove a property from the schema.
    ///
    /// Row values stored under the property id are kept; they become
    /// unreachable through the schema but are preserved on write. Views that
    /// filter, sort or group on the property drop those clauses.
    pub fn remove_property(
        &self,
        content: &DatabaseContent,
        property_id: &str,
    ) -> Result<DatabaseContent> {
        if content.property(property_id).is_none() {
            return Err(ApiError::PropertyNotFound {
                id: property_id.to_string(),
            });
        }
        let mut next = content.clone();
        next.properties.retain(|p| p.id != property_id);
        for view in next.views.iter_mut() {
            view.filters.retain(|f| f.property_id != property_id);
            view.sorts.retain(|s| s.property_id != property_id);
            if view.group_by.as_deref() == Some(property_id) {
                view.group_by = None;
            }
        }
        debug!(property_id = %property_id, "Removed database property");
        Ok(next)
    }

    // ===== Rows =====

    /// Append a row with a fresh id. Missing cells render as the empty value
    /// of their property's type.
    pub fn add_row(
        &self,
        content: &DatabaseContent,
        initial: Option<HashMap<String, Value>>,
    ) -> Result<(DatabaseContent, String)> {
        let mut row = DatabaseRow::new(self.ids.next_id());
        for (key, value) in initial.unwrap_or_default() {
            let value = match content.property(&key) {
                Some(property) => normalize_cell(property, value),
                None => value,
            };
            row.properties.insert(key, value);
        }
        let id = row.id.clone();
        let mut next = content.clone();
        next.rows.push(row);
        debug!(row_id = %id, "Added database row");
        Ok((next, id))
    }

    /// Merge `properties` over the row's existing map: given keys win,
    /// others persist.
    pub fn update_row(
        &self,
        content: &DatabaseContent,
        row_id: &str,
        properties: HashMap<String, Value>,
    ) -> Result<DatabaseContent> {
        let mut next = content.clone();
        let row = next
            .rows
            .iter_mut()
            .find(|r| r.id == row_id)
            .ok_or_else(|| ApiError::RowNotFound {
                id: row_id.to_string(),
            })?;
        for (key, value) in properties {
            let value = match content.property(&key) {
                Some(property) => normalize_cell(property, value),
                None => value,
            };
            row.properties.insert(key, value);
        }
        debug!(row_id = %row_id, "Updated database row");
        Ok(next)
    }

    pub fn delete_row(&self, content: &DatabaseContent, row_id: &str) -> Result<DatabaseContent> {
        if !content.rows.iter().any(|r| r.id == row_id) {
            return Err(ApiError::RowNotFound {
                id: row_id.to_string(),
            });
        }
        let mut next = content.clone();
        next.rows.retain(|r| r.id != row_id);
        debug!(row_id = %row_id, "Deleted database row");
        Ok(next)
    }

    // ===== Views =====

    pub fn add_view(
        &self,
        content: &DatabaseContent,
        name: impl Into<String>,
        view_type: ViewType,
    ) -> Result<(DatabaseContent, String)> {
        let view = DatabaseView::new(self.ids.next_id(), name, view_type);
        let id = view.id.clone();
        let mut next = content.clone();
        next.views.push(view);
        if next.current_view.is_none() {
            next.current_view = Some(id.clone());
        }
        debug!(view_id = %id, "Added database view");
        Ok((next, id))
    }

    /// Replace the view with the same id.
    pub fn update_view(&self, content: &DatabaseContent, view: DatabaseView) -> Result<DatabaseContent> {
        let mut next = content.clone();
        let slot = next
            .views
            .iter_mut()
            .find(|v| v.id == view.id)
            .ok_or_else(|| ApiError::ViewNotFound {
                id: view.id.clone(),
            })?;
        *slot = view;
        Ok(next)
    }

    /// Remove a view. If it was current, the first remaining view becomes
    /// current.
    pub fn remove_view(&self, content: &DatabaseContent, view_id: &str) -> Result<DatabaseContent> {
        if content.view(view_id).is_none() {
            return Err(ApiError::ViewNotFound {
                id: view_id.to_string(),
            });
        }
        let mut next = content.clone();
        next.views.retain(|v| v.id != view_id);
        if next.current_view.as_deref() == Some(view_id) {
            next.current_view = next.views.first().map(|v| v.id.clone());
        }
        Ok(next)
    }

    pub fn set_current_view(&self, content: &DatabaseContent, view_id: &str) -> Result<DatabaseContent> {
        if content.view(view_id).is_none() {
            return Err(ApiError::ViewNotFound {
                id: view_id.to_string(),
            });
        }
        let mut next = content.clone();
        next.current_view = Some(view_id.to_string());
        Ok(next)
    }
}

// =============================================================================
// Cell values
// =============================================================================

/// The value a row shows for `property`, falling back to the type's empty
/// value when the row has no entry.
pub fn cell_or_default(row: &DatabaseRow, property: &DatabaseProperty) -> Value {
    row.get(&property.id)
        .cloned()
        .unwrap_or_else(|| property.property_type.empty_value())
}

/// Parse a number cell on read. Numbers are stored as typed.
pub fn read_number(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(_) | Value::Float(_) => value.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Advisory coercion of a cell written to `property`.
///
/// Checkboxes are coerced to booleans, numbers are kept as the literal
/// string that was typed, dates are expected as ISO `YYYY-MM-DD`. Values
/// that do not fit are logged as `InvalidPropertyValue` and stored as given.
pub fn normalize_cell(property: &DatabaseProperty, value: Value) -> Value {
    match property.property_type {
        PropertyType::Checkbox => match coerce_bool(&value) {
            Some(b) => Value::Boolean(b),
            None => {
                report_invalid(property, &value, "expected a boolean");
                value
            }
        },
        PropertyType::Number => {
            let literal = match value {
                Value::Integer(_) | Value::Float(_) => Value::String(value.to_display_string()),
                other => other,
            };
            if !literal.is_blank() && read_number(&literal).is_none() {
                report_invalid(property, &literal, "expected a number");
            }
            literal
        }
        PropertyType::Date => {
            if let Some(s) = value.as_string() {
                if !s.trim().is_empty() && parse_date(s).is_none() {
                    report_invalid(property, &value, "expected an ISO date");
                }
            } else if !value.is_null() {
                report_invalid(property, &value, "expected an ISO date string");
            }
            value
        }
        _ => value,
    }
}

/// Accepts `YYYY-MM-DD` and full RFC 3339 timestamps.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
}

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(b) => Some(*b),
        Value::Null => Some(false),
        Value::Integer(i) => Some(*i != 0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" | "on" | "checked" => Some(true),
            "false" | "no" | "0" | "off" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn report_invalid(property: &DatabaseProperty, value: &Value, message: &str) {
    let error = ApiError::InvalidPropertyValue {
        property_id: property.id.clone(),
        message: message.to_string(),
    };
    warn!(%error, value = %value.to_display_string(), "Storing cell value as given");
}

// =============================================================================
// Projection
// =============================================================================

/// Resolve `view_id`, or the current view when `None`.
fn resolve_view<'a>(content: &'a DatabaseContent, view_id: Option<&str>) -> Result<Option<&'a DatabaseView>> {
    match view_id.or(content.current_view.as_deref()) {
        Some(id) => content
            .view(id)
            .map(Some)
            .ok_or_else(|| ApiError::ViewNotFound { id: id.to_string() }),
        None => Ok(None),
    }
}

/// Rows visible in a view: filters ANDed, then sorts applied in order
/// (stable, so ties keep insertion order). Rows are borrowed, never changed.
pub fn project<'a>(content: &'a DatabaseContent, view_id: Option<&str>) -> Result<Vec<&'a DatabaseRow>> {
    let Some(view) = resolve_view(content, view_id)? else {
        return Ok(content.rows.iter().collect());
    };

    let mut rows: Vec<&DatabaseRow> = content
        .rows
        .iter()
        .filter(|row| view.filters.iter().all(|f| matches_filter(content, row, f)))
        .collect();

    rows.sort_by(|a, b| {
        for sort in &view.sorts {
            let Some(property) = content.property(&sort.property_id) else {
                continue;
            };
            let ordering = compare_cells(
                &cell_or_default(a, property),
                &cell_or_default(b, property),
                sort.direction,
            );
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
    Ok(rows)
}

/// Projected rows bucketed by the view's `group_by` property, groups in
/// first-seen order. Multi-valued cells place the row in every group they
/// name. Without `group_by` everything lands in one group.
pub fn group_rows<'a>(content: &'a DatabaseContent, view_id: Option<&str>) -> Result<Vec<RowGroup<'a>>> {
    let rows = project(content, view_id)?;
    let group_by = resolve_view(content, view_id)?
        .and_then(|v| v.group_by.as_deref())
        .and_then(|id| content.property(id));

    let Some(property) = group_by else {
        return Ok(vec![RowGroup {
            key: String::new(),
            rows,
        }]);
    };

    let mut groups: Vec<RowGroup<'a>> = Vec::new();
    for row in rows {
        let value = cell_or_default(row, property);
        let keys = match value.as_array() {
            Some(items) if !items.is_empty() => {
                items.iter().map(Value::to_display_string).collect()
            }
            _ => vec![value.to_display_string()],
        };
        for key in keys {
            match groups.iter_mut().find(|g| g.key == key) {
                Some(group) => group.rows.push(row),
                None => groups.push(RowGroup {
                    key,
                    rows: vec![row],
                }),
            }
        }
    }
    Ok(groups)
}

fn matches_filter(content: &DatabaseContent, row: &DatabaseRow, filter: &ViewFilter) -> bool {
    let cell = match content.property(&filter.property_id) {
        Some(property) => cell_or_default(row, property),
        None => row.get(&filter.property_id).cloned().unwrap_or_default(),
    };
    match filter.op {
        FilterOp::IsEmpty => cell.is_blank(),
        FilterOp::IsNotEmpty => !cell.is_blank(),
        FilterOp::Equals => cells_equal(&cell, &filter.value),
        FilterOp::NotEquals => !cells_equal(&cell, &filter.value),
        FilterOp::Contains => {
            let needle = filter.value.to_display_string().to_lowercase();
            match cell.as_array() {
                Some(items) => items
                    .iter()
                    .any(|item| item.to_display_string().to_lowercase() == needle),
                None => cell.to_display_string().to_lowercase().contains(&needle),
            }
        }
    }
}

fn cells_equal(a: &Value, b: &Value) -> bool {
    match (read_number(a), read_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => a.to_display_string() == b.to_display_string(),
    }
}

/// Blank cells sort last in either direction.
fn compare_cells(a: &Value, b: &Value, direction: SortDirection) -> Ordering {
    match (a.is_blank(), b.is_blank()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        _ => {}
    }
    let ordering = match (read_number(a), read_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => match (a.as_bool(), b.as_bool()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => a
                .to_display_string()
                .to_lowercase()
                .cmp(&b.to_display_string().to_lowercase()),
        },
    };
    match direction {
        SortDirection::Ascending => ordering,
        SortDirection::Descending => ordering.reverse(),
    }
}
