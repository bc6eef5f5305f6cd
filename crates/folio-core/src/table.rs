//! Editing operations for the simple `table` block.
//!
//! Each operation updates the header row and every body row in one step, so
//! `rows[i].len() == headers.len()` holds before and after every call. On
//! error the table is left untouched.

use folio_api::{ApiError, TableContent};
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TableOp {
    /// Append a column headed `Column N+1`
    AddColumn,
    RemoveColumn { index: usize },
    /// Append a row of empty cells
    AddRow,
    RemoveRow { index: usize },
    SetHeader { index: usize, text: String },
    SetCell { row: usize, column: usize, text: String },
    SetHasHeader { has_header: bool },
}

impl TableOp {
    pub fn name(&self) -> &'static str {
        match self {
            TableOp::AddColumn => "add_column",
            TableOp::RemoveColumn { .. } => "remove_column",
            TableOp::AddRow => "add_row",
            TableOp::RemoveRow { .. } => "remove_row",
            TableOp::SetHeader { .. } => "set_header",
            TableOp::SetCell { .. } => "set_cell",
            TableOp::SetHasHeader { .. } => "set_has_header",
        }
    }
}

/// Apply `op` to `table` in place.
pub fn apply(table: &mut TableContent, op: &TableOp) -> Result<()> {
    match op {
        TableOp::AddColumn => {
            add_column(table);
            Ok(())
        }
        TableOp::RemoveColumn { index } => remove_column(table, *index),
        TableOp::AddRow => {
            add_row(table);
            Ok(())
        }
        TableOp::RemoveRow { index } => remove_row(table, *index),
        TableOp::SetHeader { index, text } => set_header(table, *index, text),
        TableOp::SetCell { row, column, text } => set_cell(table, *row, *column, text),
        TableOp::SetHasHeader { has_header } => {
            table.has_header = *has_header;
            Ok(())
        }
    }
}

pub fn add_column(table: &mut TableContent) {
    let header = format!("Column {}", table.headers.len() + 1);
    table.headers.push(header);
    for row in table.rows.iter_mut() {
        row.push(String::new());
    }
}

pub fn remove_column(table: &mut TableContent, index: usize) -> Result<()> {
    if table.headers.len() <= 1 {
        return Err(ApiError::invalid_operation("cannot remove the last table column"));
    }
    check_index("column", index, table.headers.len())?;
    table.headers.remove(index);
    for row in table.rows.iter_mut() {
        if index < row.len() {
            row.remove(index);
        }
    }
    Ok(())
}

pub fn add_row(table: &mut TableContent) {
    table.rows.push(vec![String::new(); table.headers.len()]);
}

pub fn remove_row(table: &mut TableContent, index: usize) -> Result<()> {
    if table.rows.len() <= 1 {
        return Err(ApiError::invalid_operation("cannot remove the last table row"));
    }
    check_index("row", index, table.rows.len())?;
    table.rows.remove(index);
    Ok(())
}

pub fn set_header(table: &mut TableContent, index: usize, text: &str) -> Result<()> {
    check_index("column", index, table.headers.len())?;
    table.headers[index] = text.to_string();
    Ok(())
}

pub fn set_cell(table: &mut TableContent, row: usize, column: usize, text: &str) -> Result<()> {
    check_index("row", row, table.rows.len())?;
    check_index("column", column, table.headers.len())?;
    let cells = &mut table.rows[row];
    // Pad ragged rows loaded from older data before writing
    if cells.len() < table.headers.len() {
        cells.resize(table.headers.len(), String::new());
    }
    cells[column] = text.to_string();
    Ok(())
}

fn check_index(what: &str, index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(ApiError::invalid_operation(format!(
            "{what} index {index} out of range (table has {len})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> TableContent {
        TableContent {
            headers: vec!["A".into(), "B".into(), "C".into()],
            rows: vec![
                vec!["a1".into(), "b1".into(), "c1".into()],
                vec!["a2".into(), "b2".into(), "c2".into()],
            ],
            has_header: true,
        }
    }

    #[test]
    fn test_add_column_extends_every_row() {
        let mut table = grid();
        apply(&mut table, &TableOp::AddColumn).unwrap();
        assert_eq!(table.headers.last().unwrap(), "Column 4");
        assert!(table.is_rectangular());
        assert_eq!(table.rows[1][3], "");
    }

    #[test]
    fn test_remove_column_keeps_remaining_cells_aligned() {
        let mut table = grid();
        apply(&mut table, &TableOp::RemoveColumn { index: 1 }).unwrap();
        assert_eq!(table.headers, vec!["A", "C"]);
        assert_eq!(table.rows[0], vec!["a1", "c1"]);
        assert_eq!(table.rows[1], vec!["a2", "c2"]);
    }

    #[test]
    fn test_last_column_and_row_are_protected() {
        let mut table = TableContent {
            headers: vec!["Only".into()],
            rows: vec![vec!["x".into()]],
            has_header: false,
        };
        let before = table.clone();
        assert!(matches!(
            apply(&mut table, &TableOp::RemoveColumn { index: 0 }),
            Err(ApiError::InvalidOperation { .. })
        ));
        assert!(matches!(
            apply(&mut table, &TableOp::RemoveRow { index: 0 }),
            Err(ApiError::InvalidOperation { .. })
        ));
        assert_eq!(table, before);
    }

    #[test]
    fn test_set_cell_bounds() {
        let mut table = grid();
        apply(
            &mut table,
            &TableOp::SetCell {
                row: 1,
                column: 2,
                text: "new".into(),
            },
        )
        .unwrap();
        assert_eq!(table.rows[1][2], "new");
        assert!(set_cell(&mut table, 5, 0, "x").is_err());
        assert!(set_header(&mut table, 3, "x").is_err());
    }

    #[test]
    fn test_op_wire_shape() {
        let op: TableOp = serde_json::from_value(serde_json::json!({
            "op": "set_header", "index": 0, "text": "Name"
        }))
        .unwrap();
        assert_eq!(op.name(), "set_header");
    }
}
