//! The ledger collaborator: named sheets of string cells, addressed by
//! zero-based (row, col).

use std::collections::BTreeMap;

use crate::error::{LedgerError, Result};
use crate::layout::column_letter;

pub type Row = Vec<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: usize,
    pub col: usize,
}

impl CellAddress {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Spreadsheet notation, e.g. `D3`.
    pub fn a1(&self) -> String {
        format!("{}{}", column_letter(self.col), self.row + 1)
    }
}

/// Storage backend for the ledger grid.
///
/// Writes to cells beyond the current extent grow the sheet.
pub trait LedgerBackend: Send {
    fn sheet_names(&self) -> Result<Vec<String>>;
    fn read_all_cells(&self, sheet: &str) -> Result<Vec<Row>>;
    fn write_cell(&mut self, sheet: &str, at: CellAddress, value: &str) -> Result<()>;
    /// Write several cells of one sheet. Backends that store whole sheets
    /// apply the batch in a single write.
    fn write_cells(&mut self, sheet: &str, cells: &[(CellAddress, String)]) -> Result<()> {
        for (at, value) in cells {
            self.write_cell(sheet, *at, value)?;
        }
        Ok(())
    }
    fn append_row(&mut self, sheet: &str, row: Row) -> Result<()>;
    /// Create `sheet` if missing. Returns true when it was created.
    fn ensure_sheet(&mut self, sheet: &str) -> Result<bool>;
    fn clear_sheet(&mut self, sheet: &str) -> Result<()>;
}

/// Text of a cell, `""` when out of range.
pub fn cell_text(rows: &[Row], row: usize, col: usize) -> &str {
    rows.get(row)
        .and_then(|r| r.get(col))
        .map(String::as_str)
        .unwrap_or("")
}

pub(crate) fn set_cell(rows: &mut Vec<Row>, at: CellAddress, value: &str) {
    if rows.len() <= at.row {
        rows.resize_with(at.row + 1, Vec::new);
    }
    let row = &mut rows[at.row];
    if row.len() <= at.col {
        row.resize(at.col + 1, String::new());
    }
    row[at.col] = value.to_string();
}

/// In-memory grid, used by tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryGrid {
    sheets: BTreeMap<String, Vec<Row>>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    fn sheet_mut(&mut self, sheet: &str) -> Result<&mut Vec<Row>> {
        self.sheets
            .get_mut(sheet)
            .ok_or_else(|| LedgerError::MissingSheet(sheet.to_string()))
    }
}

impl LedgerBackend for MemoryGrid {
    fn sheet_names(&self) -> Result<Vec<String>> {
        Ok(self.sheets.keys().cloned().collect())
    }

    fn read_all_cells(&self, sheet: &str) -> Result<Vec<Row>> {
        self.sheets
            .get(sheet)
            .cloned()
            .ok_or_else(|| LedgerError::MissingSheet(sheet.to_string()))
    }

    fn write_cell(&mut self, sheet: &str, at: CellAddress, value: &str) -> Result<()> {
        set_cell(self.sheet_mut(sheet)?, at, value);
        Ok(())
    }

    fn append_row(&mut self, sheet: &str, row: Row) -> Result<()> {
        self.sheet_mut(sheet)?.push(row);
        Ok(())
    }

    fn ensure_sheet(&mut self, sheet: &str) -> Result<bool> {
        if self.sheets.contains_key(sheet) {
            return Ok(false);
        }
        self.sheets.insert(sheet.to_string(), Vec::new());
        Ok(true)
    }

    fn clear_sheet(&mut self, sheet: &str) -> Result<()> {
        self.sheet_mut(sheet)?.clear();
        Ok(())
    }
}
