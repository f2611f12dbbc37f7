//! CSV workbook backend: a directory holding one `<Sheet>.csv` per sheet.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{LedgerError, Result};
use crate::grid::{set_cell, CellAddress, LedgerBackend, Row};

#[derive(Debug, Clone)]
pub struct CsvWorkbook {
    dir: PathBuf,
}

impl CsvWorkbook {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        tracing::debug!(dir = %dir.display(), "opened csv workbook");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sheet_path(&self, sheet: &str) -> PathBuf {
        self.dir.join(format!("{sheet}.csv"))
    }

    fn existing_path(&self, sheet: &str) -> Result<PathBuf> {
        let path = self.sheet_path(sheet);
        if path.is_file() {
            Ok(path)
        } else {
            Err(LedgerError::MissingSheet(sheet.to_string()))
        }
    }

    /// Replace the sheet file through a sibling temp file, so readers see
    /// either the old sheet or the new one.
    fn write_rows(&self, sheet: &str, rows: &[Row]) -> Result<()> {
        let target = self.sheet_path(sheet);
        let staging = self.dir.join(format!("{sheet}.csv.tmp"));
        {
            let mut wtr = csv::WriterBuilder::new()
                .flexible(true)
                .has_headers(false)
                .from_path(&staging)?;
            for row in rows {
                wtr.write_record(row)?;
            }
            wtr.flush()?;
        }
        fs::rename(&staging, &target)?;
        Ok(())
    }
}

impl LedgerBackend for CsvWorkbook {
    fn sheet_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read_all_cells(&self, sheet: &str) -> Result<Vec<Row>> {
        let path = self.existing_path(sheet)?;
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .has_headers(false)
            .from_path(&path)?;
        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn write_cell(&mut self, sheet: &str, at: CellAddress, value: &str) -> Result<()> {
        let mut rows = self.read_all_cells(sheet)?;
        set_cell(&mut rows, at, value);
        self.write_rows(sheet, &rows)
    }

    fn write_cells(&mut self, sheet: &str, cells: &[(CellAddress, String)]) -> Result<()> {
        let mut rows = self.read_all_cells(sheet)?;
        for (at, value) in cells {
            set_cell(&mut rows, *at, value);
        }
        self.write_rows(sheet, &rows)
    }

    fn append_row(&mut self, sheet: &str, row: Row) -> Result<()> {
        let mut rows = self.read_all_cells(sheet)?;
        rows.push(row);
        self.write_rows(sheet, &rows)
    }

    fn ensure_sheet(&mut self, sheet: &str) -> Result<bool> {
        if self.sheet_path(sheet).is_file() {
            return Ok(false);
        }
        fs::write(self.sheet_path(sheet), "")?;
        tracing::info!(sheet, "created sheet");
        Ok(true)
    }

    fn clear_sheet(&mut self, sheet: &str) -> Result<()> {
        self.existing_path(sheet)?;
        fs::write(self.sheet_path(sheet), "")?;
        Ok(())
    }
}
