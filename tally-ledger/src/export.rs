//! Combined CSV download of every reason sheet.

use std::io::Write;
use std::path::Path;

use crate::error::Result;
use crate::reports::LedgerSnapshot;

/// Write every row of every sheet, headers included, with the sheet name
/// prepended. Returns the number of records written.
pub fn export_csv<W: Write>(snapshot: &LedgerSnapshot, writer: W) -> Result<usize> {
    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(writer);
    let mut written = 0;
    for (reason, rows) in &snapshot.sheets {
        for row in rows {
            let record = std::iter::once(reason.sheet_name()).chain(row.iter().map(String::as_str));
            wtr.write_record(record)?;
            written += 1;
        }
    }
    wtr.flush()?;
    Ok(written)
}

pub fn export_to_path(snapshot: &LedgerSnapshot, path: &Path) -> Result<usize> {
    let file = std::fs::File::create(path)?;
    let n = export_csv(snapshot, file)?;
    tracing::info!(path = %path.display(), rows = n, "ledger exported");
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::MemoryGrid;
    use crate::setup::ensure_sheets;
    use tally_core::HouseRegistry;

    #[test]
    fn test_export_prepends_sheet() {
        let mut grid = MemoryGrid::new();
        ensure_sheets(&mut grid, &HouseRegistry::from_pairs([("407", "ABEBE KEBEDE")])).unwrap();
        let snapshot = LedgerSnapshot::read(&grid).unwrap();

        let mut out = Vec::new();
        let n = export_csv(&snapshot, &mut out).unwrap();
        // five sheets × (two headers + one house + TOTAL)
        assert_eq!(n, 20);

        let text = String::from_utf8(out).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("Water,No,H.No,Name,Meskerem"));
        assert!(text.contains("Water,1,407,ABEBE KEBEDE"));
    }
}
