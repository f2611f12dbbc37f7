//! Create or repair reason sheets.

use serde::Serialize;
use tally_core::{HouseRegistry, PaymentReason};

use crate::error::Result;
use crate::grid::LedgerBackend;
use crate::layout::{has_expected_header, header_rows, house_row, is_total_row, total_row, HEADER_ROWS};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub sheet: String,
    pub created: bool,
    /// An existing sheet with a foreign header was wiped and rebuilt.
    pub rebuilt: bool,
    pub total_appended: bool,
    pub houses: usize,
}

/// Make sure the sheet for `reason` has our header, one row per registry house
/// and a TOTAL row.
pub fn setup_sheet<B: LedgerBackend + ?Sized>(
    backend: &mut B,
    reason: PaymentReason,
    registry: &HouseRegistry,
) -> Result<SetupReport> {
    let sheet = reason.sheet_name();
    let created = backend.ensure_sheet(sheet)?;
    let rows = backend.read_all_cells(sheet)?;

    let mut report = SetupReport {
        sheet: sheet.to_string(),
        created,
        rebuilt: false,
        total_appended: false,
        houses: 0,
    };

    if has_expected_header(&rows) {
        report.houses = rows.iter().skip(HEADER_ROWS).filter(|r| !is_total_row(r)).count();
        if !rows.iter().any(|r| is_total_row(r)) {
            backend.append_row(sheet, total_row(rows.len()))?;
            report.total_appended = true;
            tracing::info!(sheet, "appended missing TOTAL row");
        }
        return Ok(report);
    }

    if !rows.is_empty() {
        tracing::warn!(sheet, "unexpected header, rebuilding sheet");
        backend.clear_sheet(sheet)?;
        report.rebuilt = true;
    }

    for header in header_rows() {
        backend.append_row(sheet, header)?;
    }
    let houses = registry.sorted_numbers();
    for (i, house) in houses.iter().enumerate() {
        let occupant = registry.occupant(house).unwrap_or_default();
        backend.append_row(sheet, house_row(i + 1, house, occupant))?;
    }
    backend.append_row(sheet, total_row(houses.len() + HEADER_ROWS))?;
    report.houses = houses.len();
    tracing::info!(sheet, houses = houses.len(), "sheet ready");
    Ok(report)
}

/// [`setup_sheet`] for every reason.
pub fn ensure_sheets<B: LedgerBackend + ?Sized>(
    backend: &mut B,
    registry: &HouseRegistry,
) -> Result<Vec<SetupReport>> {
    PaymentReason::ALL
        .iter()
        .map(|reason| setup_sheet(backend, *reason, registry))
        .collect()
}
