//! Ledger reconciler: validate an extracted payment, then record it.
//!
//! Order of checks: amount, beneficiary, duplicate reference (new submissions
//! only), house row, month. Nothing is written unless every check passes.
//!
//! The book is loaded from the grid once, at [`Reconciler::open`]; this
//! process is then the only writer. Another process writing the same sheets
//! between our duplicate scan and our write is not detected.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::{EthiopianMonth, ExtractedPayment, PaymentReason, SubmissionError, SubmissionResult, SubmitterId};
use tally_ingest::BeneficiaryValidator;

use crate::book::{CellKey, Contribution, ContributionBook};
use crate::error::Result;
use crate::grid::{cell_text, CellAddress, LedgerBackend};
use crate::layout::{amount_col, is_total_row, reference_col, HEADER_ROWS, HOUSE_COL};

#[derive(Debug, Clone, Copy)]
pub enum SubmitMode<'a> {
    New,
    /// Replace `previous`, the caller's last accepted submission.
    Edit { previous: &'a ExtractedPayment },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedReceipt {
    pub sheet: String,
    /// 1-based sheet row.
    pub row: usize,
    pub house_number: String,
    pub month: EthiopianMonth,
    pub reason: PaymentReason,
    pub amount: String,
    pub transaction_id: String,
    /// Sum of every contribution now in the cell.
    pub cell_total: f64,
    pub replaced: Option<Contribution>,
}

pub struct Reconciler<B> {
    backend: B,
    book: ContributionBook,
    rows: HashMap<(PaymentReason, String), usize>,
}

impl<B: LedgerBackend> Reconciler<B> {
    /// Index every house row and import existing cells into the book.
    /// Missing reason sheets are skipped.
    pub fn open(backend: B) -> Result<Self> {
        let sheets = backend.sheet_names()?;
        let mut book = ContributionBook::new();
        let mut rows = HashMap::new();

        for reason in PaymentReason::ALL {
            if !sheets.iter().any(|s| s == reason.sheet_name()) {
                continue;
            }
            let grid = backend.read_all_cells(reason.sheet_name())?;
            for (idx, row) in grid.iter().enumerate().skip(HEADER_ROWS) {
                if is_total_row(row) {
                    continue;
                }
                let house = cell_text(&grid, idx, HOUSE_COL).trim();
                if house.is_empty() {
                    continue;
                }
                rows.entry((reason, house.to_string())).or_insert(idx);
                for month in EthiopianMonth::ALL {
                    book.import_cell(
                        CellKey::new(reason, house, month),
                        cell_text(&grid, idx, amount_col(month)),
                        cell_text(&grid, idx, reference_col(month)),
                    );
                }
            }
        }

        tracing::info!(houses = rows.len(), contributions = book.len(), "ledger loaded");
        Ok(Self { backend, book, rows })
    }

    pub fn book(&self) -> &ContributionBook {
        &self.book
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Zero-based grid row of `house` on the `reason` sheet.
    pub fn row_of(&self, reason: PaymentReason, house: &str) -> Option<usize> {
        self.rows.get(&(reason, house.trim().to_string())).copied()
    }

    pub fn submit(
        &mut self,
        payment: &ExtractedPayment,
        submitter: Option<SubmitterId>,
        mode: SubmitMode<'_>,
        validator: &BeneficiaryValidator,
        now: DateTime<Utc>,
    ) -> SubmissionResult<SavedReceipt> {
        let result = self.try_submit(payment, submitter, mode, validator, now);
        if let Err(err) = &result {
            tracing::warn!(
                house = %payment.house_number,
                txid = %payment.transaction_id,
                error = %err,
                "submission rejected"
            );
        }
        result
    }

    fn try_submit(
        &mut self,
        payment: &ExtractedPayment,
        submitter: Option<SubmitterId>,
        mode: SubmitMode<'_>,
        validator: &BeneficiaryValidator,
        now: DateTime<Utc>,
    ) -> SubmissionResult<SavedReceipt> {
        if payment.amount_value().is_none() {
            return Err(SubmissionError::ExtractionIncomplete);
        }
        if !validator.validate(&payment.beneficiary).is_valid {
            return Err(SubmissionError::BeneficiaryUnverified {
                found: payment.beneficiary.trim().to_string(),
            });
        }

        let txid = payment.transaction_id.trim();
        if let SubmitMode::New = mode {
            if let Some(existing) = self.book.find_transaction(txid) {
                let row = self.row_of(existing.reason, &existing.house).map_or(0, |r| r + 1);
                return Err(SubmissionError::DuplicateTransaction {
                    transaction_id: txid.to_string(),
                    sheet: existing.reason.sheet_name().to_string(),
                    row,
                });
            }
        }

        let house = payment.house_number.trim();
        let row = self
            .row_of(payment.reason, house)
            .ok_or_else(|| SubmissionError::UnknownHouse(house.to_string()))?;
        let month = payment.month.ok_or(SubmissionError::UnknownMonth)?;
        let key = CellKey::new(payment.reason, house, month);

        // Everything validated; from here on the book changes.
        let snapshot = self.book.clone();
        let mut replaced = None;
        if let SubmitMode::Edit { previous } = mode {
            match self.remove_previous(previous, submitter) {
                Some((old_key, old)) => {
                    tracing::info!(cell = ?old_key, amount = %old.amount, txid = %old.transaction_id, "removed previous contribution");
                    replaced = Some((old_key, old));
                }
                None => {
                    tracing::warn!(house = %previous.house_number, txid = %previous.transaction_id, "previous contribution not found");
                }
            }
        }

        self.book.push(
            key.clone(),
            Contribution {
                amount: payment.amount.trim().to_string(),
                transaction_id: txid.to_string(),
                submitter,
                recorded_at: Some(now),
            },
        );

        let mut touched = vec![key.clone()];
        if let Some((old_key, _)) = &replaced {
            if *old_key != key {
                touched.push(old_key.clone());
            }
        }
        if let Err(err) = self.project(&touched) {
            self.book = snapshot;
            return Err(err.into());
        }

        let saved = SavedReceipt {
            sheet: payment.reason.sheet_name().to_string(),
            row: row + 1,
            house_number: house.to_string(),
            month,
            reason: payment.reason,
            amount: payment.amount.trim().to_string(),
            transaction_id: txid.to_string(),
            cell_total: self.book.total(&key),
            replaced: replaced.map(|(_, c)| c),
        };
        tracing::info!(
            sheet = %saved.sheet,
            row = saved.row,
            month = %saved.month,
            amount = %saved.amount,
            cell_total = saved.cell_total,
            "payment recorded"
        );
        Ok(saved)
    }

    /// By submitter and reference when we know who wrote it, else by the
    /// literal amount term and reference.
    fn remove_previous(
        &mut self,
        previous: &ExtractedPayment,
        submitter: Option<SubmitterId>,
    ) -> Option<(CellKey, Contribution)> {
        let house = previous.house_number.trim();
        let txid = previous.transaction_id.trim();
        if let Some(who) = submitter {
            let found = self
                .book
                .remove_first(house, |c| c.submitter == Some(who) && c.transaction_id == txid);
            if found.is_some() {
                return found;
            }
        }
        self.book
            .remove_first(house, |c| c.transaction_id == txid && c.has_amount(&previous.amount))
    }

    /// Write the touched cells, one batch per sheet. If any batch fails, the
    /// cells already written are put back to what they held before.
    fn project(&mut self, keys: &[CellKey]) -> Result<()> {
        let mut batches: Vec<(&'static str, Vec<(CellAddress, String)>)> = Vec::new();
        for key in keys {
            let Some(row) = self.row_of(key.reason, &key.house) else {
                continue;
            };
            let sheet = key.reason.sheet_name();
            let cells = [
                (CellAddress::new(row, amount_col(key.month)), self.book.render_amount(key)),
                (CellAddress::new(row, reference_col(key.month)), self.book.render_references(key)),
            ];
            match batches.iter_mut().find(|(s, _)| *s == sheet) {
                Some((_, pending)) => pending.extend(cells),
                None => batches.push((sheet, cells.to_vec())),
            }
        }

        let mut prior: Vec<(&'static str, Vec<(CellAddress, String)>)> = Vec::new();
        for (sheet, cells) in &batches {
            let sheet = *sheet;
            let outcome = self.backend.read_all_cells(sheet).and_then(|rows| {
                let before = cells
                    .iter()
                    .map(|(at, _)| (*at, cell_text(&rows, at.row, at.col).to_string()))
                    .collect();
                prior.push((sheet, before));
                self.backend.write_cells(sheet, cells)
            });
            if let Err(err) = outcome {
                self.restore_cells(&prior);
                return Err(err);
            }
        }
        Ok(())
    }

    fn restore_cells(&mut self, prior: &[(&'static str, Vec<(CellAddress, String)>)]) {
        for (sheet, cells) in prior.iter().rev() {
            let sheet = *sheet;
            if let Err(err) = self.backend.write_cells(sheet, cells) {
                tracing::error!(sheet, error = %err, "could not restore ledger cells");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerError;
    use crate::grid::{MemoryGrid, Row};
    use crate::setup::ensure_sheets;
    use tally_core::HouseRegistry;

    /// Memory grid whose `fail_at`-th cell write fails.
    struct FlakyGrid {
        inner: MemoryGrid,
        writes: usize,
        fail_at: usize,
    }

    impl LedgerBackend for FlakyGrid {
        fn sheet_names(&self) -> Result<Vec<String>> {
            self.inner.sheet_names()
        }
        fn read_all_cells(&self, sheet: &str) -> Result<Vec<Row>> {
            self.inner.read_all_cells(sheet)
        }
        fn write_cell(&mut self, sheet: &str, at: CellAddress, value: &str) -> Result<()> {
            self.writes += 1;
            if self.writes == self.fail_at {
                return Err(LedgerError::Io(std::io::Error::other("disk full")));
            }
            self.inner.write_cell(sheet, at, value)
        }
        fn append_row(&mut self, sheet: &str, row: Row) -> Result<()> {
            self.inner.append_row(sheet, row)
        }
        fn ensure_sheet(&mut self, sheet: &str) -> Result<bool> {
            self.inner.ensure_sheet(sheet)
        }
        fn clear_sheet(&mut self, sheet: &str) -> Result<()> {
            self.inner.clear_sheet(sheet)
        }
    }

    fn flaky(fail_at: usize) -> Reconciler<FlakyGrid> {
        let mut inner = MemoryGrid::new();
        let registry = HouseRegistry::from_pairs([("407", "ABEBE KEBEDE"), ("901", "SARA HAILE")]);
        ensure_sheets(&mut inner, &registry).unwrap();
        Reconciler::open(FlakyGrid { inner, writes: 0, fail_at }).unwrap()
    }

    fn tir_cells<G: LedgerBackend>(rec: &Reconciler<G>, sheet: &str, row: usize) -> (String, String) {
        let rows = rec.backend().read_all_cells(sheet).unwrap();
        let col = amount_col(EthiopianMonth::Tir);
        (
            cell_text(&rows, row, col).to_string(),
            cell_text(&rows, row, col + 1).to_string(),
        )
    }

    fn reconciler() -> Reconciler<MemoryGrid> {
        let mut grid = MemoryGrid::new();
        let registry = HouseRegistry::from_pairs([("407", "ABEBE KEBEDE"), ("901", "SARA HAILE")]);
        ensure_sheets(&mut grid, &registry).unwrap();
        Reconciler::open(grid).unwrap()
    }

    fn payment(house: &str, amount: &str, txid: &str) -> ExtractedPayment {
        ExtractedPayment {
            house_number: house.into(),
            amount: amount.into(),
            transaction_id: txid.into(),
            beneficiary: "SEYOUM ASSEFA".into(),
            reason: PaymentReason::Water,
            month: Some(EthiopianMonth::Tir),
            ..Default::default()
        }
    }

    fn validator() -> BeneficiaryValidator {
        BeneficiaryValidator::new().unwrap()
    }

    fn cells(rec: &Reconciler<MemoryGrid>, row: usize) -> (String, String) {
        let rows = rec.backend().read_all_cells("Water").unwrap();
        let col = amount_col(EthiopianMonth::Tir);
        (
            cell_text(&rows, row, col).to_string(),
            cell_text(&rows, row, col + 1).to_string(),
        )
    }

    #[test]
    fn test_accumulates_in_one_cell() {
        let mut rec = reconciler();
        let v = validator();
        let saved = rec
            .submit(&payment("407", "500", "FT1"), None, SubmitMode::New, &v, Utc::now())
            .unwrap();
        assert_eq!(saved.row, 3);
        assert_eq!(saved.sheet, "Water");
        rec.submit(&payment("407", "700", "FT2"), None, SubmitMode::New, &v, Utc::now())
            .unwrap();
        assert_eq!(cells(&rec, 2), ("=500+700".to_string(), "FT1, FT2".to_string()));
    }

    #[test]
    fn test_rejections_leave_ledger_untouched() {
        let mut rec = reconciler();
        let v = validator();
        let before = rec.backend().read_all_cells("Water").unwrap();

        let mut p = payment("407", "", "FT1");
        assert_eq!(
            rec.submit(&p, None, SubmitMode::New, &v, Utc::now()),
            Err(SubmissionError::ExtractionIncomplete)
        );

        p = payment("407", "500", "FT1");
        p.beneficiary = "ABEBE KEBEDE".into();
        assert_eq!(
            rec.submit(&p, None, SubmitMode::New, &v, Utc::now()),
            Err(SubmissionError::BeneficiaryUnverified { found: "ABEBE KEBEDE".into() })
        );

        p.beneficiary.clear();
        assert_eq!(
            rec.submit(&p, None, SubmitMode::New, &v, Utc::now()),
            Err(SubmissionError::BeneficiaryUnverified { found: String::new() })
        );

        assert_eq!(
            rec.submit(&payment("555", "500", "FT1"), None, SubmitMode::New, &v, Utc::now()),
            Err(SubmissionError::UnknownHouse("555".into()))
        );

        p = payment("407", "500", "FT1");
        p.month = None;
        assert_eq!(rec.submit(&p, None, SubmitMode::New, &v, Utc::now()), Err(SubmissionError::UnknownMonth));

        assert_eq!(rec.backend().read_all_cells("Water").unwrap(), before);
        assert!(rec.book().is_empty());
    }

    #[test]
    fn test_duplicate_across_sheets() {
        let mut rec = reconciler();
        let v = validator();
        let mut first = payment("901", "500", "ABC123456789");
        first.reason = PaymentReason::Penalty;
        rec.submit(&first, None, SubmitMode::New, &v, Utc::now()).unwrap();

        let err = rec
            .submit(&payment("407", "500", "ABC123456789"), None, SubmitMode::New, &v, Utc::now())
            .unwrap_err();
        assert_eq!(
            err,
            SubmissionError::DuplicateTransaction {
                transaction_id: "ABC123456789".into(),
                sheet: "Penalty".into(),
                row: 4,
            }
        );
    }

    #[test]
    fn test_edit_replaces_only_own_contribution() {
        let mut rec = reconciler();
        let v = validator();
        let me = SubmitterId::new(-100, 1);
        let neighbour = SubmitterId::new(-100, 2);

        rec.submit(&payment("407", "300", "FT0"), Some(neighbour), SubmitMode::New, &v, Utc::now())
            .unwrap();
        let original = payment("407", "500", "FT111");
        rec.submit(&original, Some(me), SubmitMode::New, &v, Utc::now()).unwrap();
        assert_eq!(cells(&rec, 2).0, "=300+500");

        let corrected = payment("407", "700", "FT111");
        let saved = rec
            .submit(&corrected, Some(me), SubmitMode::Edit { previous: &original }, &v, Utc::now())
            .unwrap();
        assert_eq!(saved.replaced.map(|c| c.amount), Some("500".to_string()));
        assert_eq!(saved.cell_total, 1000.0);
        assert_eq!(cells(&rec, 2), ("=300+700".to_string(), "FT0, FT111".to_string()));
    }

    #[test]
    fn test_edit_moves_between_months() {
        let mut rec = reconciler();
        let v = validator();
        let me = SubmitterId::new(-100, 1);
        let original = payment("407", "500", "FT111");
        rec.submit(&original, Some(me), SubmitMode::New, &v, Utc::now()).unwrap();

        let mut corrected = original.clone();
        corrected.month = Some(EthiopianMonth::Yekatit);
        rec.submit(&corrected, Some(me), SubmitMode::Edit { previous: &original }, &v, Utc::now())
            .unwrap();

        assert_eq!(cells(&rec, 2), (String::new(), String::new()));
        let rows = rec.backend().read_all_cells("Water").unwrap();
        assert_eq!(cell_text(&rows, 2, amount_col(EthiopianMonth::Yekatit)), "500");
    }

    #[test]
    fn test_failed_write_restores_grid_and_book() {
        // second write (the reference cell) fails
        let mut rec = flaky(2);
        let v = validator();
        let err = rec
            .submit(&payment("407", "500", "FT1"), None, SubmitMode::New, &v, Utc::now())
            .unwrap_err();
        assert!(matches!(err, SubmissionError::LedgerUnavailable(_)));
        assert_eq!(tir_cells(&rec, "Water", 2), (String::new(), String::new()));
        assert!(rec.book().is_empty());

        rec.submit(&payment("407", "500", "FT1"), None, SubmitMode::New, &v, Utc::now())
            .unwrap();
        assert_eq!(tir_cells(&rec, "Water", 2), ("500".to_string(), "FT1".to_string()));
    }

    #[test]
    fn test_failed_edit_across_sheets_restores_both() {
        // writes 1-2 record the original; 3-4 fill Penalty, 5 fails on Water
        let mut rec = flaky(5);
        let v = validator();
        let me = SubmitterId::new(-100, 1);
        let original = payment("407", "500", "FT111");
        rec.submit(&original, Some(me), SubmitMode::New, &v, Utc::now()).unwrap();

        let mut corrected = original.clone();
        corrected.reason = PaymentReason::Penalty;
        let err = rec
            .submit(&corrected, Some(me), SubmitMode::Edit { previous: &original }, &v, Utc::now())
            .unwrap_err();
        assert!(matches!(err, SubmissionError::LedgerUnavailable(_)));

        assert_eq!(tir_cells(&rec, "Water", 2), ("500".to_string(), "FT111".to_string()));
        assert_eq!(tir_cells(&rec, "Penalty", 2), (String::new(), String::new()));
        let key = CellKey::new(PaymentReason::Water, "407", EthiopianMonth::Tir);
        assert_eq!(rec.book().total(&key), 500.0);
        assert_eq!(rec.book().len(), 1);
    }
}
