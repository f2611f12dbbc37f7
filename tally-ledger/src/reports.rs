//! Read-only admin reports computed straight from the grid.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tally_core::{parse_amount, EthiopianMonth, PaymentReason};

use crate::error::Result;
use crate::grid::{cell_text, LedgerBackend, Row};
use crate::layout::{amount_col, is_total_row, reference_col, HEADER_ROWS, HOUSE_COL, NAME_COL};

pub const RECENT_LIMIT: usize = 10;
const TOP_MONTHS: usize = 3;

/// Every reason sheet, read once.
#[derive(Debug, Clone, Default)]
pub struct LedgerSnapshot {
    pub sheets: Vec<(PaymentReason, Vec<Row>)>,
}

impl LedgerSnapshot {
    pub fn read<B: LedgerBackend + ?Sized>(backend: &B) -> Result<Self> {
        let names = backend.sheet_names()?;
        let mut sheets = Vec::new();
        for reason in PaymentReason::ALL {
            if names.iter().any(|n| n == reason.sheet_name()) {
                sheets.push((reason, backend.read_all_cells(reason.sheet_name())?));
            }
        }
        Ok(Self { sheets })
    }

    /// Non-empty amount cells in sheet, row, month order.
    pub fn entries(&self) -> Vec<PaymentEntry> {
        let mut out = Vec::new();
        for (reason, rows) in &self.sheets {
            for (idx, row) in rows.iter().enumerate().skip(HEADER_ROWS) {
                if is_total_row(row) {
                    continue;
                }
                let house = cell_text(rows, idx, HOUSE_COL).trim();
                if house.is_empty() {
                    continue;
                }
                for month in EthiopianMonth::ALL {
                    let amount = evaluate_amount(cell_text(rows, idx, amount_col(month)));
                    if amount <= 0.0 {
                        continue;
                    }
                    out.push(PaymentEntry {
                        reason: *reason,
                        house: house.to_string(),
                        occupant: cell_text(rows, idx, NAME_COL).trim().to_string(),
                        month,
                        amount,
                        references: cell_text(rows, idx, reference_col(month)).trim().to_string(),
                    });
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentEntry {
    pub reason: PaymentReason,
    pub house: String,
    pub occupant: String,
    pub month: EthiopianMonth,
    pub amount: f64,
    pub references: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub grand_total: f64,
    pub totals_by_reason: Vec<(PaymentReason, f64)>,
    pub paying_houses_by_reason: Vec<(PaymentReason, usize)>,
    pub paying_houses: usize,
    pub top_months: Vec<(EthiopianMonth, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyTotal {
    pub month: EthiopianMonth,
    pub total: f64,
    pub by_reason: Vec<(PaymentReason, f64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HouseHistory {
    pub house: String,
    pub occupant: String,
    pub total: f64,
    pub entries: Vec<PaymentEntry>,
}

/// Value of an amount cell: `700`, `1,250.00` or `=500+700`. Terms that do
/// not parse count as zero.
pub fn evaluate_amount(cell: &str) -> f64 {
    cell.trim()
        .trim_start_matches('=')
        .split('+')
        .filter_map(parse_amount)
        .sum()
}

pub fn dashboard(snapshot: &LedgerSnapshot) -> Dashboard {
    let entries = snapshot.entries();
    let mut by_reason: BTreeMap<PaymentReason, (f64, BTreeSet<&str>)> = BTreeMap::new();
    let mut by_month: BTreeMap<EthiopianMonth, f64> = BTreeMap::new();
    let mut houses: BTreeSet<&str> = BTreeSet::new();

    for e in &entries {
        let slot = by_reason.entry(e.reason).or_default();
        slot.0 += e.amount;
        slot.1.insert(&e.house);
        *by_month.entry(e.month).or_default() += e.amount;
        houses.insert(&e.house);
    }

    let mut top_months: Vec<(EthiopianMonth, f64)> = by_month.into_iter().collect();
    top_months.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    top_months.truncate(TOP_MONTHS);

    Dashboard {
        grand_total: entries.iter().map(|e| e.amount).sum(),
        totals_by_reason: by_reason.iter().map(|(r, (t, _))| (*r, *t)).collect(),
        paying_houses_by_reason: by_reason.iter().map(|(r, (_, h))| (*r, h.len())).collect(),
        paying_houses: houses.len(),
        top_months,
    }
}

/// All 13 months in calendar order, including empty ones.
pub fn monthly(snapshot: &LedgerSnapshot) -> Vec<MonthlyTotal> {
    let entries = snapshot.entries();
    EthiopianMonth::ALL
        .iter()
        .map(|month| {
            let mut by_reason: BTreeMap<PaymentReason, f64> = BTreeMap::new();
            for e in entries.iter().filter(|e| e.month == *month) {
                *by_reason.entry(e.reason).or_default() += e.amount;
            }
            MonthlyTotal {
                month: *month,
                total: by_reason.values().sum(),
                by_reason: by_reason.into_iter().collect(),
            }
        })
        .collect()
}

pub fn recent(snapshot: &LedgerSnapshot, limit: usize) -> Vec<PaymentEntry> {
    let entries = snapshot.entries();
    let skip = entries.len().saturating_sub(limit);
    entries.into_iter().skip(skip).collect()
}

/// Paid cells per house, in numeric house order.
pub fn house_counts(snapshot: &LedgerSnapshot) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<(u64, String), usize> = BTreeMap::new();
    for e in snapshot.entries() {
        let order = e.house.parse::<u64>().unwrap_or(u64::MAX);
        *counts.entry((order, e.house)).or_default() += 1;
    }
    counts.into_iter().map(|((_, house), n)| (house, n)).collect()
}

pub fn house_history(snapshot: &LedgerSnapshot, house: &str) -> Option<HouseHistory> {
    let house = house.trim();
    let occupant = snapshot.sheets.iter().find_map(|(_, rows)| {
        (HEADER_ROWS..rows.len())
            .find(|idx| cell_text(rows, *idx, HOUSE_COL).trim() == house)
            .map(|idx| cell_text(rows, idx, NAME_COL).trim().to_string())
    })?;
    let entries: Vec<PaymentEntry> = snapshot
        .entries()
        .into_iter()
        .filter(|e| e.house == house)
        .collect();
    Some(HouseHistory {
        house: house.to_string(),
        occupant,
        total: entries.iter().map(|e| e.amount).sum(),
        entries,
    })
}
