//! Contribution book: every payment recorded per (reason, house, month).
//!
//! The grid only ever shows a projection of this list. A cell holding two
//! payments renders as `=500+700` with references `FT1, FT2`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tally_core::{parse_amount, EthiopianMonth, PaymentReason, SubmitterId};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct CellKey {
    pub reason: PaymentReason,
    pub house: String,
    pub month: EthiopianMonth,
}

impl CellKey {
    pub fn new(reason: PaymentReason, house: impl Into<String>, month: EthiopianMonth) -> Self {
        Self {
            reason,
            house: house.into(),
            month,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contribution {
    /// Amount term exactly as it appears in the cell expression.
    pub amount: String,
    pub transaction_id: String,
    /// `None` for contributions imported from existing cells.
    pub submitter: Option<SubmitterId>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl Contribution {
    pub fn value(&self) -> f64 {
        parse_amount(&self.amount).unwrap_or(0.0)
    }

    /// Literal term match, falling back to numeric equality (`500` vs `500.00`).
    pub fn has_amount(&self, amount: &str) -> bool {
        let amount = amount.trim();
        if self.amount == amount {
            return true;
        }
        matches!(
            (parse_amount(&self.amount), parse_amount(amount)),
            (Some(a), Some(b)) if (a - b).abs() < 0.005
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ContributionBook {
    cells: BTreeMap<CellKey, Vec<Contribution>>,
}

impl ContributionBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an existing amount cell (`1000`, `=500+700`) and its reference
    /// cell (`FT1, FT2`) into contributions. Terms and references pair up by
    /// position; an empty slot (`, FT2`) is a payment without a reference.
    pub fn import_cell(&mut self, key: CellKey, amount_cell: &str, reference_cell: &str) -> usize {
        let amounts: Vec<&str> = amount_cell
            .trim()
            .trim_start_matches('=')
            .split('+')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect();
        let refs: Vec<&str> = if reference_cell.trim().is_empty() {
            Vec::new()
        } else {
            reference_cell.split(',').map(str::trim).collect()
        };

        let count = amounts.len().max(refs.len());
        if count == 0 {
            return 0;
        }
        let entry = self.cells.entry(key).or_default();
        for i in 0..count {
            entry.push(Contribution {
                amount: amounts.get(i).copied().unwrap_or_default().to_string(),
                transaction_id: refs.get(i).copied().unwrap_or_default().to_string(),
                submitter: None,
                recorded_at: None,
            });
        }
        count
    }

    pub fn push(&mut self, key: CellKey, contribution: Contribution) {
        self.cells.entry(key).or_default().push(contribution);
    }

    pub fn contributions(&self, key: &CellKey) -> &[Contribution] {
        self.cells.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Remove the first contribution for `house` (any reason, any month)
    /// matching `pred`.
    pub fn remove_first<F>(&mut self, house: &str, mut pred: F) -> Option<(CellKey, Contribution)>
    where
        F: FnMut(&Contribution) -> bool,
    {
        let (key, idx) = self
            .cells
            .iter()
            .filter(|(k, _)| k.house == house)
            .find_map(|(k, list)| list.iter().position(&mut pred).map(|i| (k.clone(), i)))?;
        let list = self.cells.get_mut(&key)?;
        let removed = list.remove(idx);
        if list.is_empty() {
            self.cells.remove(&key);
        }
        Some((key, removed))
    }

    /// Cell already holding `transaction_id` as one of its references.
    pub fn find_transaction(&self, transaction_id: &str) -> Option<&CellKey> {
        let wanted = transaction_id.trim();
        if wanted.is_empty() {
            return None;
        }
        self.cells
            .iter()
            .find(|(_, list)| list.iter().any(|c| c.transaction_id == wanted))
            .map(|(k, _)| k)
    }

    /// `""`, the single amount, or `=a+b+...`.
    pub fn render_amount(&self, key: &CellKey) -> String {
        let terms: Vec<&str> = self
            .contributions(key)
            .iter()
            .map(|c| c.amount.as_str())
            .filter(|a| !a.is_empty())
            .collect();
        match terms.as_slice() {
            [] => String::new(),
            [single] => single.to_string(),
            many => format!("={}", many.join("+")),
        }
    }

    /// One slot per contribution, empty when it has no reference, so that
    /// [`import_cell`](Self::import_cell) pairs them back up the same way.
    pub fn render_references(&self, key: &CellKey) -> String {
        let refs: Vec<&str> = self
            .contributions(key)
            .iter()
            .map(|c| c.transaction_id.as_str())
            .collect();
        if refs.iter().all(|r| r.is_empty()) {
            return String::new();
        }
        refs.join(", ")
    }

    pub fn total(&self, key: &CellKey) -> f64 {
        self.contributions(key).iter().map(Contribution::value).sum()
    }

    pub fn len(&self) -> usize {
        self.cells.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(house: &str) -> CellKey {
        CellKey::new(PaymentReason::Water, house, EthiopianMonth::Tir)
    }

    fn contribution(amount: &str, txid: &str, submitter: Option<SubmitterId>) -> Contribution {
        Contribution {
            amount: amount.into(),
            transaction_id: txid.into(),
            submitter,
            recorded_at: None,
        }
    }

    #[test]
    fn test_import_legacy_cells() {
        let mut book = ContributionBook::new();
        assert_eq!(book.import_cell(key("407"), "=500+700", "FT1, FT2"), 2);
        assert_eq!(book.import_cell(key("901"), "1000", "FT3"), 1);
        assert_eq!(book.import_cell(key("902"), "", ""), 0);
        assert_eq!(book.total(&key("407")), 1200.0);
        assert_eq!(book.contributions(&key("407"))[1].transaction_id, "FT2");
        assert!(book.contributions(&key("902")).is_empty());
        assert_eq!(book.len(), 3);
    }

    #[test]
    fn test_render_projection() {
        let mut book = ContributionBook::new();
        let k = key("407");
        assert_eq!(book.render_amount(&k), "");
        book.push(k.clone(), contribution("500", "FT1", None));
        assert_eq!(book.render_amount(&k), "500");
        assert_eq!(book.render_references(&k), "FT1");
        book.push(k.clone(), contribution("700", "FT2", None));
        assert_eq!(book.render_amount(&k), "=500+700");
        assert_eq!(book.render_references(&k), "FT1, FT2");
    }

    #[test]
    fn test_missing_reference_keeps_its_slot() {
        let mut book = ContributionBook::new();
        let k = key("407");
        book.push(k.clone(), contribution("300", "", None));
        book.push(k.clone(), contribution("500", "FT111", None));
        book.push(k.clone(), contribution("200", "", None));
        let (amounts, refs) = (book.render_amount(&k), book.render_references(&k));
        assert_eq!(amounts, "=300+500+200");
        assert_eq!(refs, ", FT111, ");

        let mut reloaded = ContributionBook::new();
        assert_eq!(reloaded.import_cell(k.clone(), &amounts, &refs), 3);
        let list = reloaded.contributions(&k);
        assert_eq!(list[0].transaction_id, "");
        assert_eq!((list[1].amount.as_str(), list[1].transaction_id.as_str()), ("500", "FT111"));
        assert_eq!(list[2].transaction_id, "");

        let mut unreferenced = ContributionBook::new();
        unreferenced.push(k.clone(), contribution("300", "", None));
        unreferenced.push(k.clone(), contribution("400", "", None));
        assert_eq!(unreferenced.render_references(&k), "");
    }

    #[test]
    fn test_remove_first_only_touches_matching_house() {
        let me = SubmitterId::new(-100, 7);
        let mut book = ContributionBook::new();
        book.push(key("407"), contribution("500", "FT1", Some(me)));
        book.push(key("407"), contribution("600", "FT9", None));
        book.push(key("901"), contribution("500", "FT1", Some(me)));

        let (k, removed) = book
            .remove_first("407", |c| c.submitter == Some(me) && c.transaction_id == "FT1")
            .unwrap();
        assert_eq!(k, key("407"));
        assert_eq!(removed.amount, "500");
        assert_eq!(book.render_amount(&key("407")), "600");
        assert_eq!(book.render_amount(&key("901")), "500");
        assert!(book.remove_first("407", |c| c.transaction_id == "FT1").is_none());
    }

    #[test]
    fn test_find_transaction_is_exact() {
        let mut book = ContributionBook::new();
        book.import_cell(key("407"), "=500+700", "ABC123456789, FT2");
        assert_eq!(book.find_transaction("ABC123456789"), Some(&key("407")));
        assert_eq!(book.find_transaction("ABC12345678"), None);
        assert_eq!(book.find_transaction(""), None);
    }

    #[test]
    fn test_amount_term_match() {
        let c = contribution("500", "FT1", None);
        assert!(c.has_amount("500"));
        assert!(c.has_amount("500.00"));
        assert!(!c.has_amount("700"));
    }
}
