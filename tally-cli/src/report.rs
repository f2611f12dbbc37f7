use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde::Serialize;
use tally_ledger::export::export_to_path;
use tally_ledger::reports::{dashboard, house_counts, house_history, monthly, recent, RECENT_LIMIT};
use tally_ledger::{CsvWorkbook, LedgerSnapshot};

use crate::config::Config;

#[derive(Subcommand, Debug, Clone)]
pub enum ReportCommand {
    /// Grand total, totals and paying houses per reason, top months
    Dashboard,

    /// Totals for all 13 months, split by reason
    Monthly,

    /// Most recent payments in ledger order
    Recent {
        #[arg(long, default_value_t = RECENT_LIMIT)]
        limit: usize,
    },

    /// Number of paid cells per house
    Houses,

    /// Every payment recorded for one house
    House { number: String },

    /// Write every sheet into one CSV file
    Export { path: PathBuf },
}

pub fn run(cfg: &Config, group_id: i64, command: &ReportCommand) -> Result<()> {
    let group = cfg.group(group_id)?;
    let workbook = CsvWorkbook::open(&group.ledger_dir)
        .with_context(|| format!("open ledger {}", group.ledger_dir.display()))?;
    let snapshot = LedgerSnapshot::read(&workbook)?;
    println!("{}", render(&snapshot, command)?);
    Ok(())
}

fn render(snapshot: &LedgerSnapshot, command: &ReportCommand) -> Result<String> {
    match command {
        ReportCommand::Dashboard => pretty(&dashboard(snapshot)),
        ReportCommand::Monthly => pretty(&monthly(snapshot)),
        ReportCommand::Recent { limit } => pretty(&recent(snapshot, *limit)),
        ReportCommand::Houses => pretty(&house_counts(snapshot)),
        ReportCommand::House { number } => {
            let history = house_history(snapshot, number)
                .with_context(|| format!("house {number} is not in the ledger"))?;
            pretty(&history)
        }
        ReportCommand::Export { path } => {
            let rows = export_to_path(snapshot, path)?;
            Ok(format!("Exported {rows} rows to {}", path.display()))
        }
    }
}

fn pretty<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).context("serialize report")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tally_core::{EthiopianMonth, ExtractedPayment, HouseRegistry, PaymentReason};
    use tally_ingest::BeneficiaryValidator;
    use tally_ledger::{ensure_sheets, MemoryGrid, Reconciler, SubmitMode};

    fn snapshot() -> LedgerSnapshot {
        let mut grid = MemoryGrid::new();
        ensure_sheets(&mut grid, &HouseRegistry::from_pairs([("407", "ABEBE KEBEDE")])).unwrap();
        let mut rec = Reconciler::open(grid).unwrap();
        let payment = ExtractedPayment {
            house_number: "407".into(),
            amount: "600".into(),
            transaction_id: "FT25NOV12345".into(),
            beneficiary: "SEYOUM ASSEFA".into(),
            reason: PaymentReason::Water,
            month: Some(EthiopianMonth::Hidar),
            ..Default::default()
        };
        let v = BeneficiaryValidator::new().unwrap();
        rec.submit(&payment, None, SubmitMode::New, &v, Utc::now()).unwrap();
        LedgerSnapshot::read(rec.backend()).unwrap()
    }

    #[test]
    fn test_house_report() {
        let out = render(&snapshot(), &ReportCommand::House { number: "407".into() }).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["occupant"], "ABEBE KEBEDE");
        assert_eq!(v["total"], 600.0);
        assert_eq!(v["entries"][0]["references"], "FT25NOV12345");
    }

    #[test]
    fn test_unknown_house_is_error() {
        assert!(render(&snapshot(), &ReportCommand::House { number: "999".into() }).is_err());
    }

    #[test]
    fn test_monthly_lists_every_month() {
        let out = render(&snapshot(), &ReportCommand::Monthly).unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v.as_array().unwrap().len(), 13);
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.csv");
        let out = render(&snapshot(), &ReportCommand::Export { path: path.clone() }).unwrap();
        assert!(out.starts_with("Exported 20 rows"));
        assert!(path.exists());
    }
}
