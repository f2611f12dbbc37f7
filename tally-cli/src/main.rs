use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use tally_core::{HouseRegistry, ReceiptText};
use tally_ingest::{ExtractionRequest, ReceiptExtractor};
use tally_ledger::ensure_sheets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod config;
mod group;
mod listen;
mod ocr;
mod report;
mod state;

use config::{init_config, load_config};
use report::ReportCommand;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("TALLY_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "tally", version = VERSION, about = "Receipt ledger for shared-building payments")]
struct Cli {
    /// Config file (defaults to $TALLY_HOME/config.toml)
    #[arg(long, global = true, env = "TALLY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a sample config if none exists
    Init,

    /// Create or repair every reason sheet for a group
    Setup {
        #[arg(long)]
        group: i64,
    },

    /// Extract payment fields from one receipt and print them
    Extract {
        /// Receipt image, or a .txt file of recognized text
        file: PathBuf,

        #[arg(long, default_value = "")]
        caption: String,

        /// Typed message sent alongside the receipt
        #[arg(long, default_value = "")]
        text: String,

        /// Treat the input as a correction (bare numbers are amounts)
        #[arg(long)]
        edit: bool,

        /// Resolve payer names against this group's houses
        #[arg(long)]
        group: Option<i64>,
    },

    /// Drive submission sessions from JSON lines on stdin
    Listen {
        #[arg(long)]
        group: i64,
    },

    /// Read-only ledger reports
    Report {
        #[arg(long)]
        group: i64,

        #[command(subcommand)]
        command: ReportCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tally=info,tally_ledger=info,tally_ingest=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Command::Init => init_config(config_path)?,

        Command::Setup { group: group_id } => {
            let cfg = load_config(config_path)?;
            let mut ctx = group::open_group(&cfg, group_id)?;
            let reports = ensure_sheets(&mut ctx.workbook, &ctx.registry)?;
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }

        Command::Extract {
            file,
            caption,
            text,
            edit,
            group: group_id,
        } => {
            let cfg = load_config(config_path)?;
            let registry = match group_id {
                Some(id) => Some(HouseRegistry::load_json(&cfg.group(id)?.houses_file)?),
                None => None,
            };
            let ocr_text = read_receipt(&cfg, &file).await?;
            let receipt = ReceiptText {
                ocr_text,
                caption,
                user_text: text,
            };

            let extractor = ReceiptExtractor::new()?;
            let mut req = ExtractionRequest::new(&receipt);
            if let Some(r) = registry.as_ref() {
                req = req.with_registry(r);
            }
            if edit {
                req = req.editing(None);
            }
            let payment = extractor.extract_buffered(&req);
            let verdict = group::validator(&cfg)?.validate(&payment.beneficiary);
            let out = json!({ "payment": payment, "beneficiary": verdict });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }

        Command::Listen { group: group_id } => {
            let cfg = load_config(config_path)?;
            listen::run(&cfg, group_id).await?;
        }

        Command::Report { group: group_id, command } => {
            let cfg = load_config(config_path)?;
            report::run(&cfg, group_id, &command)?;
        }
    }

    Ok(())
}

async fn read_receipt(cfg: &config::Config, path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("txt")) {
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }
    Ok(ocr::OcrClient::new(&cfg.ocr)?.extract_text(&bytes).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_version_carries_build_stamp() {
        let stamp = VERSION
            .strip_prefix(env!("CARGO_PKG_VERSION"))
            .and_then(|rest| rest.strip_prefix(" ("))
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap();
        assert!(!stamp.trim().is_empty());
    }

    #[test]
    fn test_extract_edit_flag_parses() {
        let cli = Cli::try_parse_from(["tally", "extract", "r.txt", "--edit", "--text", "755"]).unwrap();
        match cli.command {
            Command::Extract { edit, text, group: group_id, .. } => {
                assert!(edit);
                assert_eq!(text, "755");
                assert_eq!(group_id, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
