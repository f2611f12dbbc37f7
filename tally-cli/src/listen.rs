//! Line-oriented chat adapter.
//!
//! Reads one JSON object per stdin line:
//!
//! ```text
//! {"user": 42, "text": "407 water", "caption": "...", "image": "receipt.jpg"}
//! {"user": 42, "command": "edit"}
//! ```
//!
//! and writes one JSON object per session event to stdout. An `image` ending
//! in `.txt` is taken as already-recognized text, which makes recorded
//! sessions replayable without the OCR service.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{json, Value};
use tally_core::time::{parse_timezone, to_local_string};
use tally_core::{SubmissionError, SubmitterId};
use tally_ingest::ReceiptExtractor;
use tally_ledger::reports::dashboard;
use tally_ledger::{
    InboundMessage, LedgerBackend, LedgerSnapshot, Reconciler, SessionEvent, SessionManager,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

use crate::config::{Config, GroupSection};
use crate::group::{open_group, validator};
use crate::ocr::OcrClient;

#[derive(Debug, Deserialize)]
struct InboundLine {
    user: i64,
    #[serde(default)]
    text: String,
    #[serde(default)]
    caption: String,
    #[serde(default)]
    image: Option<PathBuf>,
    #[serde(default)]
    command: Option<String>,
}

pub async fn run(cfg: &Config, group_id: i64) -> Result<()> {
    let ctx = open_group(cfg, group_id)?;
    let tz = parse_timezone(&cfg.ledger.timezone)?;
    let ocr = OcrClient::new(&cfg.ocr)?;
    let reconciler = Reconciler::open(ctx.workbook).context("load ledger")?;
    let (manager, mut events) = SessionManager::new(
        reconciler,
        ReceiptExtractor::new()?,
        validator(cfg)?,
        ctx.registry,
        cfg.session.session_config(),
    );
    let group = ctx.group;
    info!(group = group.id, "listening on stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                if let Some(reply) = handle_line(&manager, &ocr, &group, &line).await {
                    emit(&reply);
                }
            }
            Some(event) = events.recv() => emit(&render_event(&event, tz)),
        }
    }

    debug!("stdin closed, finalizing open sessions");
    manager.flush_all().await;
    while let Ok(event) = events.try_recv() {
        emit(&render_event(&event, tz));
    }
    Ok(())
}

async fn handle_line<B: LedgerBackend + 'static>(
    manager: &SessionManager<B>,
    ocr: &OcrClient,
    group: &GroupSection,
    line: &str,
) -> Option<Value> {
    let msg: InboundLine = match serde_json::from_str(line) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "unreadable input line");
            return Some(json!({ "event": "error", "message": format!("invalid input: {e}") }));
        }
    };
    let key = SubmitterId::new(group.id, msg.user);

    if let Some(command) = msg.command.as_deref() {
        return Some(run_command(manager, group, key, command).await);
    }

    let ocr_text = match &msg.image {
        Some(path) => recognize(ocr, path).await,
        None => String::new(),
    };
    manager
        .push(
            key,
            InboundMessage {
                text: msg.text,
                caption: msg.caption,
                ocr_text,
            },
        )
        .await;
    None
}

async fn run_command<B: LedgerBackend + 'static>(
    manager: &SessionManager<B>,
    group: &GroupSection,
    key: SubmitterId,
    command: &str,
) -> Value {
    let user = key.user_id;
    match command {
        "edit" => match manager.enter_edit(key).await {
            Ok(()) => json!({ "event": "edit_started", "user": user }),
            Err(e) => json!({ "event": "error", "user": user, "message": e.to_string() }),
        },
        "cancel" => {
            let cancelled = manager.cancel(key).await;
            json!({ "event": "cancelled", "user": user, "had_session": cancelled })
        }
        "done" => {
            manager.flush(key).await;
            json!({ "event": "flushed", "user": user })
        }
        "status" => {
            let state = manager.state(key).await;
            json!({ "event": "status", "user": user, "state": format!("{state:?}") })
        }
        "dashboard" if group.is_admin(user) => {
            let snapshot = manager
                .with_reconciler(|r| LedgerSnapshot::read(r.backend()))
                .await;
            match snapshot {
                Ok(s) => json!({ "event": "dashboard", "user": user, "dashboard": dashboard(&s) }),
                Err(e) => json!({ "event": "error", "user": user, "message": e.to_string() }),
            }
        }
        "dashboard" => json!({ "event": "error", "user": user, "message": "admins only" }),
        other => json!({ "event": "error", "user": user, "message": format!("unknown command {other:?}") }),
    }
}

async fn recognize(ocr: &OcrClient, path: &Path) -> String {
    let is_text = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("txt"));
    match tokio::fs::read(path).await {
        Ok(bytes) if is_text => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(bytes) => ocr.extract_text(&bytes).await,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "cannot read image");
            String::new()
        }
    }
}

/// Stable machine-readable reason for a rejection.
fn rejection_code(err: &SubmissionError) -> &'static str {
    match err {
        SubmissionError::ExtractionIncomplete => "extraction_incomplete",
        SubmissionError::BeneficiaryUnverified { found } if found.trim().is_empty() => {
            "beneficiary_missing"
        }
        SubmissionError::BeneficiaryUnverified { .. } => "beneficiary_wrong",
        SubmissionError::DuplicateTransaction { .. } => "duplicate_transaction",
        SubmissionError::UnknownHouse(_) => "unknown_house",
        SubmissionError::UnknownMonth => "unknown_month",
        SubmissionError::LedgerUnavailable(_) => "ledger_unavailable",
        SubmissionError::OcrFailed(_) => "ocr_failed",
    }
}

fn render_event(event: &SessionEvent, tz: Tz) -> Value {
    match event {
        SessionEvent::Saved {
            submitter,
            payment,
            receipt,
            edit,
        } => json!({
            "event": if *edit { "updated" } else { "saved" },
            "user": submitter.user_id,
            "sheet": receipt.sheet,
            "row": receipt.row,
            "house": receipt.house_number,
            "month": receipt.month.name(),
            "amount": receipt.amount,
            "transaction_id": receipt.transaction_id,
            "cell_total": receipt.cell_total,
            "payer": payment.payer_name,
            "recorded_at": to_local_string(Utc::now(), tz),
        }),
        SessionEvent::Rejected {
            submitter,
            payment,
            error,
        } => json!({
            "event": "rejected",
            "user": submitter.user_id,
            "reason": rejection_code(error),
            "message": error.to_string(),
            "payment": payment,
        }),
        SessionEvent::EditExpired { submitter } => json!({
            "event": "edit_expired",
            "user": submitter.user_id,
        }),
    }
}

fn emit(value: &Value) {
    println!("{value}");
}
