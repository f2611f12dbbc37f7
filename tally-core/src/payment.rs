use crate::calendar::EthiopianMonth;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a contribution pays for. Each reason is its own ledger sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentReason {
    Water,
    Electricity,
    Development,
    Penalty,
    #[default]
    Other,
}

impl PaymentReason {
    pub const ALL: [PaymentReason; 5] = [
        PaymentReason::Water,
        PaymentReason::Electricity,
        PaymentReason::Development,
        PaymentReason::Penalty,
        PaymentReason::Other,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            PaymentReason::Water => "water",
            PaymentReason::Electricity => "electricity",
            PaymentReason::Development => "development",
            PaymentReason::Penalty => "penalty",
            PaymentReason::Other => "other",
        }
    }

    /// Ledger sheet title.
    pub fn sheet_name(&self) -> &'static str {
        match self {
            PaymentReason::Water => "Water",
            PaymentReason::Electricity => "Electricity",
            PaymentReason::Development => "Development",
            PaymentReason::Penalty => "Penalty",
            PaymentReason::Other => "Other",
        }
    }

    pub fn amharic(&self) -> &'static str {
        match self {
            PaymentReason::Water => "ውሀ",
            PaymentReason::Electricity => "የመብራት",
            PaymentReason::Development => "የልማት",
            PaymentReason::Penalty => "የቅጣት",
            PaymentReason::Other => "ያልታወቀ",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            PaymentReason::Water => &[
                "ውሃ", "water", "wuha", "weha", "የውሀ", "ውሀ", "wiha", "የውሃ", "wha", "ውኃ", "የዉሃ", "ዉሃ",
                "የዉሀ", "ዉሀ", "ዉኃ", "የዉኃ",
            ],
            PaymentReason::Electricity => &[
                "ኤሌክትሪክ", "የመብራት", "ሙቀት", "electricity", "electric", "power", "መብራት",
            ],
            PaymentReason::Development => &[
                "የልማት", "ልማት", "አካባቢ", "ጥገና", "ጤና", "development", "environmental",
                "environment", "maintenance", "repair", "health", "medical", "hospital", "doctor",
            ],
            PaymentReason::Penalty => &["ቅጣት", "የቅጣት", "penalty", "fine", "ketat", "ktat", "kitat"],
            PaymentReason::Other => &["ያልታወቀ", "other", "unknown"],
        }
    }

    pub fn from_sheet_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.sheet_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for PaymentReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for PaymentReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown payment reason: {s}"))
    }
}

/// Classify free text into a payment reason by keyword presence.
///
/// Categories are tried in a fixed order and the first keyword hit wins, so
/// "water" beats "penalty" when both appear. No hit means [`PaymentReason::Other`].
pub fn classify_reason(text: &str) -> PaymentReason {
    let lower = text.to_lowercase();
    for reason in PaymentReason::ALL {
        if reason
            .keywords()
            .iter()
            .any(|kw| lower.contains(kw) || text.contains(kw))
        {
            return reason;
        }
    }
    PaymentReason::Other
}

/// The raw inputs for one extraction: OCR output, photo caption, typed text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptText {
    pub ocr_text: String,
    pub caption: String,
    pub user_text: String,
}

impl ReceiptText {
    /// Caption first, then typed text, then OCR. Empty parts are skipped.
    pub fn combined(&self) -> String {
        [self.caption.as_str(), self.user_text.as_str(), self.ocr_text.as_str()]
            .iter()
            .filter(|s| !s.trim().is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Best-effort field extraction result. Empty string means "not found".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPayment {
    pub house_number: String,
    pub amount: String,
    pub transaction_id: String,
    pub payer_name: String,
    pub beneficiary: String,
    pub reason: PaymentReason,
    pub month: Option<EthiopianMonth>,
    pub payment_date: String,
}

impl ExtractedPayment {
    /// Parsed amount, if it is a positive number.
    pub fn amount_value(&self) -> Option<f64> {
        parse_amount(&self.amount).filter(|v| *v > 0.0)
    }

    /// Amount and beneficiary both present; other fields are checked later.
    pub fn is_actionable(&self) -> bool {
        self.amount_value().is_some() && !self.beneficiary.trim().is_empty()
    }
}

/// Parse `"1,250.00"` style amounts.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Who sent a submission: chat group plus user inside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubmitterId {
    pub group_id: i64,
    pub user_id: i64,
}

impl SubmitterId {
    pub fn new(group_id: i64, user_id: i64) -> Self {
        Self { group_id, user_id }
    }
}

impl fmt::Display for SubmitterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.user_id)
    }
}
