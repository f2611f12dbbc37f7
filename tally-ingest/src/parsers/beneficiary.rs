//! Beneficiary (receiver) name extraction.
//!
//! Two layouts matter. Linear slips print `Beneficiary: NAME`. Table
//! screenshots come out of OCR column by column, so the labels arrive first
//! and the values several lines later:
//!
//!   Source Account Name
//!   Receiver Name
//!   Receiver Account
//!   SEBLE FULIE SHUME          <- sender value
//!   1000123456789              <- sender account: crossing it means the
//!   SEYOUM ASSEFA AND OR ...   <- next names belong to the receiver
//!
//! The sender names printed on the group's own statements are excluded
//! explicitly so they never come back as a receiver.

use regex::Regex;

use crate::chain::{first_match, Strategy};
use crate::text::{collapse_whitespace, normalize_dashes};

/// Lines after the label that may still hold the value.
const LABEL_LOOKAHEAD: usize = 12;

pub const KNOWN_SENDER_NAMES: &[&str] = &["SEBLE FULIE SHUME", "SEBLE FULIE", "FULIE SHUME"];

const CONTEXT_LABELS: &[&str] = &[
    "ACCOUNT NAME",
    "RECEIVER NAME",
    "SOURCE ACCOUNT",
    "TRANSACTION",
    "REFERENCE",
    "BANK NAME",
];

const BOILERPLATE_PHRASES: &[&str] = &[
    "BANK OF",
    "COMMERCIAL BANK",
    "TRANSACTION TYPE",
    "ACCOUNT NUMBER",
    "REFERENCE NUMBER",
    "TRANSACTION DATE",
    "TRANSACTION ID",
    "SOURCE ACCOUNT",
    "RECEIVER ACCOUNT",
    "ACCOUNT NAME",
    "RECEIVER NAME",
    "BENEFICIARY NAME",
    "OTHER BANK",
    "BANK TRANSFER",
    "THE CHOICE",
    "SCAN THE",
    "CHOICE FOR",
    "SEBLE FULIE",
    "FULIE SHUME",
];

const FILLER_WORDS: &[&str] = &["THE", "FOR", "AND", "OR", "OF", "TO", "FROM"];

pub struct BeneficiaryParser {
    label: Regex,
    source: Regex,
    leading_digit: Regex,
    field_keyword: Regex,
    caps_pair: Regex,
    and_slash_or: Regex,
    andor: Regex,
    currency_tail: Regex,
    joint: Vec<Regex>,
    source_context: Regex,
    receiver_context: Regex,
    context_name: Regex,
    any_name: Regex,
}

const CHAIN: &[Strategy<BeneficiaryParser>] = &[
    ("label_lookahead", BeneficiaryParser::label_lookahead),
    ("joint_account", BeneficiaryParser::joint_account),
    ("receiver_context", BeneficiaryParser::receiver_context),
    ("caps_sequence", BeneficiaryParser::caps_sequence),
];

impl BeneficiaryParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            label: Regex::new(r"(?i)\b(Receiver Name|Beneficiary Name|Beneficiary)\b")?,
            source: Regex::new(r"(?i)Source")?,
            leading_digit: Regex::new(r"^\d")?,
            field_keyword: Regex::new(
                r"(?i)(Transaction|Reference|Type|Bank|Note|Account|Amount|Date|Time|Source|ETB|FTB)",
            )?,
            caps_pair: Regex::new(r"\b[A-Z]{2,}\s+[A-Z]{2,}")?,
            and_slash_or: Regex::new(r"(?i)AND\s*/\s*OR")?,
            andor: Regex::new(r"(?i)ANDOR")?,
            currency_tail: Regex::new(r"(?i)\s+(ETB|FTB|BIRR).*$")?,
            joint: vec![
                Regex::new(r"(?i)([A-Z][A-Z]+\s+[A-Z][A-Z]+\s+AND\s+OR\s+[A-Z][A-Z]+\s+[A-Z][A-Z]+)")?,
                Regex::new(r"(?i)([A-Z][A-Z]+\s+[A-Z][A-Z]+\s+AND\s*/\s*OR\s+[A-Z][A-Z]+\s+[A-Z][A-Z]+)")?,
                Regex::new(r"(?i)([A-Z][A-Z]+\s+[A-Z][A-Z]+\s+ANDOR\s+[A-Z][A-Z]+\s+[A-Z][A-Z]+)")?,
            ],
            source_context: Regex::new(r"(?i)source\s+account\s+name")?,
            receiver_context: Regex::new(r"(?i)receiver|beneficiary|payee|paid to|credited to")?,
            context_name: Regex::new(r"\b([A-Z]{2,}\s+[A-Z]{2,}(?:\s+[A-Z]{2,}){0,4})\b")?,
            any_name: Regex::new(r"\b([A-Z]{2,}\s+[A-Z]{2,}(?:\s+[A-Z]{2,}){0,2})\b")?,
        })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        let text = normalize_dashes(text);
        first_match("beneficiary", self, &text, CHAIN)
    }

    /// Scan the lines after a receiver label for an upper-case name.
    fn label_lookahead(&self, text: &str) -> Option<String> {
        let lines: Vec<&str> = text.split('\n').collect();
        let label_idx = lines
            .iter()
            .position(|line| self.label.is_match(line) && !self.source.is_match(line))?;

        let end = (label_idx + LABEL_LOOKAHEAD).min(lines.len());
        let mut candidates: Vec<String> = Vec::new();
        let mut crossed_account = false;

        for raw in &lines[label_idx + 1..end] {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if self.leading_digit.is_match(line) {
                if !candidates.is_empty() {
                    crossed_account = true;
                }
                candidates.clear();
                continue;
            }
            if self.field_keyword.is_match(line) || !self.caps_pair.is_match(line) {
                continue;
            }

            let name = self.clean_name(line);
            let joint = name.to_uppercase().contains("AND OR");
            if name.split_whitespace().count() < 2 && !joint {
                continue;
            }
            if is_known_sender(&name) {
                tracing::debug!(name = %name, "skipping sender name");
                continue;
            }
            candidates.push(name);
        }

        if let Some(joint) = candidates.iter().find(|c| c.to_uppercase().contains("AND OR")) {
            return Some(joint.clone());
        }
        if crossed_account {
            candidates.pop()
        } else {
            candidates.into_iter().next()
        }
    }

    fn clean_name(&self, line: &str) -> String {
        let name = self.and_slash_or.replace_all(line, "AND OR");
        let name = self.andor.replace_all(&name, "AND OR");
        let name = collapse_whitespace(&name);
        self.currency_tail.replace(&name, "").trim().to_string()
    }

    /// `NAME NAME AND OR NAME NAME` anywhere in the text.
    fn joint_account(&self, text: &str) -> Option<String> {
        self.joint
            .iter()
            .filter_map(|re| re.captures(text))
            .map(|caps| collapse_whitespace(&caps[1]))
            .find(|name| (10..=80).contains(&name.len()))
    }

    /// An upper-case name within two lines after a receiver/payee keyword.
    fn receiver_context(&self, text: &str) -> Option<String> {
        let lines: Vec<&str> = text.split('\n').collect();
        for (i, line) in lines.iter().enumerate() {
            let context = lines[i.saturating_sub(2)..=i].join("\n");
            if self.source_context.is_match(&context) || !self.receiver_context.is_match(&context) {
                continue;
            }
            let Some(caps) = self.context_name.captures(line) else {
                continue;
            };
            let name = &caps[1];
            if CONTEXT_LABELS.iter().any(|l| name.contains(l)) {
                continue;
            }
            if (5..=80).contains(&name.len()) && name.split_whitespace().count() >= 2 {
                return Some(name.to_string());
            }
        }
        None
    }

    /// Last resort: any 2–4 word upper-case run that is not bank boilerplate.
    fn caps_sequence(&self, text: &str) -> Option<String> {
        self.any_name
            .captures_iter(text)
            .map(|caps| caps[1].to_string())
            .find(|name| {
                let upper = name.to_uppercase();
                !BOILERPLATE_PHRASES.iter().any(|p| upper.contains(p))
                    && !name.split_whitespace().all(|w| FILLER_WORDS.contains(&w))
                    && (5..=60).contains(&name.len())
                    && name.split_whitespace().count() >= 2
            })
    }
}

fn is_known_sender(name: &str) -> bool {
    let upper = name.to_uppercase();
    KNOWN_SENDER_NAMES.contains(&upper.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> BeneficiaryParser {
        BeneficiaryParser::new().unwrap()
    }

    #[test]
    fn test_table_layout_after_account_line() {
        let text = "Source Account Name\nReceiver Name\nReceiver Account\nABEBE KEBEDE\n1000123456789\nSEYOUM ASSEFA";
        assert_eq!(parser().extract(text).as_deref(), Some("SEYOUM ASSEFA"));
    }

    #[test]
    fn test_joint_account_preferred() {
        let text = "Beneficiary Name\nTIGIST ALEMU\nSEYOUM ASSEFA AND/OR SENAIT DAGNE";
        assert_eq!(
            parser().extract(text).as_deref(),
            Some("SEYOUM ASSEFA AND OR SENAIT DAGNE")
        );
    }

    #[test]
    fn test_known_sender_is_skipped() {
        let text = "Beneficiary\nSEBLE FULIE SHUME\nSENAIT DAGNE";
        assert_eq!(parser().extract(text).as_deref(), Some("SENAIT DAGNE"));
    }

    #[test]
    fn test_first_candidate_without_account_line() {
        let text = "Beneficiary\nSEYOUM ASSEFA BIRR 500\nSOMEONE ELSE";
        assert_eq!(parser().extract(text).as_deref(), Some("SEYOUM ASSEFA"));
    }

    #[test]
    fn test_joint_pattern_without_label() {
        let text = "Transfer to seyoum assefa andor senait dagne completed";
        assert_eq!(
            parser().extract(text).as_deref(),
            Some("seyoum assefa andor senait dagne")
        );
    }

    #[test]
    fn test_paid_to_context() {
        let text = "You have paid to\nSEYOUM ASSEFA\nThank you";
        assert_eq!(parser().extract(text).as_deref(), Some("SEYOUM ASSEFA"));
    }

    #[test]
    fn test_boilerplate_is_not_a_name() {
        let text = "COMMERCIAL BANK OF ETHIOPIA\nThank you for banking with us\nABEBE KEBEDE";
        assert_eq!(parser().extract(text).as_deref(), Some("ABEBE KEBEDE"));
    }

    #[test]
    fn test_dashes_normalized() {
        let text = "Beneficiary \u{2013} Name\nSEYOUM ASSEFA";
        assert_eq!(parser().extract(text).as_deref(), Some("SEYOUM ASSEFA"));
    }

    #[test]
    fn test_nothing_found() {
        assert_eq!(parser().extract("paid 500 birr"), None);
        assert_eq!(parser().extract(""), None);
    }
}
