//! Transaction ID extraction.
//!
//! Expected shapes (one per receipt family):
//!   Payment order number            bank table layout, value may wrap
//!   FT25012ABCDE1
//!
//!   Invoice No. DAE3SX92FL          mobile-money invoice
//!
//!   Transaction ID: FT2501234567    generic bank slip
//!
//! Labels ("Reference", "Amount", ...) sit right next to the values and OCR
//! happily glues them together, so every candidate is checked against
//! [`EXCLUDED_WORDS`] and must mix letters with digits.

use regex::Regex;

use crate::chain::{first_match, Strategy};
use crate::text::{has_letter_and_digit, is_all_digits, is_all_letters};

/// Receipt field labels that must never come back as an ID.
pub const EXCLUDED_WORDS: &[&str] = &[
    "transaction",
    "reference",
    "number",
    "invoice",
    "receipt",
    "details",
    "reason",
    "type",
    "time",
    "date",
    "amount",
    "account",
    "completed",
    "payment",
    "transfer",
    "charge",
    "commission",
    "sender",
];

const CURRENCY_CODES: &[&str] = &["ETB", "BIRR", "FTB"];

pub struct TxidParser {
    order_number: Regex,
    invoice_labelled: Regex,
    invoice_standalone: Regex,
    labelled: Vec<Regex>,
    hyphenated: Regex,
    reason_token: Regex,
    generic: Regex,
    typed: Vec<Regex>,
}

const CHAIN: &[Strategy<TxidParser>] = &[
    ("order_number", TxidParser::order_number),
    ("mobile_money_invoice", TxidParser::mobile_money_invoice),
    ("labelled", TxidParser::labelled),
    ("hyphenated", TxidParser::hyphenated),
    ("generic_token", TxidParser::generic_token),
];

impl TxidParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            order_number: Regex::new(
                r"(?im)(?:payment\s+order\s+number|reference\s+no\.?)[:\s]*\n?\s*([A-Z0-9]{10,})",
            )?,
            invoice_labelled: Regex::new(
                r"(?im)(?:invoice\s+no\.?|Ph?ES\s+PC)[:\s]*\n?\s*([A-Z]{3}[A-Z0-9]{7,12})",
            )?,
            invoice_standalone: Regex::new(r"(?i)\b([A-Z]{3}[0-9][A-Z0-9]{2}[A-Z]{2}[A-Z0-9]{2,5})\b")?,
            labelled: vec![
                Regex::new(r"(?i)(?:transaction\s+id|tx\s+id|txid|tran\s+ref)\s*:\s*([A-Za-z0-9]+)")?,
                Regex::new(r"(?i)(?:transaction\s+id|tx\s+id|txid|tran\s+ref)\s+([A-Za-z0-9]+)")?,
                Regex::new(
                    r"(?i)(?:reference\s+no\.?\s*\(vat\s+invoice\s+no\.?\)|vat\s+invoice\s+no\.?)\s*:\s*([A-Za-z0-9]+)",
                )?,
                Regex::new(r"(?i)(?:vat\s+receipt\s+number|vat\s+receipt\s+no\.?)\s*:\s*([A-Za-z0-9]+)")?,
                Regex::new(r"(?i)(?:vat\s+invoice\s+number|vat\s+invoice\s+no\.?)\s*:\s*([A-Za-z0-9]+)")?,
                Regex::new(r"(?i)(?:reference\s+number|ref\s+no\.?)\s*:\s*([A-Za-z0-9]+)")?,
            ],
            hyphenated: Regex::new(r"([A-Za-z0-9]+-[A-Za-z0-9]+-[A-Za-z0-9]+)")?,
            reason_token: Regex::new(r"(?i)([A-Z0-9]{8,})")?,
            generic: Regex::new(
                r"\b([A-Z]{2}[A-Za-z0-9]{8,}|[0-9]{2}[A-Z]{2,}[A-Z0-9]{6,}|[A-Z0-9]{10,})\b",
            )?,
            typed: vec![
                Regex::new(r"(?i)(?:txid|transaction\s*id|tx\s*id|reference|ref)[:\s]+([A-Z0-9]{8,})")?,
                Regex::new(r"(?i)([0-9]{2}[A-Z]{2,}[A-Z0-9]{6,})")?,
            ],
        })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        first_match("transaction_id", self, text, CHAIN)
    }

    /// IDs a user typed by hand, read off a receipt OCR could not parse.
    /// Returned upper-cased.
    pub fn extract_typed(&self, text: &str) -> Option<String> {
        self.typed
            .iter()
            .find_map(|re| re.captures(text))
            .map(|caps| caps[1].to_uppercase())
    }

    fn order_number(&self, text: &str) -> Option<String> {
        let caps = self.order_number.captures(text)?;
        let id = caps[1].trim();
        (id.len() >= 10 && !is_excluded(id) && has_letter_and_digit(id) && !mentions_reason(id))
            .then(|| id.to_string())
    }

    fn mobile_money_invoice(&self, text: &str) -> Option<String> {
        [&self.invoice_labelled, &self.invoice_standalone]
            .into_iter()
            .filter_map(|re| re.captures(text))
            .map(|caps| caps[1].trim().to_uppercase())
            .find(|id| {
                (10..=15).contains(&id.len())
                    && id.chars().take(3).all(|c| c.is_ascii_alphabetic())
                    && id.chars().any(|c| c.is_ascii_digit())
                    && !is_excluded(id)
            })
    }

    fn labelled(&self, text: &str) -> Option<String> {
        self.labelled
            .iter()
            .filter_map(|re| re.captures(text))
            .map(|caps| caps[1].trim().to_string())
            .find(|id| {
                id.len() >= 5
                    && !is_excluded(id)
                    && !is_all_digits(id)
                    && !is_all_letters(id)
                    && has_letter_and_digit(id)
                    && !mentions_reason(id)
            })
    }

    /// `ABC-DEF-123`. Needs a letter, so ISO dates never qualify.
    fn hyphenated(&self, text: &str) -> Option<String> {
        self.hyphenated
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|id| {
                let upper = id.to_uppercase();
                id.chars().any(char::is_alphabetic)
                    && id.len() >= 8
                    && !is_excluded(id)
                    && !CURRENCY_CODES.iter().any(|c| upper.contains(c))
                    && !mentions_reason(id)
            })
            .map(str::to_string)
    }

    /// Any long mixed token, except codes printed on a "Payment Reason" line.
    fn generic_token(&self, text: &str) -> Option<String> {
        let reason_codes: Vec<String> = text
            .lines()
            .filter(|line| line.to_lowercase().contains("payment reason"))
            .flat_map(|line| self.reason_token.find_iter(line))
            .map(|m| m.as_str().to_lowercase())
            .collect();

        self.generic
            .find_iter(text)
            .map(|m| m.as_str())
            .find(|id| {
                !is_excluded(id)
                    && !reason_codes.iter().any(|c| c == &id.to_lowercase())
                    && !is_all_digits(id)
                    && !is_all_letters(id)
                    && has_letter_and_digit(id)
            })
            .map(str::to_string)
    }
}

fn is_excluded(id: &str) -> bool {
    let lower = id.to_lowercase();
    EXCLUDED_WORDS.contains(&lower.as_str())
}

fn mentions_reason(id: &str) -> bool {
    id.to_lowercase().contains("reason")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TxidParser {
        TxidParser::new().unwrap()
    }

    #[test]
    fn test_order_number_on_next_line() {
        let text = "Payment order number\nFT25012ABCDE\nAmount ETB 500.00";
        assert_eq!(parser().extract(text).as_deref(), Some("FT25012ABCDE"));
    }

    #[test]
    fn test_mobile_money_invoice() {
        let p = parser();
        assert_eq!(
            p.extract("Invoice No. dae3sx92fl\nPaid 700 Birr").as_deref(),
            Some("DAE3SX92FL")
        );
        assert_eq!(p.extract("telebirr receipt CGH4A1XY99 done").as_deref(), Some("CGH4A1XY99"));
    }

    #[test]
    fn test_transaction_id_label() {
        let p = parser();
        assert_eq!(p.extract("Transaction ID: FT2501234567").as_deref(), Some("FT2501234567"));
        assert_eq!(p.extract("txid AB12345").as_deref(), Some("AB12345"));
    }

    #[test]
    fn test_label_word_is_not_an_id() {
        // "Transaction ID: Reference" must not return "Reference"; the
        // generic pass then finds the real token.
        let text = "Transaction ID: Reference\nFT2501234567";
        assert_eq!(parser().extract(text).as_deref(), Some("FT2501234567"));
    }

    #[test]
    fn test_hyphenated_skips_dates_and_currency() {
        let p = parser();
        assert_eq!(p.extract("Date 2025-11-05\nRef ABC-DEF-123").as_deref(), Some("ABC-DEF-123"));
        assert_eq!(p.extract("1-ETB-500 only"), None);
    }

    #[test]
    fn test_payment_reason_codes_are_skipped() {
        let text = "Payment Reason: WATER2025JAN\nRef: FT25NOV12345";
        assert_eq!(parser().extract(text).as_deref(), Some("FT25NOV12345"));
    }

    #[test]
    fn test_typed_id() {
        let p = parser();
        assert_eq!(p.extract_typed("ref: ft25012abcde").as_deref(), Some("FT25012ABCDE"));
        assert_eq!(p.extract_typed("407 water 25ABCD123456").as_deref(), Some("25ABCD123456"));
        assert_eq!(p.extract_typed("407 water"), None);
    }

    #[test]
    fn test_nothing_plausible() {
        assert_eq!(parser().extract("Thank you 12345678901"), None);
    }
}
