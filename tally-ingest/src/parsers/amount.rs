//! Amount extraction: recover the base (pre-VAT) amount from a receipt.
//!
//! Expected shapes:
//!   Settled Amount            (table layout, value on the next line)
//!   ETB 1,250.00
//!   Total with VAT ETB 1,437.50
//!
//!   ETB 700.00 debited from ABEBE KEBEDE for ...
//!
//! Every candidate must exceed [`MIN_AMOUNT`]; smaller numbers are UI chrome
//! or OCR noise.

use regex::Regex;

use crate::chain::{first_match, Strategy};
use crate::text::char_window;

pub const MIN_AMOUNT: f64 = 50.0;

const AMOUNT_LABELS: &[&str] = &[
    "settled amount",
    "settled",
    "amount paid",
    "paid",
    "debited",
    "credited",
    "subtotal",
    "sub-total",
    "sub total",
    "total amount",
];

/// Words that mark a candidate as a total or fee rather than the base amount.
const EXCLUDED_CONTEXT: &[&str] = &["total", "with commission", "service charge", "vat"];

pub struct AmountParser {
    settled: Regex,
    without_vat: Vec<Regex>,
    debited: Regex,
    standard: Vec<Regex>,
    standalone: Vec<Regex>,
    value_line: Regex,
}

const PER_TEXT: &[Strategy<AmountParser>] = &[
    ("settled_amount", AmountParser::settled_amount),
    ("without_vat", AmountParser::without_vat),
    ("etb_debited", AmountParser::etb_debited),
    ("smallest_candidate", AmountParser::smallest_candidate),
];

const LAST_RESORT: &[Strategy<AmountParser>] = &[("standalone", AmountParser::standalone)];

impl AmountParser {
    pub fn new() -> Result<Self, regex::Error> {
        const NUM: &str = r"([0-9,]+(?:\.[0-9]{2})?)";
        Ok(Self {
            settled: Regex::new(&format!(r"(?is)settled\s+amount[:\s]*ETB\s*{NUM}"))?,
            without_vat: vec![
                Regex::new(&format!(
                    r"(?i)(?:subtotal|sub-total|sub total|before vat|excluding vat|excl\.? vat)[:\s]*(?:ETB|birr|ብር)?\s*{NUM}"
                ))?,
                Regex::new(&format!(
                    r"(?i)(?:ETB|birr|ብር)?\s*{NUM}\s*(?:before vat|excluding vat|excl\.? vat)"
                ))?,
            ],
            debited: Regex::new(&format!(r"(?i)ETB\s*{NUM}\s+debited"))?,
            standard: vec![
                Regex::new(&format!(r"(?i)debited.*?ETB\s*{NUM}"))?,
                Regex::new(&format!(r"(?i)amount.*?(?:ETB|birr)?\s*{NUM}"))?,
                Regex::new(&format!(r"(?i)(?:ETB|birr|ብር)\s*{NUM}"))?,
                Regex::new(&format!(r"(?i){NUM}\s*(?:ETB|birr|ብር)"))?,
            ],
            standalone: vec![
                Regex::new(r"(?im)(?:^|\n|\s)([0-9,]+\.00)\s*Birr")?,
                Regex::new(r"(?im)(?:^|\n|\s)([0-9,]+\.[0-9]{2})\s*(?:Birr|ETB)")?,
            ],
            value_line: Regex::new(r"^[0-9,]+\.[0-9]{2}")?,
        })
    }

    /// Extract the base amount as a plain numeric string (`"1250.00"`), or
    /// `None`. The line-joined text is searched first, then the raw text.
    pub fn extract(&self, text: &str) -> Option<String> {
        let normalized = self.join_split_labels(text);
        for candidate in [normalized.as_str(), text] {
            if let Some(found) = first_match("amount", self, candidate, PER_TEXT) {
                return Some(found);
            }
        }
        first_match("amount", self, text, LAST_RESORT)
    }

    /// Merge "Settled Amount" + next-line "ETB 1,000.00" into one line.
    /// Blank lines are dropped.
    pub fn join_split_labels(&self, text: &str) -> String {
        let lines: Vec<&str> = text.split('\n').collect();
        let mut out: Vec<String> = Vec::with_capacity(lines.len());
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();
            if line.is_empty() {
                i += 1;
                continue;
            }
            let lower = line.to_lowercase();
            let labelled = AMOUNT_LABELS.iter().any(|l| lower.contains(l));
            let next = lines.get(i + 1).map(|l| l.trim()).unwrap_or("");
            let value_follows = !next.is_empty()
                && (next.to_uppercase().starts_with("ETB") || self.value_line.is_match(next));
            if labelled && value_follows {
                out.push(format!("{line} {next}"));
                i += 2;
            } else {
                out.push(line.to_string());
                i += 1;
            }
        }
        out.join("\n")
    }

    fn settled_amount(&self, text: &str) -> Option<String> {
        let caps = self.settled.captures(text)?;
        plausible(&caps[1])
    }

    fn without_vat(&self, text: &str) -> Option<String> {
        self.without_vat
            .iter()
            .filter_map(|re| re.captures(text))
            .find_map(|caps| plausible(&caps[1]))
    }

    /// `ETB X debited` is the base amount unless a "total" label sits just
    /// before it.
    fn etb_debited(&self, text: &str) -> Option<String> {
        let caps = self.debited.captures(text)?;
        let value = plausible(&caps[1])?;
        let start = caps.get(0)?.start();
        let preceding = char_window(text, start, 50, 0);
        if preceding.to_lowercase().contains("total") {
            return None;
        }
        Some(value)
    }

    /// Smallest surviving currency-adjacent number. VAT-inclusive totals are
    /// always larger than the base amount.
    // TODO: replace with an explicit VAT-line match once receipts with a fee
    // smaller than the base amount show up in the sample set.
    fn smallest_candidate(&self, text: &str) -> Option<String> {
        let mut candidates: Vec<(f64, String)> = Vec::new();
        for re in &self.standard {
            for caps in re.captures_iter(text) {
                let (Some(whole), Some(num)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                let Some(value) = plausible(num.as_str()) else {
                    continue;
                };
                let context = char_window(text, whole.start(), 30, 100).to_lowercase();
                if EXCLUDED_CONTEXT.iter().any(|w| context.contains(w)) {
                    continue;
                }
                if let Ok(v) = value.parse::<f64>() {
                    candidates.push((v, value));
                }
            }
        }
        candidates
            .into_iter()
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, s)| s)
    }

    /// "1000.00 Birr" anywhere, even when OCR garbled the label before it.
    fn standalone(&self, text: &str) -> Option<String> {
        self.standalone
            .iter()
            .flat_map(|re| re.captures_iter(text))
            .find_map(|caps| plausible(&caps[1]))
    }
}

/// Strip thousands separators and apply the noise floor.
fn plausible(raw: &str) -> Option<String> {
    let cleaned = raw.replace(',', "");
    let value: f64 = cleaned.parse().ok()?;
    (value > MIN_AMOUNT).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> AmountParser {
        AmountParser::new().unwrap()
    }

    #[test]
    fn test_settled_amount_beats_vat_total() {
        let text = "Settled Amount\nETB 1,250.00\nTotal with VAT ETB 1,437.50";
        assert_eq!(parser().extract(text).as_deref(), Some("1250.00"));
    }

    #[test]
    fn test_join_split_labels() {
        let p = parser();
        let joined = p.join_split_labels("Settled Amount\n\nETB 1,000.00\nPaid\n1,000.00 Birr\nfoo");
        // blank line between label and value prevents the join
        assert_eq!(joined, "Settled Amount\nETB 1,000.00\nPaid 1,000.00 Birr\nfoo");
    }

    #[test]
    fn test_subtotal_label() {
        let text = "Subtotal: ETB 800.00\nVAT 15% 120.00\nTotal ETB 920.00";
        assert_eq!(parser().extract(text).as_deref(), Some("800.00"));
    }

    #[test]
    fn test_etb_debited() {
        let text = "Dear Customer, your account 1000***1234 has been\nETB 700.00 debited from ABEBE KEBEDE on 12-Jan-2025";
        assert_eq!(parser().extract(text).as_deref(), Some("700.00"));
    }

    #[test]
    fn test_debited_after_total_label_is_skipped() {
        // The `ETB X debited` form follows "Total", so the candidate pass
        // decides. Blank lines keep the total out of the first match's context
        // in the raw text.
        let text = format!(
            "Transferred ETB 600.00 to SEYOUM ASSEFA{}Total ETB 690.00 debited",
            "\n".repeat(120)
        );
        assert_eq!(parser().extract(&text).as_deref(), Some("600.00"));
    }

    #[test]
    fn test_smallest_candidate_wins() {
        let text = "Transfer of ETB 1,500.00\nreceived ETB 1,200.00";
        assert_eq!(parser().extract(text).as_deref(), Some("1200.00"));
    }

    #[test]
    fn test_noise_floor() {
        let p = parser();
        assert_eq!(p.extract("ETB 45.00"), None);
        assert_eq!(p.extract("Fee ETB 50.00"), None);
        assert_eq!(p.extract("ETB 12\nETB 51").as_deref(), Some("51"));
    }

    #[test]
    fn test_round_trip_on_own_output() {
        let p = parser();
        for text in ["Settled Amount\nETB 1,250.00", "ETB 700 debited", "Amount: 2,000.00 Birr"] {
            let first = p.extract(text).unwrap();
            let again = p.extract(&format!("ETB {first}")).unwrap();
            assert_eq!(first, again, "input {text:?}");
        }
    }

    #[test]
    fn test_standalone_fallback_with_vat_nearby() {
        // every currency match sits next to "vat", so only the last resort finds it
        let text = "8th6.4@ vat 1000.00 Birr";
        assert_eq!(parser().extract(text).as_deref(), Some("1000.00"));
    }

    #[test]
    fn test_no_amount() {
        assert_eq!(parser().extract("Thank you for banking with us"), None);
        assert_eq!(parser().extract(""), None);
    }
}
