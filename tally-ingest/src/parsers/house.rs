//! House number extraction (3–4 digits).
//!
//! Captions look like `"ቁ 1108 የታህሳስ 2018"`, `"H.No 407 water"` or `"14/06"`.
//! OCR text is a whole receipt where the house number, if present at all, is
//! usually written in the remark near the bottom.

use regex::Regex;

use crate::chain::{first_match, Strategy};

pub struct HouseParser {
    amharic_house_label: Regex,
    english_house_label: Regex,
    amharic_number_label: Regex,
    url: Regex,
    ft_reference: Regex,
    digits: Regex,
    caption_keywords: Regex,
    slash_pair: Regex,
    space_pair: Regex,
}

const CHAIN: &[Strategy<HouseParser>] = &[
    ("amharic_house_label", HouseParser::amharic_house_label),
    ("english_house_label", HouseParser::english_house_label),
    ("amharic_number_label", HouseParser::amharic_number_label),
    ("bare_number", HouseParser::bare_number),
    ("split_pair", HouseParser::split_pair),
];

/// Texts shorter than this are treated as captions.
const CAPTION_MAX_CHARS: usize = 100;

impl HouseParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            amharic_house_label: Regex::new(r"ቤት\s*ቁጥር\s*[:.]?\s*(\d{3,4})")?,
            english_house_label: Regex::new(r"(?i)(?:H\.?\s*No\.?|H-No\.?|House)\s*[:.]?\s*(\d{3,4})")?,
            amharic_number_label: Regex::new(r"ቁ(?:ጥር)?\s*[:.]?\s*(\d{3,4})")?,
            url: Regex::new(r"https?://\S+")?,
            ft_reference: Regex::new(r"FT\d+\w*")?,
            digits: Regex::new(r"[0-9]+")?,
            caption_keywords: Regex::new(r"(?i)ቁ|ብሎክ|ወር|H\.?No|Block")?,
            slash_pair: Regex::new(r"(\d{1,2})\s*/\s*(\d{1,2})")?,
            space_pair: Regex::new(r"(\d{1,2})\s+(\d{1,2})")?,
        })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        if text.trim().is_empty() {
            return None;
        }
        first_match("house_number", self, text, CHAIN)
    }

    fn amharic_house_label(&self, text: &str) -> Option<String> {
        capture(&self.amharic_house_label, text)
    }

    fn english_house_label(&self, text: &str) -> Option<String> {
        capture(&self.english_house_label, text)
    }

    fn amharic_number_label(&self, text: &str) -> Option<String> {
        capture(&self.amharic_number_label, text)
    }

    /// Any 3–4 digit number that is not a year and not a round amount.
    /// Captions take the first candidate, receipts the last.
    fn bare_number(&self, text: &str) -> Option<String> {
        let cleaned = self.url.replace_all(text, "");
        let cleaned = self.ft_reference.replace_all(&cleaned, "");
        let candidates: Vec<&str> = self
            .digits
            .find_iter(&cleaned)
            .map(|m| m.as_str())
            .filter(|n| is_house_candidate(n))
            .collect();

        let looks_like_caption =
            text.chars().count() < CAPTION_MAX_CHARS || self.caption_keywords.is_match(text);
        let picked = if looks_like_caption {
            candidates.first()
        } else {
            candidates.last()
        };
        picked.map(|n| n.to_string())
    }

    /// `"14/06"` or `"14 06"` → `"1406"`.
    fn split_pair(&self, text: &str) -> Option<String> {
        [&self.slash_pair, &self.space_pair]
            .into_iter()
            .filter_map(|re| re.captures(text))
            .map(|caps| format!("{}{}", &caps[1], &caps[2]))
            .find(|joined| (3..=4).contains(&joined.len()))
    }
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| caps[1].to_string())
}

// Round numbers are usually amounts. This also rejects real houses like 500;
// TODO: check candidates against the group's registry instead.
fn is_house_candidate(n: &str) -> bool {
    match n.len() {
        3 => !n.ends_with('0'),
        4 => !(n.starts_with("19") || n.starts_with("20")) && !n.ends_with('0'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> HouseParser {
        HouseParser::new().unwrap()
    }

    #[test]
    fn test_caption_takes_first_non_year() {
        assert_eq!(parser().extract("ቁ 1108 የታህሳስ 2018").as_deref(), Some("1108"));
        assert_eq!(parser().extract("2018 tir 407").as_deref(), Some("407"));
    }

    #[test]
    fn test_labels() {
        let p = parser();
        assert_eq!(p.extract("ቤት ቁጥር: 512 ውሃ").as_deref(), Some("512"));
        assert_eq!(p.extract("H.No 407").as_deref(), Some("407"));
        assert_eq!(p.extract("house:1203").as_deref(), Some("1203"));
        assert_eq!(p.extract("ቁጥር 903").as_deref(), Some("903"));
        assert_eq!(p.extract("ብ 22 ቁ407").as_deref(), Some("407"));
    }

    #[test]
    fn test_label_accepts_round_numbers() {
        // only the bare-number heuristic drops trailing zeros
        assert_eq!(parser().extract("House 500").as_deref(), Some("500"));
        assert_eq!(parser().extract("500 water"), None);
    }

    #[test]
    fn test_long_receipt_takes_last_candidate() {
        let text = "Commercial Bank of Ethiopia\n\
                    Debited account 1000***3571 on 12 Jan 2025\n\
                    ETB 1,000.00 transferred to the beneficiary account listed below\n\
                    Reference FT25012ABCDE\n\
                    Remark: payment for 407 thank you";
        assert!(text.chars().count() > 100);
        assert_eq!(parser().extract(text).as_deref(), Some("407"));
    }

    #[test]
    fn test_ft_reference_and_urls_are_ignored() {
        let text = "FT25123 https://bank.example/r/789 paid 613";
        assert_eq!(parser().extract(text).as_deref(), Some("613"));
    }

    #[test]
    fn test_split_pair() {
        let p = parser();
        assert_eq!(p.extract("14/06").as_deref(), Some("1406"));
        assert_eq!(p.extract("block 9 12").as_deref(), Some("912"));
        assert_eq!(p.extract("water"), None);
        assert_eq!(p.extract(""), None);
    }
}
