//! Payment date as printed on the receipt. Kept verbatim, never parsed.

use regex::Regex;

pub struct DateParser {
    patterns: Vec<Regex>,
}

impl DateParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            patterns: vec![
                Regex::new(r"(?i)(\d{1,2}[-/]\w{3}[-/]\d{4})")?,
                Regex::new(r"(?i)(\d{1,2}\s+(?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec)[a-z]*\s+\d{4})")?,
            ],
        })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        self.patterns
            .iter()
            .find_map(|re| re.captures(text))
            .map(|caps| caps[1].to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_dates() {
        let p = DateParser::new().unwrap();
        assert_eq!(p.extract("on 12-Jan-2025 at 10:15").as_deref(), Some("12-Jan-2025"));
        assert_eq!(p.extract("Date: 3/Feb/2025").as_deref(), Some("3/Feb/2025"));
        assert_eq!(p.extract("Paid 5 March 2025").as_deref(), Some("5 March 2025"));
        assert_eq!(p.extract("2025-01-12"), None);
    }
}
