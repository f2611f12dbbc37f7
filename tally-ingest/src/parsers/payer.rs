//! Payer (sender) name. Informational: when the house is known the registry
//! occupant replaces whatever this finds.

use regex::Regex;

use crate::chain::{first_match, Strategy};
use crate::text::collapse_whitespace;

pub struct PayerParser {
    labelled: Regex,
    holder: Regex,
    caps_line: Regex,
}

const CHAIN: &[Strategy<PayerParser>] = &[
    ("debited_from", PayerParser::labelled),
    ("account_holder", PayerParser::holder),
    ("caps_line", PayerParser::caps_line),
];

impl PayerParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            labelled: Regex::new(r"(?i)(?:debited from|from|paid by|payer)[:\s]+([A-Z][A-Za-z\s]+?)(?:\n|for|with)")?,
            holder: Regex::new(r"(?i)(?:payer|account holder)[:\s]+([A-Z][A-Za-z\s]+?)(?:\n|for|on)")?,
            caps_line: Regex::new(r"([A-Z][A-Z][A-Z\s]{2,}?)(?:\n|for)")?,
        })
    }

    pub fn extract(&self, text: &str) -> Option<String> {
        first_match("payer_name", self, text, CHAIN)
    }

    fn labelled(&self, text: &str) -> Option<String> {
        plausible_name(&self.labelled, text)
    }

    fn holder(&self, text: &str) -> Option<String> {
        plausible_name(&self.holder, text)
    }

    fn caps_line(&self, text: &str) -> Option<String> {
        plausible_name(&self.caps_line, text)
    }
}

fn plausible_name(re: &Regex, text: &str) -> Option<String> {
    let caps = re.captures(text)?;
    let name = collapse_whitespace(&caps[1]);
    let len = name.chars().count();
    (len > 3 && len < 50).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debited_from() {
        let p = PayerParser::new().unwrap();
        let text = "ETB 700.00 debited from ABEBE KEBEDE for water on 12-Jan-2025";
        assert_eq!(p.extract(text).as_deref(), Some("ABEBE KEBEDE"));
    }

    #[test]
    fn test_caps_line() {
        let p = PayerParser::new().unwrap();
        assert_eq!(p.extract("TIGIST ALEMU\n1000123456").as_deref(), Some("TIGIST ALEMU"));
    }

    #[test]
    fn test_too_short() {
        let p = PayerParser::new().unwrap();
        assert_eq!(p.extract("paid by Abe\n"), None);
    }
}
