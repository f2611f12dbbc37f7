//! Beneficiary validation against the authorized account holders.
//!
//! A receipt passes when ANY authorized token survives normalization. OCR
//! truncates and garbles names, so a lone "SEYOUM" still counts.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;

/// Spelling variants OCR produces for the account holders' names.
pub const AUTHORIZED_TOKENS: &[&str] = &[
    "SEYOUM", "SEYSOA", "SEYSOM", "SEYSUM", "SEYOAM", //
    "ASSEFA", "ASEFA", "ASEFFA", //
    "SENAIT", "SENIET", "SENAYT", "SENAITE", //
    "DAGNIE", "DAGNE", "DAGINE", "DAGNY", "DAGNHE",
];

const CONNECTORS: &[&str] = &["AND", "OR", "ANDOR", "THE", "OF", "TO", "A", "AN"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BeneficiaryVerdict {
    pub is_valid: bool,
    pub normalized: String,
    pub matched: Vec<String>,
}

pub struct BeneficiaryValidator {
    authorized: BTreeSet<String>,
    and_or: Regex,
    punctuation: Regex,
}

impl BeneficiaryValidator {
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_tokens(AUTHORIZED_TOKENS.iter().copied())
    }

    /// Validator for a different set of account holders.
    pub fn with_tokens<I, S>(tokens: I) -> Result<Self, regex::Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Ok(Self {
            authorized: tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_uppercase())
                .filter(|t| !t.is_empty())
                .collect(),
            and_or: Regex::new(r"AND\s*/\s*OR")?,
            punctuation: Regex::new(r"[^\w\s]")?,
        })
    }

    /// Uppercase, fold `AND/OR` and `&`, strip punctuation, collapse spaces.
    pub fn normalize(&self, name: &str) -> String {
        let upper = name.to_uppercase();
        let folded = self.and_or.replace_all(&upper, "AND OR");
        let folded = folded.replace('&', " AND ");
        let stripped = self.punctuation.replace_all(&folded, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    pub fn validate(&self, beneficiary: &str) -> BeneficiaryVerdict {
        if beneficiary.trim().is_empty() {
            tracing::warn!("no beneficiary extracted");
            return BeneficiaryVerdict {
                is_valid: false,
                normalized: String::new(),
                matched: Vec::new(),
            };
        }

        let normalized = self.normalize(beneficiary);
        let matched: Vec<String> = normalized
            .split_whitespace()
            .filter(|t| !CONNECTORS.contains(t))
            .filter(|t| self.authorized.contains(*t))
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let is_valid = !matched.is_empty();
        if is_valid {
            tracing::info!(beneficiary = %normalized, ?matched, "beneficiary verified");
        } else {
            tracing::warn!(beneficiary = %normalized, "beneficiary not authorized");
        }
        BeneficiaryVerdict {
            is_valid,
            normalized,
            matched,
        }
    }
}
