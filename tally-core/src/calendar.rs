//! Ethiopian month model and free-text month resolution.
//!
//! Resolution is a table lookup, not date arithmetic. Gregorian month names map
//! to the Ethiopian month that mostly overlaps them; no day or leap-year math.
//!
//! Order of checks (first hit wins):
//! 1. canonical Ethiopian name (English spelling), case-insensitive substring
//! 2. Amharic spelling variants, including `የ`-prefixed and shortened forms
//! 3. Gregorian month names and 3-letter abbreviations (plus a few misspellings)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The 13 Ethiopian months, in calendar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EthiopianMonth {
    Meskerem,
    Tikimt,
    Hidar,
    Tahsas,
    Tir,
    Yekatit,
    Megabit,
    Miyazya,
    Ginbot,
    Sene,
    Hamle,
    Nehase,
    Pagume,
}

impl EthiopianMonth {
    pub const ALL: [EthiopianMonth; 13] = [
        EthiopianMonth::Meskerem,
        EthiopianMonth::Tikimt,
        EthiopianMonth::Hidar,
        EthiopianMonth::Tahsas,
        EthiopianMonth::Tir,
        EthiopianMonth::Yekatit,
        EthiopianMonth::Megabit,
        EthiopianMonth::Miyazya,
        EthiopianMonth::Ginbot,
        EthiopianMonth::Sene,
        EthiopianMonth::Hamle,
        EthiopianMonth::Nehase,
        EthiopianMonth::Pagume,
    ];

    /// Canonical English spelling, as used in ledger headers.
    pub fn name(&self) -> &'static str {
        match self {
            EthiopianMonth::Meskerem => "Meskerem",
            EthiopianMonth::Tikimt => "Tikimt",
            EthiopianMonth::Hidar => "Hidar",
            EthiopianMonth::Tahsas => "Tahsas",
            EthiopianMonth::Tir => "Tir",
            EthiopianMonth::Yekatit => "Yekatit",
            EthiopianMonth::Megabit => "Megabit",
            EthiopianMonth::Miyazya => "Miyazya",
            EthiopianMonth::Ginbot => "Ginbot",
            EthiopianMonth::Sene => "Sene",
            EthiopianMonth::Hamle => "Hamle",
            EthiopianMonth::Nehase => "Nehase",
            EthiopianMonth::Pagume => "Pagume",
        }
    }

    /// Amharic display name.
    pub fn amharic(&self) -> &'static str {
        match self {
            EthiopianMonth::Meskerem => "መስከረም",
            EthiopianMonth::Tikimt => "ጥቅምት",
            EthiopianMonth::Hidar => "ህዳር",
            EthiopianMonth::Tahsas => "ታህሳስ",
            EthiopianMonth::Tir => "ጥር",
            EthiopianMonth::Yekatit => "የካቲት",
            EthiopianMonth::Megabit => "መጋቢት",
            EthiopianMonth::Miyazya => "ሚያዝያ",
            EthiopianMonth::Ginbot => "ግንቦት",
            EthiopianMonth::Sene => "ሰኔ",
            EthiopianMonth::Hamle => "ሐምሌ",
            EthiopianMonth::Nehase => "ነሐሴ",
            EthiopianMonth::Pagume => "ጳጉሜ",
        }
    }

    /// Zero-based position in the year (Meskerem = 0).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

impl fmt::Display for EthiopianMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EthiopianMonth {
    type Err = String;

    /// Exact canonical name only (case-insensitive). Use
    /// [`convert_to_ethiopian_month`] for free text.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown Ethiopian month: {s}"))
    }
}

use EthiopianMonth::*;

const AMHARIC_VARIANTS: &[(&str, EthiopianMonth)] = &[
    ("መስከረም", Meskerem),
    ("የመስከረም", Meskerem),
    ("ጥቅምት", Tikimt),
    ("የጥቅምት", Tikimt),
    ("ጥቅም", Tikimt),
    ("የጥቅም", Tikimt),
    ("ህዳር", Hidar),
    ("የህዳር", Hidar),
    ("የሕዳር", Hidar),
    ("ሕዳር", Hidar),
    ("ታህሳስ", Tahsas),
    ("የታህሳስ", Tahsas),
    ("ታህሳ", Tahsas),
    ("የታህሳ", Tahsas),
    ("ጥር", Tir),
    ("የጥር", Tir),
    ("የካቲት", Yekatit),
    ("የካት", Yekatit),
    ("መጋቢት", Megabit),
    ("የመጋቢት", Megabit),
    ("መጋቢ", Megabit),
    ("የመጋቢ", Megabit),
    ("ሚያዝያ", Miyazya),
    ("የሚያዝያ", Miyazya),
    ("ሚያዝ", Miyazya),
    ("የሚያዝ", Miyazya),
    ("ግንቦት", Ginbot),
    ("የግንቦት", Ginbot),
    ("ግንቦ", Ginbot),
    ("የግንቦ", Ginbot),
    ("ሰኔ", Sene),
    ("የሰኔ", Sene),
    ("ሐምሌ", Hamle),
    ("የሐምሌ", Hamle),
    ("ነሐሴ", Nehase),
    ("የነሐሴ", Nehase),
    ("ጳጉሜ", Pagume),
    ("የጳጉሜ", Pagume),
];

/// Gregorian → Ethiopian, static. Full names are checked before abbreviations.
const GREGORIAN_VARIANTS: &[(&str, EthiopianMonth)] = &[
    ("january", Tir),
    ("february", Yekatit),
    ("march", Megabit),
    ("april", Miyazya),
    ("may", Ginbot),
    ("june", Sene),
    ("july", Hamle),
    ("august", Nehase),
    ("september", Pagume),
    ("october", Meskerem),
    ("november", Tikimt),
    ("december", Hidar),
    ("jan", Tir),
    ("feb", Yekatit),
    ("mar", Megabit),
    ("apr", Miyazya),
    ("jun", Sene),
    ("jul", Hamle),
    ("aug", Nehase),
    ("sep", Pagume),
    ("oct", Meskerem),
    ("nov", Tikimt),
    ("dec", Hidar),
    // common user misspelling
    ("hedar", Hidar),
];

/// Resolve a free-text month token to an Ethiopian month.
///
/// Substring matching is deliberate: captions look like `"ቁ 1108 የታህሳስ 2018"`
/// or `"407 tir water"`, and OCR text embeds dates like `12-Jan-2025`.
pub fn convert_to_ethiopian_month(text: &str) -> Option<EthiopianMonth> {
    if text.trim().is_empty() {
        return None;
    }
    let lower = text.to_lowercase();

    if let Some(m) = EthiopianMonth::ALL
        .iter()
        .copied()
        .find(|m| lower.contains(&m.name().to_lowercase()))
    {
        tracing::debug!(month = %m, "month: ethiopian name");
        return Some(m);
    }

    if let Some((variant, m)) = AMHARIC_VARIANTS.iter().find(|(v, _)| text.contains(v)) {
        tracing::debug!(month = %m, variant, "month: amharic");
        return Some(*m);
    }

    if let Some((variant, m)) = GREGORIAN_VARIANTS.iter().find(|(v, _)| lower.contains(v)) {
        tracing::debug!(month = %m, variant, "month: gregorian");
        return Some(*m);
    }

    None
}
