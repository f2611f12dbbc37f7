//! Small text helpers shared by the parsers. OCR output is mixed
//! Latin/Ge'ez, so every slice here is taken on char boundaries.

/// Slice of `text` from `before` chars ahead of byte offset `at` to `after`
/// chars past it.
pub fn char_window(text: &str, at: usize, before: usize, after: usize) -> &str {
    let at = floor_boundary(text, at.min(text.len()));
    let start = text[..at]
        .char_indices()
        .rev()
        .nth(before.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);
    let start = if before == 0 { at } else { start };
    let end = text[at..]
        .char_indices()
        .nth(after)
        .map(|(i, _)| at + i)
        .unwrap_or(text.len());
    &text[start..end]
}

fn floor_boundary(text: &str, mut idx: usize) -> usize {
    while idx > 0 && !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

/// Collapse any run of whitespace (including newlines) to one space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn has_letter_and_digit(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit()) && s.chars().any(|c| c.is_alphabetic())
}

pub fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

pub fn is_all_letters(s: &str) -> bool {
    !s.is_empty() && s.chars().all(char::is_alphabetic)
}

/// OCR engines emit en/em dashes and minus signs where receipts print `-`.
pub fn normalize_dashes(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => '-',
            other => other,
        })
        .collect()
}
