//! Ordered "first plausible match wins" strategy chains.

/// A named heuristic over a compiled parser.
pub type Strategy<P> = (&'static str, fn(&P, &str) -> Option<String>);

/// Try each strategy in order; return the first non-empty result.
pub fn first_match<P>(field: &'static str, parser: &P, text: &str, strategies: &[Strategy<P>]) -> Option<String> {
    for (name, run) in strategies {
        if let Some(value) = run(parser, text).filter(|v| !v.trim().is_empty()) {
            tracing::debug!(field, strategy = name, value = %value, "extractor matched");
            return Some(value);
        }
    }
    tracing::debug!(field, "no strategy matched");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Dummy;

    fn never(_: &Dummy, _: &str) -> Option<String> {
        None
    }

    fn blank(_: &Dummy, _: &str) -> Option<String> {
        Some("  ".into())
    }

    fn echo(_: &Dummy, text: &str) -> Option<String> {
        Some(text.to_string())
    }

    fn shout(_: &Dummy, text: &str) -> Option<String> {
        Some(text.to_uppercase())
    }

    #[test]
    fn test_first_non_empty_wins() {
        let chain: [Strategy<Dummy>; 4] = [("never", never), ("blank", blank), ("echo", echo), ("shout", shout)];
        assert_eq!(first_match("t", &Dummy, "abc", &chain).as_deref(), Some("abc"));
    }

    #[test]
    fn test_exhausted_chain_is_none() {
        let chain: [Strategy<Dummy>; 2] = [("never", never), ("blank", blank)];
        assert_eq!(first_match("t", &Dummy, "abc", &chain), None);
    }
}
