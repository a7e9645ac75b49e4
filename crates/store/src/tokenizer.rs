//! Tokenizer feeding the full-text index
//!
//! Normalization rules:
//! - Lowercase
//! - Split on non-alphanumeric characters
//! - Drop tokens shorter than 2 characters
//! - Drop tokens starting with a digit (serial numbers dominate sensor
//!   metadata and would bloat the postings without helping queries)
//! - Drop English stopwords

use once_cell::sync::Lazy;
use rustc_hash::FxHashSet;

static STOPWORDS: Lazy<FxHashSet<&'static str>> = Lazy::new(|| {
    [
        "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "in", "is", "it", "its",
        "of", "on", "or", "the", "this", "to", "was", "were", "with",
    ]
    .into_iter()
    .collect()
});

/// Tokenize text into indexable terms
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 2)
        .filter(|t| !t.starts_with(|c: char| c.is_ascii_digit()))
        .filter(|t| !STOPWORDS.contains(t))
        .map(String::from)
        .collect()
}

/// Tokenize and deduplicate, preserving first-seen order
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = FxHashSet::default();
    tokenize(text)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize("Weather Station, Rooftop!");
        assert_eq!(tokens, vec!["weather", "station", "rooftop"]);
    }

    #[test]
    fn test_tokenize_filters_short() {
        let tokens = tokenize("a 5m wind mast");
        assert_eq!(tokens, vec!["wind", "mast"]);
    }

    #[test]
    fn test_tokenize_strips_numeric_leading() {
        let tokens = tokenize("sensor 12345 042b temp99");
        assert_eq!(tokens, vec!["sensor", "temp99"]);
    }

    #[test]
    fn test_tokenize_drops_stopwords() {
        let tokens = tokenize("temperature of the river at dawn");
        assert_eq!(tokens, vec!["temperature", "river", "dawn"]);
    }

    #[test]
    fn test_tokenize_empty() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("...---...").is_empty());
    }

    #[test]
    fn test_tokenize_unique_preserves_order() {
        let tokens = tokenize_unique("wind speed wind gust WIND");
        assert_eq!(tokens, vec!["wind", "speed", "gust"]);
    }
}
