//! Full-text keyword predicate
//!
//! Keywords are normalized at construction (case-folded, trimmed) and carry
//! prefix semantics: the keyword `temp` matches any token starting with
//! `temp`. Stores back this predicate with an inverted index; the inline
//! matcher here exists for `test()` evaluation and for engines without one.

use crate::error::{CoreError, Result};
use std::collections::BTreeSet;

/// Keyword set with prefix-match semantics
///
/// A resource matches when any keyword is a prefix of any token of its name
/// or description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFilter {
    keywords: BTreeSet<String>,
}

impl TextFilter {
    /// Build from raw keywords, normalizing each
    ///
    /// Fails when no usable keyword remains after normalization.
    pub fn new<I, S>(keywords: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let normalized: BTreeSet<String> = keywords
            .into_iter()
            .map(|k| k.as_ref().trim().to_lowercase())
            .filter(|k| !k.is_empty())
            .collect();
        if normalized.is_empty() {
            return Err(CoreError::InvalidArgument(
                "text filter requires at least one non-empty keyword".to_string(),
            ));
        }
        Ok(TextFilter {
            keywords: normalized,
        })
    }

    /// The normalized keyword set
    pub fn keywords(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    /// Whether the given textual fields satisfy this predicate
    pub fn matches(&self, name: &str, description: Option<&str>) -> bool {
        let mut tokens = tokens_of(name);
        if let Some(desc) = description {
            tokens.extend(tokens_of(desc));
        }
        self.keywords
            .iter()
            .any(|kw| tokens.iter().any(|t| t.starts_with(kw.as_str())))
    }

    /// Pointwise AND of two keyword sets
    ///
    /// Prefix semantics make a shorter keyword the wider constraint, so the
    /// more specific keyword survives when one covers the other. No mutual
    /// coverage at all is a contradiction.
    pub fn intersect(&self, other: &Self) -> Result<Self> {
        let mut merged = BTreeSet::new();
        for k in &self.keywords {
            if other.keywords.iter().any(|o| k.starts_with(o.as_str())) {
                merged.insert(k.clone());
            }
        }
        for k in &other.keywords {
            if self.keywords.iter().any(|o| k.starts_with(o.as_str())) {
                merged.insert(k.clone());
            }
        }
        if merged.is_empty() {
            Err(CoreError::EmptyIntersection)
        } else {
            Ok(TextFilter { keywords: merged })
        }
    }
}

fn tokens_of(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_are_normalized() {
        let filter = TextFilter::new(["  Temperature ", "WIND"]).unwrap();
        let keywords: Vec<_> = filter.keywords().collect();
        assert_eq!(keywords, vec!["temperature", "wind"]);
    }

    #[test]
    fn test_rejects_empty_keyword_set() {
        assert!(TextFilter::new(Vec::<String>::new()).is_err());
        assert!(TextFilter::new(["  ", ""]).is_err());
    }

    #[test]
    fn test_prefix_matching() {
        let filter = TextFilter::new(["temp"]).unwrap();
        assert!(filter.matches("Outdoor Temperature Sensor", None));
        assert!(filter.matches("sensor", Some("measures temperature")));
        assert!(!filter.matches("Wind Gauge", Some("anemometer")));
    }

    #[test]
    fn test_any_keyword_suffices() {
        let filter = TextFilter::new(["wind", "humidity"]).unwrap();
        assert!(filter.matches("Wind Gauge", None));
        assert!(filter.matches("Hygrometer", Some("relative humidity")));
    }

    #[test]
    fn test_intersect_keeps_more_specific_keyword() {
        let wide = TextFilter::new(["temp"]).unwrap();
        let narrow = TextFilter::new(["temperature"]).unwrap();
        let merged = wide.intersect(&narrow).unwrap();
        let keywords: Vec<_> = merged.keywords().collect();
        assert_eq!(keywords, vec!["temperature"]);
    }

    #[test]
    fn test_intersect_disjoint_is_empty() {
        let a = TextFilter::new(["wind"]).unwrap();
        let b = TextFilter::new(["pressure"]).unwrap();
        assert!(matches!(a.intersect(&b), Err(CoreError::EmptyIntersection)));
    }

    #[test]
    fn test_intersect_commutative() {
        let a = TextFilter::new(["temp", "wind"]).unwrap();
        let b = TextFilter::new(["temperature"]).unwrap();
        assert_eq!(a.intersect(&b).unwrap(), b.intersect(&a).unwrap());
    }
}
