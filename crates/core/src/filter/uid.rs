//! Unique-identifier patterns
//!
//! UIDs are externally-meaningful strings (sensor URNs). A pattern is either
//! a literal or a trailing-`*` prefix; wildcards anywhere else are rejected
//! so the registry can resolve patterns with ordered-map range scans.

use crate::error::{CoreError, Result};
use std::collections::BTreeSet;
use std::fmt;

/// Literal or trailing-`*` prefix pattern over UID strings
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UidPattern {
    text: String,
    prefix: bool,
}

impl UidPattern {
    /// Parse a pattern string
    ///
    /// `"urn:osh:sensor:ws1"` is a literal; `"urn:osh:sensor:*"` matches
    /// every UID starting with `"urn:osh:sensor:"`. A bare `"*"` or a
    /// wildcard in any other position is rejected.
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(CoreError::InvalidArgument(
                "uid pattern must not be empty".to_string(),
            ));
        }
        if let Some(stem) = raw.strip_suffix('*') {
            if stem.is_empty() {
                return Err(CoreError::InvalidArgument(
                    "uid pattern must not match everything".to_string(),
                ));
            }
            if stem.contains('*') {
                return Err(CoreError::InvalidArgument(format!(
                    "uid pattern '{raw}' may only carry a trailing wildcard"
                )));
            }
            Ok(UidPattern {
                text: stem.to_string(),
                prefix: true,
            })
        } else if raw.contains('*') {
            Err(CoreError::InvalidArgument(format!(
                "uid pattern '{raw}' may only carry a trailing wildcard"
            )))
        } else {
            Ok(UidPattern {
                text: raw.to_string(),
                prefix: false,
            })
        }
    }

    /// The literal text or prefix stem
    pub fn text(&self) -> &str {
        &self.text
    }

    /// True for prefix patterns
    pub fn is_prefix(&self) -> bool {
        self.prefix
    }

    /// Whether `uid` satisfies this pattern
    pub fn matches(&self, uid: &str) -> bool {
        if self.prefix {
            uid.starts_with(&self.text)
        } else {
            uid == self.text
        }
    }

    /// Whether every UID matched by `other` is also matched by `self`
    pub fn covers(&self, other: &UidPattern) -> bool {
        if self.prefix {
            other.text.starts_with(&self.text)
        } else {
            !other.prefix && other.text == self.text
        }
    }
}

impl fmt::Display for UidPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.prefix {
            write!(f, "{}*", self.text)
        } else {
            write!(f, "{}", self.text)
        }
    }
}

/// Intersect two pattern sets, keeping the more specific side
///
/// A pattern survives when the other set covers it. Two sets with no mutual
/// coverage are a contradiction.
pub(crate) fn intersect_patterns(
    a: &BTreeSet<UidPattern>,
    b: &BTreeSet<UidPattern>,
) -> Result<BTreeSet<UidPattern>> {
    let mut merged = BTreeSet::new();
    for p in a {
        if b.iter().any(|q| q.covers(p)) {
            merged.insert(p.clone());
        }
    }
    for q in b {
        if a.iter().any(|p| p.covers(q)) {
            merged.insert(q.clone());
        }
    }
    if merged.is_empty() {
        Err(CoreError::EmptyIntersection)
    } else {
        Ok(merged)
    }
}
