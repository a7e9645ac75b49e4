//! Full-text inverted index
//!
//! Token to key-set postings over an ordered map, so keyword prefixes resolve
//! to contiguous range scans. This is an acceleration index, not a source of
//! truth: the host store rebuilds or updates it alongside every mutation and
//! provides whatever persistence it has.

use obshub_core::filter::TextFilter;
use obshub_core::{LocalKey, Resource};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;

use crate::tokenizer::tokenize_unique;

/// Inverted index from normalized tokens to posting key sets
#[derive(Debug, Default)]
pub struct TextIndex {
    postings: RwLock<BTreeMap<String, BTreeSet<LocalKey>>>,
}

impl TextIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Index a resource's textual fields under `key`
    pub fn add<R: Resource>(&self, key: LocalKey, resource: &R) {
        let mut postings = self.postings.write();
        for token in index_tokens(resource) {
            postings.entry(token).or_default().insert(key);
        }
    }

    /// Remove a resource's postings for `key`
    ///
    /// The caller passes the same resource content that was indexed; empty
    /// posting lists are dropped to keep prefix scans tight.
    pub fn remove<R: Resource>(&self, key: LocalKey, resource: &R) {
        let mut postings = self.postings.write();
        for token in index_tokens(resource) {
            if let Some(keys) = postings.get_mut(&token) {
                keys.remove(&key);
                if keys.is_empty() {
                    postings.remove(&token);
                }
            }
        }
    }

    /// Re-index `key` after a resource content change
    pub fn update<R: Resource>(&self, key: LocalKey, old: &R, new: &R) {
        self.remove(key, old);
        self.add(key, new);
    }

    /// Keys whose postings match any keyword prefix, deduplicated, ascending
    pub fn select_keys(&self, filter: &TextFilter) -> Vec<LocalKey> {
        let postings = self.postings.read();
        let mut keys = BTreeSet::new();
        for keyword in filter.keywords() {
            for (_, posting) in prefix_range(&postings, keyword) {
                keys.extend(posting.iter().copied());
            }
        }
        keys.into_iter().collect()
    }

    /// Filter an existing key stream against the postings
    ///
    /// Used when the text predicate is combined with a predicate that is
    /// cheaper to evaluate first; preserves the input order.
    pub fn post_filter<'a, I>(
        &'a self,
        keys: I,
        filter: &'a TextFilter,
    ) -> impl Iterator<Item = LocalKey> + 'a
    where
        I: Iterator<Item = LocalKey> + 'a,
    {
        keys.filter(move |key| self.contains_key(filter, *key))
    }

    fn contains_key(&self, filter: &TextFilter, key: LocalKey) -> bool {
        let postings = self.postings.read();
        filter.keywords().any(|keyword| {
            prefix_range(&postings, keyword).any(|(_, posting)| posting.contains(&key))
        })
    }

    /// Number of distinct tokens currently indexed
    pub fn token_count(&self) -> usize {
        self.postings.read().len()
    }
}

/// Range over all tokens starting with `prefix`
fn prefix_range<'a>(
    postings: &'a BTreeMap<String, BTreeSet<LocalKey>>,
    prefix: &str,
) -> impl Iterator<Item = (&'a String, &'a BTreeSet<LocalKey>)> {
    let start = Bound::Included(prefix.to_string());
    let end = match next_prefix(prefix) {
        Some(upper) => Bound::Excluded(upper),
        None => Bound::Unbounded,
    };
    postings.range((start, end))
}

/// Smallest string greater than every string with the given prefix
fn next_prefix(prefix: &str) -> Option<String> {
    let mut bytes = prefix.as_bytes().to_vec();
    while let Some(last) = bytes.last_mut() {
        if *last < u8::MAX {
            *last += 1;
            return String::from_utf8(bytes).ok();
        }
        bytes.pop();
    }
    None
}

fn index_tokens<R: Resource>(resource: &R) -> Vec<String> {
    let mut text = resource.name().to_string();
    if let Some(desc) = resource.description() {
        text.push(' ');
        text.push_str(desc);
    }
    tokenize_unique(&text)
}
