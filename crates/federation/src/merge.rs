//! k-way merge over pre-sorted entry streams
//!
//! [`MergeSorted`] combines N ascending `Result` iterators into one ascending
//! stream. A binary heap holds at most one buffered element per source, so
//! the combinator pulls exactly as far as the caller does; a downstream
//! `take(limit)` reads `limit` elements plus at most one per source, never
//! the full inputs.
//!
//! Each source must already be sorted by the merge key. A source that emits a
//! decreasing key is a misbehaving backend and turns the stream into an
//! [`CoreError::IllegalState`] error; silently re-sorting would hide the bug
//! and cost the laziness guarantee.

use obshub_core::{CoreError, Result};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Buffered head element of one source
///
/// Ordered by `(key, source)` so the heap stays a total order even when two
/// sources carry equal keys; ties break toward the lower source index, which
/// makes merge output deterministic.
struct Slot<T, K> {
    key: K,
    source: usize,
    item: T,
}

impl<T, K: Ord> PartialEq for Slot<T, K> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.source == other.source
    }
}

impl<T, K: Ord> Eq for Slot<T, K> {}

impl<T, K: Ord> PartialOrd for Slot<T, K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, K: Ord> Ord for Slot<T, K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.source.cmp(&other.source))
    }
}

/// Merge N ascending fallible iterators into one ascending stream
///
/// `key_of` projects the merge key out of each element. The stream is fused:
/// after the first `Err` or after exhaustion it yields `None` forever.
pub struct MergeSorted<I, T, K, F>
where
    I: Iterator<Item = Result<T>>,
    F: Fn(&T) -> K,
    K: Ord + Clone,
{
    sources: Vec<I>,
    key_of: F,
    heap: BinaryHeap<Reverse<Slot<T, K>>>,
    last_keys: Vec<Option<K>>,
    pending_error: Option<CoreError>,
    primed: bool,
    finished: bool,
}

impl<I, T, K, F> MergeSorted<I, T, K, F>
where
    I: Iterator<Item = Result<T>>,
    F: Fn(&T) -> K,
    K: Ord + Clone,
{
    /// Build a merge over `sources`, each sorted ascending by `key_of`
    pub fn new(sources: Vec<I>, key_of: F) -> Self {
        let count = sources.len();
        MergeSorted {
            sources,
            key_of,
            heap: BinaryHeap::with_capacity(count),
            last_keys: vec![None; count],
            pending_error: None,
            primed: false,
            finished: false,
        }
    }

    /// Pull the next element of `source` into the heap
    ///
    /// Exhaustion is fine; an element error or an order violation is recorded
    /// as the pending error ending the stream.
    fn refill(&mut self, source: usize) {
        match self.sources[source].next() {
            None => {}
            Some(Err(err)) => {
                self.pending_error = Some(err);
            }
            Some(Ok(item)) => {
                let key = (self.key_of)(&item);
                if let Some(last) = &self.last_keys[source] {
                    if key < *last {
                        self.pending_error = Some(CoreError::IllegalState(format!(
                            "merge source {source} produced decreasing order"
                        )));
                        return;
                    }
                }
                self.last_keys[source] = Some(key.clone());
                self.heap.push(Reverse(Slot { key, source, item }));
            }
        }
    }
}

impl<I, T, K, F> Iterator for MergeSorted<I, T, K, F>
where
    I: Iterator<Item = Result<T>>,
    F: Fn(&T) -> K,
    K: Ord + Clone,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        if self.finished {
            return None;
        }
        if !self.primed {
            self.primed = true;
            for source in 0..self.sources.len() {
                self.refill(source);
                if self.pending_error.is_some() {
                    break;
                }
            }
        }
        if let Some(err) = self.pending_error.take() {
            self.finished = true;
            return Some(Err(err));
        }
        match self.heap.pop() {
            None => {
                self.finished = true;
                None
            }
            Some(Reverse(slot)) => {
                // refill before emitting so a follow-up error surfaces on the
                // next pull, after the in-order element
                self.refill(slot.source);
                Some(Ok(slot.item))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::sync::Arc;

    fn source(values: &[u64]) -> std::vec::IntoIter<Result<u64>> {
        values
            .iter()
            .map(|v| Ok(*v))
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn merge(inputs: &[&[u64]]) -> MergeSorted<std::vec::IntoIter<Result<u64>>, u64, u64, fn(&u64) -> u64> {
        MergeSorted::new(inputs.iter().map(|v| source(v)).collect(), |v: &u64| *v)
    }

    #[test]
    fn test_interleaves_sorted_sources() {
        let merged: Vec<u64> = merge(&[&[1, 4, 7], &[2, 5], &[3, 6, 8]])
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(merged, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_no_sources_is_empty() {
        assert_eq!(merge(&[]).count(), 0);
    }

    #[test]
    fn test_empty_sources_are_skipped() {
        let merged: Vec<u64> = merge(&[&[], &[2, 3], &[]]).map(|e| e.unwrap()).collect();
        assert_eq!(merged, vec![2, 3]);
    }

    #[test]
    fn test_equal_keys_break_ties_by_source() {
        let merged: Vec<(usize, u64)> = MergeSorted::new(
            vec![
                source(&[10, 20]).map(|r| r.map(|v| (0usize, v))).collect::<Vec<_>>().into_iter(),
                source(&[10, 20]).map(|r| r.map(|v| (1usize, v))).collect::<Vec<_>>().into_iter(),
            ],
            |e: &(usize, u64)| e.1,
        )
        .map(|e| e.unwrap())
        .collect();
        assert_eq!(merged, vec![(0, 10), (1, 10), (0, 20), (1, 20)]);
    }

    #[test]
    fn test_decreasing_source_is_illegal_state() {
        let results: Vec<Result<u64>> = merge(&[&[1, 5, 3], &[2]]).collect();
        let error_pos = results.iter().position(|r| r.is_err()).unwrap();
        assert!(matches!(
            &results[error_pos],
            Err(CoreError::IllegalState(msg)) if msg.contains("decreasing")
        ));
        // the stream is fused after the error
        assert_eq!(results.len(), error_pos + 1);
    }

    #[test]
    fn test_source_error_propagates_then_fuses() {
        let bad = vec![
            Ok(1u64),
            Err(CoreError::Decode("torn record".to_string())),
            Ok(9),
        ];
        let mut merged = MergeSorted::new(
            vec![bad.into_iter(), source(&[2]).collect::<Vec<_>>().into_iter()],
            |v: &u64| *v,
        );
        assert_eq!(merged.next().unwrap().unwrap(), 1);
        assert_eq!(merged.next().unwrap().unwrap(), 2);
        assert!(matches!(merged.next(), Some(Err(CoreError::Decode(_)))));
        assert!(merged.next().is_none());
        assert!(merged.next().is_none());
    }

    #[test]
    fn test_take_pulls_lazily() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let sources: Vec<_> = (0..3)
            .map(|s| {
                let pulled = Arc::clone(&pulled);
                (0..100u64).map(move |i| {
                    pulled.fetch_add(1, AtomicOrdering::SeqCst);
                    Ok(i * 3 + s)
                })
            })
            .collect();
        let merged: Vec<u64> = MergeSorted::new(sources, |v: &u64| *v)
            .take(5)
            .map(|e| e.unwrap())
            .collect();
        assert_eq!(merged, vec![0, 1, 2, 3, 4]);
        // limit elements plus at most one buffered per source
        assert!(pulled.load(AtomicOrdering::SeqCst) <= 5 + 3);
    }

    #[test]
    fn test_randomized_against_sort() {
        let mut rng = StdRng::seed_from_u64(0x0b5);
        for _ in 0..50 {
            let source_count = rng.gen_range(1..6);
            let mut inputs: Vec<Vec<u64>> = Vec::new();
            let mut expected: Vec<u64> = Vec::new();
            for _ in 0..source_count {
                let len = rng.gen_range(0..20);
                let mut values: Vec<u64> = (0..len).map(|_| rng.gen_range(0..1000)).collect();
                values.sort_unstable();
                expected.extend_from_slice(&values);
                inputs.push(values);
            }
            expected.sort_unstable();

            let merged: Vec<u64> = MergeSorted::new(
                inputs
                    .iter()
                    .map(|v| v.iter().map(|x| Ok(*x)).collect::<Vec<_>>().into_iter())
                    .collect(),
                |v: &u64| *v,
            )
            .map(|e| e.unwrap())
            .collect();
            assert_eq!(merged, expected);
        }
    }

    proptest! {
        #[test]
        fn prop_output_is_sorted_multiset_union(
            inputs in prop::collection::vec(
                prop::collection::vec(0u64..1000, 0..30),
                0..5,
            )
        ) {
            let sorted_inputs: Vec<Vec<u64>> = inputs
                .into_iter()
                .map(|mut v| {
                    v.sort_unstable();
                    v
                })
                .collect();
            let mut expected: Vec<u64> = sorted_inputs.iter().flatten().copied().collect();
            expected.sort_unstable();

            let merged: Vec<u64> = MergeSorted::new(
                sorted_inputs
                    .iter()
                    .map(|v| v.iter().map(|x| Ok(*x)).collect::<Vec<_>>().into_iter())
                    .collect(),
                |v: &u64| *v,
            )
            .map(|e| e.unwrap())
            .collect();
            prop_assert_eq!(merged, expected);
        }

        #[test]
        fn prop_limit_truncates_sorted_prefix(
            inputs in prop::collection::vec(
                prop::collection::vec(0u64..1000, 0..30),
                1..5,
            ),
            limit in 0usize..20,
        ) {
            let sorted_inputs: Vec<Vec<u64>> = inputs
                .into_iter()
                .map(|mut v| {
                    v.sort_unstable();
                    v
                })
                .collect();
            let mut expected: Vec<u64> = sorted_inputs.iter().flatten().copied().collect();
            expected.sort_unstable();
            expected.truncate(limit);

            let merged: Vec<u64> = MergeSorted::new(
                sorted_inputs
                    .iter()
                    .map(|v| v.iter().map(|x| Ok(*x)).collect::<Vec<_>>().into_iter())
                    .collect(),
                |v: &u64| *v,
            )
            .take(limit)
            .map(|e| e.unwrap())
            .collect();
            prop_assert_eq!(merged, expected);
        }
    }
}
