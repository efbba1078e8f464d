//! Adjacent-pair statistics and pair replacement over token id sequences.

use std::cmp::Ordering;

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::model::{Pair, TokenId};

/// Sequences shorter than this are counted on the calling thread.
const PARALLEL_COUNT_THRESHOLD: usize = 1 << 16;

/// Counts every adjacent pair `(ids[i], ids[i + 1])` in the sequence.
///
/// Each position contributes exactly one pair, so `a, a, a` yields `(a, a) -> 2`.
/// Empty and single-element sequences produce an empty map.
#[must_use]
pub fn pair_counts(ids: &[TokenId]) -> FxHashMap<Pair, usize> {
    if ids.len() < 2 {
        return FxHashMap::default();
    }
    if ids.len() < PARALLEL_COUNT_THRESHOLD {
        let mut counts = FxHashMap::default();
        for window in ids.windows(2) {
            *counts.entry((window[0], window[1])).or_insert(0) += 1;
        }
        return counts;
    }
    ids.par_windows(2)
        .fold(FxHashMap::default, |mut local, window| {
            *local.entry((window[0], window[1])).or_insert(0) += 1;
            local
        })
        .reduce(FxHashMap::default, |mut acc, local| {
            for (pair, count) in local {
                *acc.entry(pair).or_insert(0) += count;
            }
            acc
        })
}

/// Candidate ordering used to pick the merge at each training step.
///
/// Higher frequency wins; equal frequencies prefer the lexicographically smaller pair.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct PairScore {
    pub(crate) frequency: usize,
    pub(crate) pair: Pair,
}

impl PairScore {
    pub(crate) fn new(pair: Pair, frequency: usize) -> Self {
        Self { frequency, pair }
    }
}

impl Ord for PairScore {
    fn cmp(&self, other: &Self) -> Ordering {
        self.frequency
            .cmp(&other.frequency)
            .then_with(|| other.pair.cmp(&self.pair))
    }
}

impl PartialOrd for PairScore {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Returns the most frequent pair and its count, or `None` for an empty map.
///
/// Ties are broken towards the numerically smallest `(left, right)` pair, so the result
/// does not depend on hash map iteration order.
#[must_use]
pub fn most_frequent_pair(counts: &FxHashMap<Pair, usize>) -> Option<(Pair, usize)> {
    counts
        .iter()
        .map(|(&pair, &frequency)| PairScore::new(pair, frequency))
        .max()
        .map(|score| (score.pair, score.frequency))
}

/// Replaces every left-to-right, non-overlapping occurrence of `pair` with `replacement`.
///
/// Scanning resumes after a replaced pair, so `a, b, b` with pair `(a, b)` yields
/// `r, b`. Sequences shorter than two elements are returned unchanged.
#[must_use]
pub fn merge_pair(ids: &[TokenId], pair: Pair, replacement: TokenId) -> Vec<TokenId> {
    if ids.len() < 2 {
        return ids.to_vec();
    }
    let mut merged = Vec::with_capacity(ids.len());
    let mut read = 0usize;
    while read < ids.len() {
        if read + 1 < ids.len() && ids[read] == pair.0 && ids[read + 1] == pair.1 {
            merged.push(replacement);
            read += 2;
        } else {
            merged.push(ids[read]);
            read += 1;
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_overlapping_positions() {
        let counts = pair_counts(&[1, 1, 1, 2]);
        assert_eq!(counts.get(&(1, 1)), Some(&2));
        assert_eq!(counts.get(&(1, 2)), Some(&1));
        assert_eq!(counts.len(), 2);
    }

    #[test]
    fn short_sequences_have_no_pairs() {
        assert!(pair_counts(&[]).is_empty());
        assert!(pair_counts(&[7]).is_empty());
    }

    #[test]
    fn parallel_counts_match_sequential() {
        let ids: Vec<TokenId> = (0..PARALLEL_COUNT_THRESHOLD as u32 * 2)
            .map(|i| i % 7)
            .collect();
        let parallel = pair_counts(&ids);
        let mut sequential = FxHashMap::default();
        for window in ids.windows(2) {
            *sequential.entry((window[0], window[1])).or_insert(0usize) += 1;
        }
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn most_frequent_prefers_smallest_pair_on_ties() {
        let mut counts = FxHashMap::default();
        counts.insert((4, 0), 2);
        counts.insert((0, 1), 2);
        counts.insert((1, 3), 1);
        assert_eq!(most_frequent_pair(&counts), Some(((0, 1), 2)));
        assert_eq!(most_frequent_pair(&FxHashMap::default()), None);
    }

    #[test]
    fn merge_consumes_greedily_left_to_right() {
        assert_eq!(merge_pair(&[1, 2, 2], (1, 2), 9), vec![9, 2]);
        assert_eq!(merge_pair(&[1, 1, 1], (1, 1), 9), vec![9, 1]);
        assert_eq!(merge_pair(&[1, 2, 3, 1, 2], (1, 2), 9), vec![9, 3, 9]);
    }

    #[test]
    fn merge_leaves_short_sequences_untouched() {
        assert_eq!(merge_pair(&[], (1, 2), 9), Vec::<TokenId>::new());
        assert_eq!(merge_pair(&[1], (1, 2), 9), vec![1]);
    }
}
