//! Metrics describing the evolution of the training process.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::model::{Pair, TokenId};

/// Reason a training run terminated.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StopReason {
    /// The requested number of merges was performed.
    TargetVocabReached,
    /// The working sequence ran out of adjacent pairs before the target was reached.
    NoPairsRemaining,
    /// The target vocabulary did not exceed the corpus byte alphabet; no merge was attempted.
    InsufficientVocabSize,
}

/// Metrics captured for each merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IterationMetrics {
    /// Sequential merge number (1-indexed).
    pub iteration: usize,
    /// Pair selected for this merge.
    pub pair: Pair,
    /// Id minted for the pair.
    pub new_id: TokenId,
    /// Occurrences of the pair before the merge.
    pub frequency: usize,
    /// Length of the working sequence after the merge.
    pub sequence_len: usize,
    /// Total time elapsed since training started.
    pub elapsed_total: Duration,
}

/// Aggregate metrics produced by a training session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrainingMetrics {
    /// Number of distinct bytes in the corpus.
    pub distinct_bytes: usize,
    /// Merges requested by the target vocabulary size.
    pub requested_merges: usize,
    /// Per-merge snapshots accrued during training.
    pub iterations: Vec<IterationMetrics>,
    /// Total duration of the training session.
    pub total_duration: Duration,
    /// Reason training terminated.
    pub stop_reason: StopReason,
}

impl TrainingMetrics {
    /// Creates an empty metrics container sized for `requested_merges`.
    #[must_use]
    pub fn new(distinct_bytes: usize, requested_merges: usize) -> Self {
        Self {
            distinct_bytes,
            requested_merges,
            iterations: Vec::with_capacity(requested_merges.min(16_384)),
            total_duration: Duration::ZERO,
            stop_reason: StopReason::TargetVocabReached,
        }
    }

    /// Number of merges actually performed.
    #[must_use]
    pub fn merges_performed(&self) -> usize {
        self.iterations.len()
    }

    /// Ratio of corpus bytes to final sequence length, if any merge happened.
    #[must_use]
    pub fn compression_ratio(&self, corpus_bytes: usize) -> Option<f64> {
        let last = self.iterations.last()?;
        if last.sequence_len == 0 {
            return None;
        }
        Some(corpus_bytes as f64 / last.sequence_len as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_ratio_uses_final_sequence_length() {
        let mut metrics = TrainingMetrics::new(4, 2);
        assert_eq!(metrics.compression_ratio(10), None);
        metrics.iterations.push(IterationMetrics {
            iteration: 1,
            pair: (0, 0),
            new_id: 4,
            frequency: 4,
            sequence_len: 5,
            elapsed_total: Duration::ZERO,
        });
        assert_eq!(metrics.merges_performed(), 1);
        assert_eq!(metrics.compression_ratio(10), Some(2.0));
    }
}
