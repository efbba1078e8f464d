//! Core training loop that grows a byte-level vocabulary by greedy pair merging.

use std::path::Path;
use std::time::Instant;
use std::{fmt, mem};

use log::{info, warn};

use crate::bytes::render_token;
use crate::config::{IngestConfig, TrainerBuilder, TrainerConfig};
use crate::corpus::load_text_corpus;
use crate::error::{BpeError, Result};
use crate::metrics::{IterationMetrics, StopReason, TrainingMetrics};
use crate::model::{TokenId, Tokenizer};
use crate::pairs::{merge_pair, most_frequent_pair, pair_counts};
use crate::vocab::{ByteLookup, ByteMap, MergeTable, Vocabulary};

/// High-level façade configuring and executing BPE training runs.
#[derive(Debug, Clone)]
pub struct Trainer {
    cfg: TrainerConfig,
}

/// Artifacts returned after a training session completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct TrainerArtifacts {
    /// Trained tokenizer.
    pub tokenizer: Tokenizer,
    /// Detailed metrics captured during training.
    pub metrics: TrainingMetrics,
}

impl Trainer {
    /// Creates a new trainer for the supplied configuration.
    #[must_use]
    pub fn new(cfg: TrainerConfig) -> Self {
        Self { cfg }
    }

    /// Returns a [`TrainerBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> TrainerBuilder {
        TrainerConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TrainerConfig {
        &self.cfg
    }

    /// Trains a tokenizer from text files discovered according to [`IngestConfig`].
    pub fn train_from_paths<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        ingest: &IngestConfig,
    ) -> Result<TrainerArtifacts> {
        let texts = load_text_corpus(inputs, ingest)?;
        self.train(&texts)
    }

    /// Trains a tokenizer on the concatenated bytes of `texts`.
    ///
    /// Texts are joined in order into a single sequence, so pairs spanning the boundary
    /// between two texts are counted like any other pair.
    pub fn train<S: AsRef<str>>(&self, texts: &[S]) -> Result<TrainerArtifacts> {
        self.cfg.validate()?;

        let total_bytes: usize = texts.iter().map(|text| text.as_ref().len()).sum();
        let mut corpus = Vec::with_capacity(total_bytes);
        for text in texts {
            corpus.extend_from_slice(text.as_ref().as_bytes());
        }

        let byte_map = ByteMap::from_bytes(&corpus);
        let mut ids = corpus
            .iter()
            .map(|&byte| match byte_map.lookup(byte) {
                ByteLookup::Known(id) => Ok(id),
                ByteLookup::Unknown(byte) => Err(BpeError::Internal(format!(
                    "corpus byte 0x{byte:02X} missing from byte map"
                ))),
            })
            .collect::<Result<Vec<TokenId>>>()?;
        drop(corpus);

        let distinct_bytes = byte_map.len();
        let target = self.cfg.target_vocab_size;
        let requested_merges = target.saturating_sub(distinct_bytes);
        let mut metrics = TrainingMetrics::new(distinct_bytes, requested_merges);

        if target < distinct_bytes {
            if self.cfg.strict_vocab_size {
                return Err(BpeError::InsufficientVocabSize {
                    requested: target,
                    distinct_bytes,
                });
            }
            warn!(
                "vocab_size {target} is smaller than the {distinct_bytes} distinct bytes in the corpus; no merges will be performed"
            );
            metrics.stop_reason = StopReason::InsufficientVocabSize;
        }

        info!(
            "training BPE with {distinct_bytes} unique bytes and {requested_merges} merges over {total_bytes} bytes"
        );

        let mut vocab = Vocabulary::from_byte_map(&byte_map);
        let mut merges = MergeTable::new(distinct_bytes as TokenId);
        let training_start = Instant::now();

        for merge_index in 0..requested_merges {
            let counts = pair_counts(&ids);
            let Some((pair, frequency)) = most_frequent_pair(&counts) else {
                metrics.stop_reason = StopReason::NoPairsRemaining;
                break;
            };
            drop(counts);

            let new_id = vocab.push_merge(pair)?;
            ids = merge_pair(&mem::take(&mut ids), pair, new_id);
            merges.push(pair, new_id)?;

            if self.cfg.show_progress {
                let rendered = vocab.get(new_id).map(render_token).unwrap_or_default();
                info!(
                    "merge {}/{}: ({}, {}) -> {} ({}) had {} occurrences",
                    merge_index + 1,
                    requested_merges,
                    pair.0,
                    pair.1,
                    new_id,
                    rendered,
                    frequency
                );
            }

            metrics.iterations.push(IterationMetrics {
                iteration: merge_index + 1,
                pair,
                new_id,
                frequency,
                sequence_len: ids.len(),
                elapsed_total: training_start.elapsed(),
            });
        }

        metrics.total_duration = training_start.elapsed();
        info!(
            "completed {} merges in {:.2?}; vocab size {}",
            merges.len(),
            metrics.total_duration,
            vocab.len()
        );

        let tokenizer = Tokenizer::from_parts(byte_map, vocab, merges)?;
        Ok(TrainerArtifacts { tokenizer, metrics })
    }
}

impl fmt::Display for TrainerArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "BPE tokenizer with vocab size {}",
            self.tokenizer.vocab_size()
        )?;
        writeln!(f, "Merges: {}", self.tokenizer.merges().len())?;
        writeln!(f, "Stop reason: {:?}", self.metrics.stop_reason)?;
        writeln!(f, "Total duration: {:?}", self.metrics.total_duration)?;
        Ok(())
    }
}
