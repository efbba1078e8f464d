//! Error handling utilities shared across the crate.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::TokenId;

/// Convenient result type used throughout the crate.
pub type Result<T, E = BpeError> = std::result::Result<T, E>;

/// Domain-specific error describing failures during configuration, IO, training, or decoding.
#[derive(Debug, Error)]
pub enum BpeError {
    /// Training configuration or input failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// The requested vocabulary is smaller than the byte alphabet of the corpus.
    ///
    /// Only raised when [`crate::TrainerConfig::strict_vocab_size`] is enabled; otherwise
    /// training succeeds with zero merges.
    #[error(
        "vocab_size {requested} is smaller than the {distinct_bytes} distinct bytes in the corpus"
    )]
    InsufficientVocabSize {
        /// Vocabulary size requested by the caller.
        requested: usize,
        /// Number of distinct byte values observed during training.
        distinct_bytes: usize,
    },
    /// A token id handed to the decoder has no vocabulary entry.
    #[error("unknown token id {id} (vocabulary holds {vocab_size} entries)")]
    UnknownId {
        /// Offending token id.
        id: TokenId,
        /// Number of entries in the vocabulary.
        vocab_size: usize,
    },
    /// A persisted model violates the vocabulary or merge table invariants.
    #[error("invalid model: {0}")]
    InvalidModel(String),
    /// Filesystem IO error with optional context path.
    #[error("io error while processing {path:?}: {source}")]
    Io {
        /// Underlying IO error returned by the standard library.
        source: std::io::Error,
        /// Target path associated with the IO failure if available.
        path: Option<PathBuf>,
    },
    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// Catch-all variant for invariants that should not occur.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for BpeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl BpeError {
    /// Helper constructor that attaches an optional path when wrapping IO errors.
    pub fn io(source: std::io::Error, path: Option<PathBuf>) -> Self {
        Self::Io { source, path }
    }
}
