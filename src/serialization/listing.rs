//! Human-readable views of a trained tokenizer.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::bytes::{is_complete_utf8, render_token};
use crate::error::{BpeError, Result};
use crate::model::{TokenId, Tokenizer};

/// Headline numbers describing a trained tokenizer.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ModelSummary {
    /// Number of base ids (distinct training bytes).
    pub distinct_bytes: usize,
    /// Number of learned merges.
    pub merges: usize,
    /// Total number of ids with a vocabulary entry.
    pub vocab_size: usize,
    /// Id emitted for bytes unseen during training.
    pub unknown_id: TokenId,
    /// Tokens whose bytes are not complete UTF-8 on their own.
    pub partial_utf8_tokens: usize,
    /// Length in bytes of the longest token.
    pub longest_token_bytes: usize,
}

impl ModelSummary {
    /// Computes the summary for `tokenizer`.
    #[must_use]
    pub fn from_tokenizer(tokenizer: &Tokenizer) -> Self {
        let tokens = tokenizer.vocab().token_bytes();
        Self {
            distinct_bytes: tokenizer.byte_map().len(),
            merges: tokenizer.merges().len(),
            vocab_size: tokenizer.vocab_size(),
            unknown_id: tokenizer.unknown_id(),
            partial_utf8_tokens: tokens.iter().filter(|t| !is_complete_utf8(t)).count(),
            longest_token_bytes: tokens.iter().map(Vec::len).max().unwrap_or(0),
        }
    }
}

/// Renders one line per id: `[byte] id` for base ids and `[left][right] -> [merged] id` for
/// merges, in id order.
#[must_use]
pub fn vocab_listing(tokenizer: &Tokenizer) -> String {
    let vocab = tokenizer.vocab();
    let render = |id: TokenId| vocab.get(id).map(render_token).unwrap_or_default();
    let mut listing = String::new();
    for id in 0..tokenizer.byte_map().len() as TokenId {
        let _ = writeln!(listing, "[{}] {id}", render(id));
    }
    for ((left, right), id) in tokenizer.merges().iter() {
        let _ = writeln!(
            listing,
            "[{}][{}] -> [{}] {id}",
            render(left),
            render(right),
            render(id)
        );
    }
    listing
}

/// Writes [`vocab_listing`] to `path`.
pub fn save_vocab_listing<P: AsRef<Path>>(tokenizer: &Tokenizer, path: P) -> Result<()> {
    fs::write(path.as_ref(), vocab_listing(tokenizer))
        .map_err(|err| BpeError::io(err, Some(path.as_ref().to_path_buf())))
}
