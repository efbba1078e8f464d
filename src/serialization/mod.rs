//! Helpers for persisting trained tokenizers and rendering them for inspection.

pub mod listing;
pub mod model_file;

pub use listing::{save_vocab_listing, vocab_listing, ModelSummary};
pub use model_file::{load_model, model_json, save_model, tokenizer_from_json};
