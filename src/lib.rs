//! Byte-level byte pair encoding (BPE) training library and CLI.
//!
//! Training concatenates the raw bytes of every input text, assigns a base id to each distinct
//! byte (in ascending byte order), and then repeatedly merges the most frequent adjacent pair
//! into a new id until the target vocabulary size is reached.  The resulting [`Tokenizer`]
//! encodes text by replaying merges in the order they were learned and decodes ids back into
//! text, replacing invalid UTF-8 with U+FFFD.
//!
//! ```no_run
//! use tinybpe::{Trainer, TrainerConfig};
//!
//! # fn main() -> tinybpe::Result<()> {
//! let trainer_cfg = TrainerConfig::builder()
//!     .target_vocab_size(512)
//!     .show_progress(false)
//!     .build()?;
//! let artifacts = Trainer::new(trainer_cfg).train(&["some training text", "and more"])?;
//! let tokenizer = artifacts.tokenizer;
//! let ids = tokenizer.encode_batch(&["some text"]);
//! let texts = tokenizer.decode_batch(&ids)?;
//! assert_eq!(texts, vec!["some text".to_string()]);
//! tinybpe::serialization::save_model(&tokenizer, "model.json", true)?;
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `tinybpe = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod bytes;
pub mod config;
pub mod corpus;
pub mod error;
pub mod metrics;
pub mod model;
pub mod pairs;
pub mod serialization;
pub mod trainer;
pub mod vocab;

pub use config::{IngestConfig, TrainerBuilder, TrainerConfig};
pub use error::{BpeError, Result};
pub use metrics::{IterationMetrics, StopReason, TrainingMetrics};
pub use model::{Pair, TokenId, Tokenizer};
pub use trainer::{Trainer, TrainerArtifacts};
pub use vocab::{ByteLookup, ByteMap, MergeTable, Vocabulary};
