//! JSON model files holding the byte map and ordered merges of a trained tokenizer.
//!
//! The vocabulary is not stored: it is rebuilt on load by replaying the merges, which also
//! re-checks that every merge only references earlier ids.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BpeError, Result};
use crate::model::{Pair, Tokenizer};
use crate::vocab::ByteMap;

const FORMAT_TAG: &str = "tinybpe";
const FORMAT_VERSION: u32 = 1;
/// Longest token a loaded model may expand to.
const MAX_TOKEN_BYTES: u64 = 1 << 20;
/// Upper bound on the summed length of all tokens of a loaded model.
const MAX_VOCAB_BYTES: u64 = 1 << 28;

#[derive(Debug, Serialize, Deserialize)]
struct ModelFile {
    format: String,
    version: u32,
    /// `byte_values[i]` is the raw byte owning base id `i`.
    byte_values: Vec<u8>,
    /// `merges[i]` was merged into id `byte_values.len() + i`.
    merges: Vec<Pair>,
}

/// Serialises the tokenizer to a JSON string.
pub fn model_json(tokenizer: &Tokenizer, pretty: bool) -> Result<String> {
    let file = ModelFile {
        format: FORMAT_TAG.into(),
        version: FORMAT_VERSION,
        byte_values: tokenizer.byte_map().byte_values().to_vec(),
        merges: tokenizer.merges().pairs().to_vec(),
    };
    let json = if pretty {
        serde_json::to_string_pretty(&file)?
    } else {
        serde_json::to_string(&file)?
    };
    Ok(json)
}

/// Parses a JSON model produced by [`model_json`].
pub fn tokenizer_from_json(json: &str) -> Result<Tokenizer> {
    let file: ModelFile = serde_json::from_str(json)?;
    if file.format != FORMAT_TAG {
        return Err(BpeError::InvalidModel(format!(
            "unexpected format tag {:?}",
            file.format
        )));
    }
    if file.version != FORMAT_VERSION {
        return Err(BpeError::InvalidModel(format!(
            "unsupported model version {} (expected {FORMAT_VERSION})",
            file.version
        )));
    }
    check_expansion(file.byte_values.len(), &file.merges)?;
    let byte_map = ByteMap::from_byte_values(file.byte_values)?;
    Tokenizer::from_merges(byte_map, &file.merges)
}

/// Rejects merge lists whose tokens would grow past the loader's size limits.
///
/// Repeatedly merging a token with itself doubles its length, so a short file can otherwise
/// describe a vocabulary far larger than memory. Out-of-range ids are left to
/// [`Tokenizer::from_merges`].
fn check_expansion(base: usize, merges: &[Pair]) -> Result<()> {
    let mut lengths = vec![1u64; base];
    let mut total = base as u64;
    for &(left, right) in merges {
        let (Some(&l), Some(&r)) = (lengths.get(left as usize), lengths.get(right as usize))
        else {
            return Ok(());
        };
        let len = l.saturating_add(r);
        total = total.saturating_add(len);
        if len > MAX_TOKEN_BYTES || total > MAX_VOCAB_BYTES {
            return Err(BpeError::InvalidModel(format!(
                "merge ({left}, {right}) expands the vocabulary past the {MAX_TOKEN_BYTES} byte token limit or {MAX_VOCAB_BYTES} byte total"
            )));
        }
        lengths.push(len);
    }
    Ok(())
}

/// Persists the tokenizer as a JSON model file.
pub fn save_model<P: AsRef<Path>>(tokenizer: &Tokenizer, path: P, pretty: bool) -> Result<()> {
    let json = model_json(tokenizer, pretty)?;
    fs::write(path.as_ref(), json)
        .map_err(|err| BpeError::io(err, Some(path.as_ref().to_path_buf())))
}

/// Loads a JSON model file written by [`save_model`].
pub fn load_model<P: AsRef<Path>>(path: P) -> Result<Tokenizer> {
    let json = fs::read_to_string(path.as_ref())
        .map_err(|err| BpeError::io(err, Some(path.as_ref().to_path_buf())))?;
    tokenizer_from_json(&json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Trainer, TrainerConfig};
    use tempfile::tempdir;

    fn trained() -> Tokenizer {
        let cfg = TrainerConfig::builder()
            .target_vocab_size(40)
            .build()
            .expect("config");
        Trainer::new(cfg)
            .train(&["the quick brown fox", "the lazy dog"])
            .expect("training")
            .tokenizer
    }

    #[test]
    fn saved_model_reloads_identically() {
        let tokenizer = trained();
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("model.json");
        save_model(&tokenizer, &path, true).expect("save");
        let restored = load_model(&path).expect("load");
        assert_eq!(restored, tokenizer);
        assert_eq!(restored.encode("the fox"), tokenizer.encode("the fox"));
    }

    #[test]
    fn json_layout_is_stable() {
        let tokenizer = Tokenizer::from_merges(ByteMap::from_bytes(b"ab"), &[(0, 1)])
            .expect("tokenizer");
        let json = model_json(&tokenizer, false).expect("json");
        assert_eq!(
            json,
            r#"{"format":"tinybpe","version":1,"byte_values":[97,98],"merges":[[0,1]]}"#
        );
    }

    #[test]
    fn rejects_foreign_or_corrupt_models() {
        let wrong_tag = r#"{"format":"other","version":1,"byte_values":[97],"merges":[]}"#;
        assert!(matches!(
            tokenizer_from_json(wrong_tag),
            Err(BpeError::InvalidModel(_))
        ));
        let forward = r#"{"format":"tinybpe","version":1,"byte_values":[97,98],"merges":[[0,3]]}"#;
        assert!(matches!(
            tokenizer_from_json(forward),
            Err(BpeError::InvalidModel(_))
        ));
        let duplicate =
            r#"{"format":"tinybpe","version":1,"byte_values":[97,98],"merges":[[0,1],[0,1]]}"#;
        assert!(matches!(
            tokenizer_from_json(duplicate),
            Err(BpeError::InvalidModel(_))
        ));
        assert!(matches!(
            tokenizer_from_json("not json"),
            Err(BpeError::Serialization(_))
        ));
    }

    fn doubling_model(merges: u32) -> String {
        let merges: Vec<Pair> = (0..merges).map(|id| (id, id)).collect();
        serde_json::json!({
            "format": FORMAT_TAG,
            "version": FORMAT_VERSION,
            "byte_values": [97],
            "merges": merges,
        })
        .to_string()
    }

    #[test]
    fn rejects_models_with_runaway_token_growth() {
        let tokenizer = tokenizer_from_json(&doubling_model(12)).expect("small model loads");
        assert_eq!(tokenizer.vocab().get(12).map(<[u8]>::len), Some(1 << 12));

        let err = tokenizer_from_json(&doubling_model(40)).expect_err("oversized model");
        assert!(matches!(err, BpeError::InvalidModel(_)));
    }
}
