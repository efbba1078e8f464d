//! Trained tokenizer snapshot with the encode and decode procedures.

use rayon::prelude::*;

use crate::error::{BpeError, Result};
use crate::pairs::{merge_pair, pair_counts};
use crate::vocab::{ByteLookup, ByteMap, MergeTable, Vocabulary};

/// Token identifier used throughout the crate.
pub type TokenId = u32;
/// Merge pair encoded as `(left, right)` token identifiers.
pub type Pair = (TokenId, TokenId);

/// Immutable result of one training run: byte map, vocabulary and merge table.
///
/// Encoding and decoding only read these structures, so a `Tokenizer` can be shared across
/// threads without synchronisation.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenizer {
    byte_map: ByteMap,
    vocab: Vocabulary,
    merges: MergeTable,
}

impl Tokenizer {
    /// Assembles a tokenizer from its parts after checking that they describe the same model.
    pub fn from_parts(byte_map: ByteMap, vocab: Vocabulary, merges: MergeTable) -> Result<Self> {
        let base = byte_map.len();
        if merges.base() as usize != base {
            return Err(BpeError::InvalidModel(format!(
                "merge ids start at {} but the byte map holds {base} entries",
                merges.base()
            )));
        }
        if vocab.len() != base + merges.len() {
            return Err(BpeError::InvalidModel(format!(
                "vocabulary holds {} entries, expected {}",
                vocab.len(),
                base + merges.len()
            )));
        }
        for (id, &byte) in byte_map.byte_values().iter().enumerate() {
            if vocab.get(id as TokenId) != Some(&[byte][..]) {
                return Err(BpeError::InvalidModel(format!(
                    "base id {id} does not expand to byte 0x{byte:02X}"
                )));
            }
        }
        for ((left, right), id) in merges.iter() {
            let expected = match (vocab.get(left), vocab.get(right)) {
                (Some(l), Some(r)) => [l, r].concat(),
                _ => {
                    return Err(BpeError::InvalidModel(format!(
                        "merge ({left}, {right}) references a missing id"
                    )))
                }
            };
            if vocab.get(id) != Some(expected.as_slice()) {
                return Err(BpeError::InvalidModel(format!(
                    "id {id} does not expand to the concatenation of ({left}, {right})"
                )));
            }
        }
        Ok(Self {
            byte_map,
            vocab,
            merges,
        })
    }

    /// Rebuilds a tokenizer by replaying `pairs` in order on top of `byte_map`.
    pub fn from_merges(byte_map: ByteMap, pairs: &[Pair]) -> Result<Self> {
        let mut vocab = Vocabulary::from_byte_map(&byte_map);
        let mut merges = MergeTable::new(byte_map.len() as TokenId);
        for &pair in pairs {
            if pair.0 >= merges.next_id() || pair.1 >= merges.next_id() {
                return Err(BpeError::InvalidModel(format!(
                    "merge ({}, {}) references an id at or above {}",
                    pair.0,
                    pair.1,
                    merges.next_id()
                )));
            }
            let id = vocab.push_merge(pair)?;
            merges.push(pair, id)?;
        }
        Ok(Self {
            byte_map,
            vocab,
            merges,
        })
    }

    /// Returns the byte-to-base-id mapping.
    pub fn byte_map(&self) -> &ByteMap {
        &self.byte_map
    }

    /// Returns the id-to-bytes vocabulary.
    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Returns the ordered merge table.
    pub fn merges(&self) -> &MergeTable {
        &self.merges
    }

    /// Number of learned ids (base bytes plus merges).
    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Id emitted for bytes that never appeared during training.
    ///
    /// It sits one past the last learned id, so it never collides with a vocabulary entry
    /// and never takes part in a merge.
    #[must_use]
    pub fn unknown_id(&self) -> TokenId {
        self.vocab.len() as TokenId
    }

    /// Returns `true` when `id` is the fallback emitted for unseen bytes.
    #[must_use]
    pub fn is_unknown(&self, id: TokenId) -> bool {
        id == self.unknown_id()
    }

    /// Maps every byte of `text` to its base id without applying merges.
    #[must_use]
    pub fn byte_ids(&self, text: &str) -> Vec<TokenId> {
        let unknown = self.unknown_id();
        text.as_bytes()
            .iter()
            .map(|&byte| match self.byte_map.lookup(byte) {
                ByteLookup::Known(id) => id,
                ByteLookup::Unknown(_) => unknown,
            })
            .collect()
    }

    /// Encodes one text, applying merges in the order they were learned.
    #[must_use]
    pub fn encode(&self, text: &str) -> Vec<TokenId> {
        let mut ids = self.byte_ids(text);
        while ids.len() >= 2 {
            let Some((pair, id)) = self.earliest_merge(&ids) else {
                break;
            };
            ids = merge_pair(&ids, pair, id);
        }
        ids
    }

    /// Encodes every text independently, preserving input order.
    #[must_use]
    pub fn encode_batch<S>(&self, texts: &[S]) -> Vec<Vec<TokenId>>
    where
        S: AsRef<str> + Sync,
    {
        texts.par_iter().map(|text| self.encode(text.as_ref())).collect()
    }

    /// Expands ids into the concatenated raw bytes.
    pub fn decode_to_bytes(&self, ids: &[TokenId]) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(ids.len());
        for &id in ids {
            let token = self.vocab.get(id).ok_or(BpeError::UnknownId {
                id,
                vocab_size: self.vocab.len(),
            })?;
            bytes.extend_from_slice(token);
        }
        Ok(bytes)
    }

    /// Decodes ids into text, replacing invalid UTF-8 with U+FFFD.
    pub fn decode(&self, ids: &[TokenId]) -> Result<String> {
        let bytes = self.decode_to_bytes(ids)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Decodes every id sequence independently, preserving input order.
    pub fn decode_batch<T>(&self, sequences: &[T]) -> Result<Vec<String>>
    where
        T: AsRef<[TokenId]> + Sync,
    {
        sequences
            .par_iter()
            .map(|ids| self.decode(ids.as_ref()))
            .collect()
    }

    /// Finds the pair present in `ids` whose merge was learned first.
    fn earliest_merge(&self, ids: &[TokenId]) -> Option<(Pair, TokenId)> {
        pair_counts(ids)
            .into_keys()
            .filter_map(|pair| self.merges.get(&pair).map(|id| (pair, id)))
            .min_by_key(|&(_, id)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn abc_tokenizer() -> Tokenizer {
        // a=0 b=1 c=2, (a, b) -> 3, (3, c) -> 4
        let byte_map = ByteMap::from_bytes(b"abc");
        Tokenizer::from_merges(byte_map, &[(0, 1), (3, 2)]).expect("valid merges")
    }

    #[test]
    fn encode_applies_merges_in_learned_order() {
        let tokenizer = abc_tokenizer();
        assert_eq!(tokenizer.encode("abcab"), vec![4, 3]);
        assert_eq!(tokenizer.encode("cba"), vec![2, 1, 0]);
        assert_eq!(tokenizer.encode(""), Vec::<TokenId>::new());
    }

    #[test]
    fn unseen_bytes_map_to_fallback_id() {
        let tokenizer = abc_tokenizer();
        let ids = tokenizer.encode("abzab");
        assert_eq!(ids, vec![3, 5, 3]);
        assert!(tokenizer.is_unknown(ids[1]));
        assert!(!tokenizer.is_unknown(ids[0]));
    }

    #[test]
    fn decode_round_trips_known_text() {
        let tokenizer = abc_tokenizer();
        let ids = tokenizer.encode("cabcab");
        assert_eq!(tokenizer.decode(&ids).expect("decode"), "cabcab");
    }

    #[test]
    fn decode_rejects_unknown_ids() {
        let tokenizer = abc_tokenizer();
        let err = tokenizer.decode(&[0, 42]).expect_err("id 42 is not in the vocab");
        assert!(matches!(
            err,
            BpeError::UnknownId { id: 42, vocab_size: 5 }
        ));
        let fallback = tokenizer.unknown_id();
        assert!(tokenizer.decode(&[fallback]).is_err());
    }

    #[test]
    fn decode_replaces_invalid_utf8() {
        let byte_map = ByteMap::from_bytes(&[0xE2, 0x82, 0xAC, b'x']);
        let tokenizer = Tokenizer::from_merges(byte_map, &[]).expect("tokenizer");
        // Ids follow ascending byte order: 'x'=0, 0x82=1, 0xAC=2, 0xE2=3.
        assert_eq!(tokenizer.decode(&[3, 1, 2]).expect("decode"), "\u{20AC}");
        assert_eq!(tokenizer.decode(&[3, 0]).expect("decode"), "\u{FFFD}x");
    }

    #[test]
    fn batches_are_order_preserving() {
        let tokenizer = abc_tokenizer();
        let encoded = tokenizer.encode_batch(&["ab", "cab", "abc"]);
        assert_eq!(encoded, vec![vec![3], vec![2, 3], vec![4]]);
        let decoded = tokenizer.decode_batch(&encoded).expect("decode");
        assert_eq!(decoded, vec!["ab", "cab", "abc"]);
    }

    #[test]
    fn from_parts_rejects_inconsistent_vocab() {
        let byte_map = ByteMap::from_bytes(b"ab");
        let vocab = Vocabulary::from_byte_map(&byte_map);
        let mut merges = MergeTable::new(2);
        merges.push((0, 1), 2).expect("merge");
        let err = Tokenizer::from_parts(byte_map, vocab, merges).expect_err("missing entry");
        assert!(matches!(err, BpeError::InvalidModel(_)));
    }

    #[test]
    fn from_merges_rejects_forward_references() {
        let byte_map = ByteMap::from_bytes(b"ab");
        let err = Tokenizer::from_merges(byte_map, &[(0, 2)]).expect_err("forward reference");
        assert!(matches!(err, BpeError::InvalidModel(_)));
    }
}
