//! Vocabulary structures produced by training: the byte map, token byte strings, and the
//! ordered merge table.

use std::convert::TryFrom;

use rustc_hash::FxHashMap;

use crate::error::{BpeError, Result};
use crate::model::{Pair, TokenId};

/// Outcome of mapping a raw byte through a [`ByteMap`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ByteLookup {
    /// The byte was observed during training and owns this base id.
    Known(TokenId),
    /// The byte never appeared in the training corpus.
    Unknown(u8),
}

/// Bijection between the distinct bytes seen during training and the dense id range `[0, N)`.
///
/// Ids are assigned in ascending byte order.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ByteMap {
    byte_values: Vec<u8>,
    ids: [Option<TokenId>; 256],
}

impl ByteMap {
    /// Builds the map from every byte in `bytes`.
    #[must_use]
    pub fn from_bytes<'a, I>(bytes: I) -> Self
    where
        I: IntoIterator<Item = &'a u8>,
    {
        let mut seen = [false; 256];
        for &byte in bytes {
            seen[byte as usize] = true;
        }
        let byte_values = (0u8..=u8::MAX)
            .filter(|&byte| seen[byte as usize])
            .collect::<Vec<_>>();
        Self::from_sorted_values(byte_values)
    }

    /// Rebuilds a map from an explicit id-ordered byte list, rejecting duplicates.
    pub fn from_byte_values(byte_values: Vec<u8>) -> Result<Self> {
        let mut ids = [None; 256];
        for (id, &byte) in byte_values.iter().enumerate() {
            if ids[byte as usize].is_some() {
                return Err(BpeError::InvalidModel(format!(
                    "byte 0x{byte:02X} is mapped more than once"
                )));
            }
            ids[byte as usize] = Some(id as TokenId);
        }
        Ok(Self { byte_values, ids })
    }

    fn from_sorted_values(byte_values: Vec<u8>) -> Self {
        let mut ids = [None; 256];
        for (id, &byte) in byte_values.iter().enumerate() {
            ids[byte as usize] = Some(id as TokenId);
        }
        Self { byte_values, ids }
    }

    /// Maps a raw byte to its base id.
    #[inline]
    #[must_use]
    pub fn lookup(&self, byte: u8) -> ByteLookup {
        match self.ids[byte as usize] {
            Some(id) => ByteLookup::Known(id),
            None => ByteLookup::Unknown(byte),
        }
    }

    /// Returns the raw byte owning base id `id`.
    #[must_use]
    pub fn byte(&self, id: TokenId) -> Option<u8> {
        self.byte_values.get(id as usize).copied()
    }

    /// Returns the raw bytes in id order.
    #[must_use]
    pub fn byte_values(&self) -> &[u8] {
        &self.byte_values
    }

    /// Number of distinct bytes (and base ids).
    #[must_use]
    pub fn len(&self) -> usize {
        self.byte_values.len()
    }

    /// Returns `true` when no byte has been mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.byte_values.is_empty()
    }
}

/// Mapping from token id to the byte string it expands to.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Vocabulary {
    token_bytes: Vec<Vec<u8>>,
}

impl Vocabulary {
    /// Seeds one single-byte entry per base id.
    #[must_use]
    pub fn from_byte_map(byte_map: &ByteMap) -> Self {
        let token_bytes = byte_map.byte_values().iter().map(|&b| vec![b]).collect();
        Self { token_bytes }
    }

    /// Appends the concatenation of `pair`'s byte strings and returns its new id.
    pub fn push_merge(&mut self, pair: Pair) -> Result<TokenId> {
        let new_id = TokenId::try_from(self.token_bytes.len())
            .map_err(|_| BpeError::Internal("vocabulary size exceeded u32::MAX".into()))?;
        let (Some(left), Some(right)) = (self.get(pair.0), self.get(pair.1)) else {
            return Err(BpeError::InvalidModel(format!(
                "merge ({}, {}) references an id at or above {new_id}",
                pair.0, pair.1
            )));
        };
        let mut merged = Vec::with_capacity(left.len() + right.len());
        merged.extend_from_slice(left);
        merged.extend_from_slice(right);
        self.token_bytes.push(merged);
        Ok(new_id)
    }

    /// Returns the byte string for `id`, if present.
    #[inline]
    #[must_use]
    pub fn get(&self, id: TokenId) -> Option<&[u8]> {
        self.token_bytes.get(id as usize).map(Vec::as_slice)
    }

    /// Returns all byte strings in id order.
    #[must_use]
    pub fn token_bytes(&self) -> &[Vec<u8>] {
        &self.token_bytes
    }

    /// Number of ids in the vocabulary.
    #[must_use]
    pub fn len(&self) -> usize {
        self.token_bytes.len()
    }

    /// Returns `true` for an empty vocabulary.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.token_bytes.is_empty()
    }
}

/// Ordered merge rules `(left, right) -> id`.
///
/// The i-th merge always receives id `base + i`, so comparing ids is the same as comparing
/// training order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct MergeTable {
    base: TokenId,
    order: Vec<Pair>,
    ranks: FxHashMap<Pair, TokenId>,
}

impl MergeTable {
    /// Creates an empty table whose first merge will receive id `base`.
    #[must_use]
    pub fn new(base: TokenId) -> Self {
        Self {
            base,
            order: Vec::new(),
            ranks: FxHashMap::default(),
        }
    }

    /// Id the next recorded merge must use.
    #[must_use]
    pub fn next_id(&self) -> TokenId {
        self.base + self.order.len() as TokenId
    }

    /// Records `pair -> id`; `id` must equal [`MergeTable::next_id`] and the pair must be new.
    pub fn push(&mut self, pair: Pair, id: TokenId) -> Result<()> {
        let expected = self.next_id();
        if id != expected {
            return Err(BpeError::InvalidModel(format!(
                "merge ({}, {}) assigned id {id}, expected {expected}",
                pair.0, pair.1
            )));
        }
        if pair.0 >= id || pair.1 >= id {
            return Err(BpeError::InvalidModel(format!(
                "merge ({}, {}) -> {id} references a later id",
                pair.0, pair.1
            )));
        }
        if self.ranks.contains_key(&pair) {
            return Err(BpeError::InvalidModel(format!(
                "merge ({}, {}) appears more than once",
                pair.0, pair.1
            )));
        }
        self.ranks.insert(pair, id);
        self.order.push(pair);
        Ok(())
    }

    /// Returns the id learned for `pair`.
    #[inline]
    #[must_use]
    pub fn get(&self, pair: &Pair) -> Option<TokenId> {
        self.ranks.get(pair).copied()
    }

    /// Iterates merges in training order as `(pair, new_id)`.
    pub fn iter(&self) -> impl Iterator<Item = (Pair, TokenId)> + '_ {
        self.order
            .iter()
            .enumerate()
            .map(move |(idx, &pair)| (pair, self.base + idx as TokenId))
    }

    /// Returns the merged pairs in training order.
    #[must_use]
    pub fn pairs(&self) -> &[Pair] {
        &self.order
    }

    /// Id assigned to the first merge.
    #[must_use]
    pub fn base(&self) -> TokenId {
        self.base
    }

    /// Number of recorded merges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Returns `true` when no merge was learned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
