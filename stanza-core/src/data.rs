// Core type definitions for stanza

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named length requirements for one field, e.g. `{"num_tokens": 13}`.
pub type PaddingLengths = BTreeMap<String, usize>;

/// Padding lengths for a whole instance, keyed by field name.
pub type InstancePaddingLengths = BTreeMap<String, PaddingLengths>;

/// Explicit padding-length overrides, keyed like [`InstancePaddingLengths`].
/// An entry takes precedence over the data-derived maximum for that key;
/// absent entries mean "use the maximum observed in the batch".
pub type LengthOverrides = BTreeMap<String, PaddingLengths>;

/// Token counts per namespace, accumulated by `count_vocab_items` and
/// consumed when building a [`crate::vocab::Vocabulary`].
pub type VocabCounter = BTreeMap<String, BTreeMap<String, usize>>;

/// Length handle onto the sequence a pointer or tag field is anchored to.
///
/// Referencing fields never own their sequence - the instance does. All they
/// need from it is its element count and the padding key that count is
/// reported under, so that is all this carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRef {
    key: String,
    length: usize,
}

impl SequenceRef {
    pub fn new(key: impl Into<String>, length: usize) -> Self {
        SequenceRef {
            key: key.into(),
            length,
        }
    }

    /// Reference onto a tokenized text sequence, reported as `num_tokens`.
    pub fn tokens(length: usize) -> Self {
        SequenceRef::new("num_tokens", length)
    }

    /// Reference onto a list of answer options, reported as `num_options`.
    pub fn options(length: usize) -> Self {
        SequenceRef::new("num_options", length)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn sequence_length(&self) -> usize {
        self.length
    }

    /// Same key, zero length. Used by `empty_field` implementations, where
    /// padding reads lengths from the supplied map rather than from here.
    pub fn empty(&self) -> Self {
        SequenceRef::new(self.key.clone(), 0)
    }
}
