// Namespaced string <-> id mappings

use crate::data::VocabCounter;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel token occupying id 0 in every namespace. Lookups of tokens that
/// were never added resolve to this id.
pub const UNKNOWN_TOKEN: &str = "@@UNKNOWN@@";

/// A bidirectional token <-> id mapping, partitioned into namespaces so that
/// words, tags, and labels each get their own dense id space.
///
/// Ids are contiguous from 0 within a namespace and stable once the
/// vocabulary is built. Id 0 is always the unknown-token fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vocabulary {
    namespaces: BTreeMap<String, Namespace>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Namespace {
    token_to_index: BTreeMap<String, usize>,
    index_to_token: Vec<String>,
}

impl Namespace {
    fn new() -> Self {
        let mut namespace = Namespace {
            token_to_index: BTreeMap::new(),
            index_to_token: Vec::new(),
        };
        namespace.add(UNKNOWN_TOKEN);
        namespace
    }

    fn add(&mut self, token: &str) -> usize {
        if let Some(&index) = self.token_to_index.get(token) {
            return index;
        }
        let index = self.index_to_token.len();
        self.index_to_token.push(token.to_string());
        self.token_to_index.insert(token.to_string(), index);
        index
    }
}

impl Vocabulary {
    pub fn new() -> Self {
        Vocabulary::default()
    }

    /// Builds a vocabulary from accumulated token counts, assigning ids in
    /// descending count order (ties broken by token string, so construction
    /// is deterministic for a given counter).
    pub fn from_counter(counter: &VocabCounter) -> Self {
        Vocabulary::from_counter_with_min_count(counter, 1)
    }

    /// Like [`Vocabulary::from_counter`], but tokens seen fewer than
    /// `min_count` times are left out and will resolve to the unknown id.
    pub fn from_counter_with_min_count(counter: &VocabCounter, min_count: usize) -> Self {
        let mut vocab = Vocabulary::new();
        for (namespace, counts) in counter {
            let mut tokens: Vec<(&String, &usize)> = counts
                .iter()
                .filter(|(_, &count)| count >= min_count)
                .collect();
            tokens.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
            for (token, _) in tokens {
                vocab.add_token(token, namespace);
            }
        }
        vocab
    }

    /// Adds `token` to `namespace`, returning its id. Re-adding an existing
    /// token returns the id it already has.
    pub fn add_token(&mut self, token: &str, namespace: &str) -> usize {
        self.namespaces
            .entry(namespace.to_string())
            .or_insert_with(Namespace::new)
            .add(token)
    }

    /// The id for `token` in `namespace`. Unknown tokens (and unknown
    /// namespaces) resolve to id 0, the unknown-token slot.
    pub fn get_token_index(&self, token: &str, namespace: &str) -> usize {
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.token_to_index.get(token).copied())
            .unwrap_or(0)
    }

    /// The token stored at `index` in `namespace`, if any.
    pub fn get_token_from_index(&self, index: usize, namespace: &str) -> Option<&str> {
        self.namespaces
            .get(namespace)
            .and_then(|ns| ns.index_to_token.get(index))
            .map(String::as_str)
    }

    /// Number of ids assigned in `namespace`, including the unknown slot.
    /// A namespace nothing was added to has size 0.
    pub fn get_vocab_size(&self, namespace: &str) -> usize {
        self.namespaces
            .get(namespace)
            .map(|ns| ns.index_to_token.len())
            .unwrap_or(0)
    }

    /// Namespaces with at least one token, in deterministic order.
    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }
}
