// Test utilities and generators for stanza property-based testing

#![allow(dead_code)]

use proptest::prelude::*;
use std::collections::BTreeMap;
use stanza_core::data::SequenceRef;
use stanza_core::field::{Field, IndexField, LabelField, ListField, TagField};
use stanza_core::instance::Instance;
use stanza_core::vocab::Vocabulary;

pub const TAG_SET: [&str; 3] = ["O", "B", "I"];

/// A vocabulary covering every tag in [`TAG_SET`] plus a few labels.
pub fn test_vocabulary() -> Vocabulary {
    let mut vocab = Vocabulary::new();
    for tag in TAG_SET {
        vocab.add_token(tag, "tags");
    }
    vocab.add_token("entailment", "labels");
    vocab.add_token("contradiction", "labels");
    vocab.add_token("neutral", "labels");
    vocab
}

/// Generate already-indexed label fields with small ids
pub fn arb_label_id_field() -> impl Strategy<Value = LabelField> {
    (0..8usize).prop_map(LabelField::from_id)
}

/// Generate raw (un-indexed) label fields
pub fn arb_raw_label_field() -> impl Strategy<Value = LabelField> {
    prop_oneof![
        Just("entailment"),
        Just("contradiction"),
        Just("neutral"),
    ]
    .prop_map(|label| LabelField::new(label))
}

/// Generate raw tag fields anchored to a matching-length token sequence
pub fn arb_tag_field(max_tokens: usize) -> impl Strategy<Value = TagField> {
    prop::collection::vec(prop::sample::select(TAG_SET.to_vec()), 1..=max_tokens).prop_map(
        |tags| {
            let length = tags.len();
            TagField::new(
                tags.into_iter().map(str::to_string).collect(),
                SequenceRef::tokens(length),
            )
            .expect("tag count matches its sequence length by construction")
        },
    )
}

/// Generate index fields pointing inside their sequence
pub fn arb_index_field(max_tokens: usize) -> impl Strategy<Value = IndexField> {
    (1..=max_tokens).prop_flat_map(|length| {
        (0..length).prop_map(move |position| {
            IndexField::new(position, SequenceRef::tokens(length))
        })
    })
}

/// Generate homogeneous lists of indexed label fields
pub fn arb_label_list_field(max_fields: usize) -> impl Strategy<Value = ListField> {
    prop::collection::vec(arb_label_id_field().prop_map(Field::Label), 1..=max_fields)
        .prop_map(|fields| ListField::new(fields).expect("labels are homogeneous"))
}

/// Generate un-indexed instances with a tag field, an index field over the
/// same sequence, and a label
pub fn arb_instance(max_tokens: usize) -> impl Strategy<Value = Instance> {
    (arb_tag_field(max_tokens), arb_raw_label_field()).prop_map(|(tags, label)| {
        let mut fields = BTreeMap::new();
        fields.insert("tags".to_string(), Field::Tags(tags));
        fields.insert("answer".to_string(), Field::Label(label));
        Instance::new(fields)
    })
}

/// An instance holding one tag field over `num_tokens` identical "O" tags
pub fn sized_instance(num_tokens: usize) -> Instance {
    let mut fields = BTreeMap::new();
    fields.insert(
        "text".to_string(),
        Field::Tags(
            TagField::new(
                vec!["O".to_string(); num_tokens],
                SequenceRef::tokens(num_tokens),
            )
            .expect("tag count matches its sequence length by construction"),
        ),
    );
    Instance::new(fields)
}
