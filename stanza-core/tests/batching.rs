// End-to-end pipeline tests: raw instances -> vocabulary -> indexing ->
// padding negotiation -> batched arrays

mod common;

use common::test_vocabulary;
use std::collections::BTreeMap;
use stanza_core::data::{LengthOverrides, SequenceRef, VocabCounter};
use stanza_core::dataset::Dataset;
use stanza_core::field::{Field, IndexField, LabelField, ListField, TagField};
use stanza_core::instance::Instance;
use stanza_core::vocab::Vocabulary;

fn qa_instance(tags: &[&str], label: &str, span_begin: usize) -> Instance {
    let mut fields = BTreeMap::new();
    fields.insert(
        "question".to_string(),
        Field::Tags(
            TagField::new(
                tags.iter().map(|t| t.to_string()).collect(),
                SequenceRef::tokens(tags.len()),
            )
            .unwrap(),
        ),
    );
    fields.insert(
        "span_begin".to_string(),
        Field::Index(IndexField::new(span_begin, SequenceRef::tokens(tags.len()))),
    );
    fields.insert("answer".to_string(), Field::Label(LabelField::new(label)));
    Instance::new(fields)
}

#[test]
fn test_full_pipeline_from_counts_to_arrays() {
    let mut dataset = Dataset::new(vec![
        qa_instance(&["O", "O", "B"], "entailment", 2),
        qa_instance(&["O", "B"], "neutral", 0),
    ]);

    let mut counter = VocabCounter::new();
    dataset.count_vocab_items(&mut counter).unwrap();
    assert_eq!(counter["tags"]["O"], 3);
    assert_eq!(counter["tags"]["B"], 2);
    assert_eq!(counter["labels"]["entailment"], 1);

    let vocab = Vocabulary::from_counter(&counter);
    dataset.index_instances(&vocab).unwrap();

    let arrays = dataset.as_arrays(None, true).unwrap();
    // O is the more frequent tag, so O -> 1 and B -> 2 (0 is the unknown
    // slot); tag rows are num_tags = 3 wide
    assert_eq!(arrays["question"][0].shape(), &[2, 3, 3]);
    assert_eq!(arrays["span_begin"][0].shape(), &[2, 3]);
    assert_eq!(arrays["span_begin"][0][[0, 2]], 1.0);
    assert_eq!(arrays["span_begin"][0][[1, 0]], 1.0);
    // labels: entailment and neutral get distinct ids, one-hot per instance
    let answers = &arrays["answer"][0];
    assert_eq!(answers.shape()[0], 2);
    assert_eq!(answers.sum(), 2.0);
}

#[test]
fn test_tag_rows_pad_with_sentinel_one_hots() {
    // A vocabulary that assigns O -> 0 (the unknown slot doubles as the
    // sentinel) and B -> 1.
    let mut vocab = Vocabulary::new();
    vocab.add_token("B", "tags");
    assert_eq!(vocab.get_token_index("O", "tags"), 0);
    assert_eq!(vocab.get_token_index("B", "tags"), 1);

    let mut fields = BTreeMap::new();
    fields.insert(
        "question".to_string(),
        Field::Tags(
            TagField::new(
                vec!["O".to_string(), "O".to_string(), "B".to_string()],
                SequenceRef::tokens(3),
            )
            .unwrap(),
        ),
    );
    let mut instance = Instance::new(fields);
    instance.index_fields(&vocab).unwrap();

    let mut lengths = instance.get_padding_lengths().unwrap();
    lengths.get_mut("question").unwrap().insert("num_tokens".to_string(), 4);
    let arrays = instance.pad(&lengths).unwrap();

    let question = &arrays["question"][0];
    assert_eq!(question.shape(), &[4, 2]);
    let expected = [[1.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 0.0]];
    for (row, expected_row) in expected.iter().enumerate() {
        for (col, value) in expected_row.iter().enumerate() {
            assert_eq!(question[[row, col]], *value);
        }
    }
}

#[test]
fn test_override_grows_arrays_past_data_maximum() {
    let mut dataset = Dataset::new(vec![
        qa_instance(&["O", "O"], "entailment", 1),
        qa_instance(&["O", "B", "O"], "neutral", 2),
    ]);
    dataset.index_instances(&test_vocabulary()).unwrap();

    let mut overrides = LengthOverrides::new();
    overrides
        .entry("question".to_string())
        .or_default()
        .insert("num_tokens".to_string(), 10);
    let arrays = dataset.as_arrays(Some(&overrides), false).unwrap();
    assert_eq!(arrays["question"][0].shape()[1], 10);
}

#[test]
fn test_override_supplies_vocabulary_sized_label_width() {
    // Batch only contains label id 0, but the model wants one-hots as wide
    // as the whole label vocabulary.
    let mut fields = BTreeMap::new();
    fields.insert("answer".to_string(), Field::Label(LabelField::from_id(0)));
    let dataset = Dataset::new(vec![Instance::new(fields)]);

    let mut overrides = LengthOverrides::new();
    overrides
        .entry("answer".to_string())
        .or_default()
        .insert("num_labels".to_string(), 4);
    let arrays = dataset.as_arrays(Some(&overrides), false).unwrap();
    assert_eq!(arrays["answer"][0].shape(), &[1, 4]);
}

#[test]
fn test_option_lists_batch_with_their_answer_pointer() {
    // Multiple-choice shape: a list of option labels plus an index field
    // anchored to the list's element count.
    let make = |ids: &[usize], answer: usize| {
        let options = ListField::new(
            ids.iter()
                .map(|&id| Field::Label(LabelField::from_id(id)))
                .collect(),
        )
        .unwrap();
        let mut fields = BTreeMap::new();
        fields.insert(
            "answer".to_string(),
            Field::Index(IndexField::new(answer, options.sequence_ref())),
        );
        fields.insert("options".to_string(), Field::List(options));
        Instance::new(fields)
    };

    let dataset = Dataset::new(vec![make(&[0, 1, 2], 1), make(&[1, 0], 0)]);
    let arrays = dataset.as_arrays(None, false).unwrap();
    // options: [batch, num_fields, num_labels]; second instance's third
    // option row is an empty-field encoding
    assert_eq!(arrays["options"][0].shape(), &[2, 3, 3]);
    assert_eq!(arrays["options"][0][[1, 2, 0]], 1.0);
    // answers: [batch, num_options]
    assert_eq!(arrays["answer"][0].shape(), &[2, 3]);
    assert_eq!(arrays["answer"][0][[0, 1]], 1.0);
    assert_eq!(arrays["answer"][0][[1, 0]], 1.0);
}

#[test]
fn test_truncate_and_sort_compose_with_batching() {
    let mut dataset = Dataset::new(vec![
        qa_instance(&["O", "O", "B", "O", "O"], "entailment", 0),
        qa_instance(&["O"], "neutral", 0),
        qa_instance(&["O", "B"], "contradiction", 1),
        qa_instance(&["O", "O", "B"], "neutral", 2),
        qa_instance(&["B"], "entailment", 0),
    ]);
    dataset.index_instances(&test_vocabulary()).unwrap();

    let dataset = dataset.truncate(3);
    assert_eq!(dataset.len(), 3);

    let mut dataset = dataset;
    dataset
        .sort_by_padding(&[("question", "num_tokens")], 0.0)
        .unwrap();
    let lengths: Vec<usize> = dataset
        .instances()
        .iter()
        .map(|i| i.get_padding_lengths().unwrap()["question"]["num_tokens"])
        .collect();
    assert_eq!(lengths, vec![1, 2, 5]);

    let arrays = dataset.as_arrays(None, false).unwrap();
    assert_eq!(arrays["question"][0].shape()[0], 3);
    assert_eq!(arrays["question"][0].shape()[1], 5);
}
