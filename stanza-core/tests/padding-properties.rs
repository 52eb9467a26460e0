// Property tests for padding and batching invariants
//
// One-hot outputs always contain exactly one 1, padded shapes always match
// the negotiated lengths, and batch maxima dominate every instance.

mod common;

use common::{arb_instance, arb_label_id_field, arb_label_list_field, sized_instance, test_vocabulary};
use proptest::prelude::*;
use stanza_core::dataset::Dataset;
use stanza_core::field::Field;

proptest! {
    #[test]
    fn one_hot_labels_sum_to_one(field in arb_label_id_field(), extra in 0..5usize) {
        let id = field.label_id().unwrap();
        let field = Field::Label(field);
        let mut lengths = field.get_padding_lengths().unwrap();
        let width = lengths["num_labels"] + extra;
        lengths.insert("num_labels".to_string(), width);

        let arrays = field.pad(&lengths).unwrap();
        prop_assert_eq!(arrays.len(), 1);
        prop_assert_eq!(arrays[0].shape(), &[width]);
        prop_assert_eq!(arrays[0].sum(), 1.0);
        prop_assert_eq!(arrays[0][[id]], 1.0);
    }

    #[test]
    fn list_fields_pad_their_element_count(list in arb_label_list_field(6), extra in 0..4usize) {
        let element_count = list.sequence_length();
        let mut lengths = Field::List(list.clone()).get_padding_lengths().unwrap();
        prop_assert_eq!(lengths["num_fields"], element_count);

        let padded_count = element_count + extra;
        lengths.insert("num_fields".to_string(), padded_count);
        let arrays = Field::List(list).pad(&lengths).unwrap();
        prop_assert_eq!(arrays[0].shape()[0], padded_count);
        // padding rows are empty-field encodings: one-hot at id 0
        for row in element_count..padded_count {
            prop_assert_eq!(arrays[0][[row, 0]], 1.0);
        }
    }

    #[test]
    fn dataset_lengths_dominate_instance_lengths(sizes in prop::collection::vec(1..12usize, 1..8)) {
        let mut dataset = Dataset::new(sizes.iter().map(|&n| sized_instance(n)).collect());
        dataset.index_instances(&test_vocabulary()).unwrap();

        let batch_lengths = dataset.padding_lengths().unwrap();
        let max_tokens = *sizes.iter().max().unwrap();
        prop_assert_eq!(batch_lengths["text"]["num_tokens"], max_tokens);

        for instance in dataset.instances() {
            let lengths = instance.get_padding_lengths().unwrap();
            for (field_name, field_lengths) in &lengths {
                for (key, &value) in field_lengths {
                    prop_assert!(batch_lengths[field_name][key] >= value);
                }
            }
        }
    }

    #[test]
    fn batches_have_batch_size_leading_dimension(
        instances in prop::collection::vec(arb_instance(6), 1..6)
    ) {
        let batch_size = instances.len();
        let mut dataset = Dataset::new(instances);
        dataset.index_instances(&test_vocabulary()).unwrap();

        let arrays = dataset.as_arrays(None, false).unwrap();
        for field_arrays in arrays.values() {
            for array in field_arrays {
                prop_assert_eq!(array.shape()[0], batch_size);
            }
        }
    }

    #[test]
    fn zero_noise_sort_orders_by_length(sizes in prop::collection::vec(1..12usize, 1..8)) {
        let mut dataset = Dataset::new(sizes.iter().map(|&n| sized_instance(n)).collect());
        dataset.index_instances(&test_vocabulary()).unwrap();
        dataset.sort_by_padding(&[("text", "num_tokens")], 0.0).unwrap();

        let sorted_lengths: Vec<usize> = dataset
            .instances()
            .iter()
            .map(|instance| instance.get_padding_lengths().unwrap()["text"]["num_tokens"])
            .collect();
        let mut expected = sizes.clone();
        expected.sort_unstable();
        prop_assert_eq!(sorted_lengths, expected);
    }
}
