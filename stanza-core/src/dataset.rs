// An ordered collection of instances with batch-level operations
//
// The dataset layer orchestrates the whole pipeline: indexing every
// instance, negotiating padding lengths across the batch, length-based
// sorting, truncation, and final array assembly.

use crate::data::{InstancePaddingLengths, LengthOverrides, PaddingLengths, VocabCounter};
use crate::error::DatasetError;
use crate::instance::Instance;
use crate::vocab::Vocabulary;
use log::{debug, info};
use ndarray::{ArrayD, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Batched arrays per field name: one or more arrays whose leading
/// dimension is the batch size. The sole handoff surface to the model layer.
pub type FieldArrays = BTreeMap<String, Vec<ArrayD<f64>>>;

/// An ordered collection of [`Instance`]s. Order matters: sorting and
/// truncation are order-sensitive operations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    instances: Vec<Instance>,
}

impl Dataset {
    pub fn new(instances: Vec<Instance>) -> Self {
        Dataset { instances }
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Keeps at most `max_instances` instances. When the dataset already
    /// fits, it is returned unchanged without copying; otherwise the
    /// deterministic prefix of the current order survives.
    pub fn truncate(self, max_instances: usize) -> Dataset {
        if self.instances.len() <= max_instances {
            return self;
        }
        let mut instances = self.instances;
        instances.truncate(max_instances);
        Dataset::new(instances)
    }

    /// Increments `counter` for every vocabulary item in every instance.
    pub fn count_vocab_items(&self, counter: &mut VocabCounter) -> Result<(), DatasetError> {
        for (position, instance) in self.instances.iter().enumerate() {
            instance
                .count_vocab_items(counter)
                .map_err(|source| DatasetError::Instance { position, source })?;
        }
        Ok(())
    }

    /// Indexes every instance against `vocab`, in order, in place.
    pub fn index_instances(&mut self, vocab: &Vocabulary) -> Result<(), DatasetError> {
        for (position, instance) in self.instances.iter_mut().enumerate() {
            instance
                .index_fields(vocab)
                .map_err(|source| DatasetError::Instance { position, source })?;
        }
        Ok(())
    }

    /// Sorts instances ascending by their padding lengths under the given
    /// `(field_name, padding_key)` pairs, earlier pairs taking precedence
    /// and original order breaking final ties (the sort is stable).
    ///
    /// `padding_noise` perturbs each length by up to that fraction of its
    /// value before comparing, which keeps length-sorted batching from
    /// always producing identical batches.
    pub fn sort_by_padding(
        &mut self,
        sorting_keys: &[(&str, &str)],
        padding_noise: f64,
    ) -> Result<(), DatasetError> {
        self.sort_by_padding_with_rng(sorting_keys, padding_noise, &mut rand::thread_rng())
    }

    /// [`Dataset::sort_by_padding`] with a caller-supplied RNG, so noisy
    /// sorts can be reproduced from a seed.
    pub fn sort_by_padding_with_rng<R: Rng>(
        &mut self,
        sorting_keys: &[(&str, &str)],
        padding_noise: f64,
        rng: &mut R,
    ) -> Result<(), DatasetError> {
        let mut sort_values: Vec<Vec<f64>> = Vec::with_capacity(self.instances.len());
        for (position, instance) in self.instances.iter().enumerate() {
            let lengths = instance
                .get_padding_lengths()
                .map_err(|source| DatasetError::Instance { position, source })?;
            let mut values = Vec::with_capacity(sorting_keys.len());
            for &(field_name, padding_key) in sorting_keys {
                let length = lengths
                    .get(field_name)
                    .and_then(|field_lengths| field_lengths.get(padding_key))
                    .copied()
                    .ok_or_else(|| DatasetError::UnknownSortKey {
                        field: field_name.to_string(),
                        key: padding_key.to_string(),
                    })?;
                values.push(add_noise(length as f64, padding_noise, rng));
            }
            sort_values.push(values);
        }

        let mut order: Vec<usize> = (0..self.instances.len()).collect();
        order.sort_by(|&a, &b| compare_sort_values(&sort_values[a], &sort_values[b]));

        let mut slots: Vec<Option<Instance>> =
            std::mem::take(&mut self.instances).into_iter().map(Some).collect();
        self.instances = order
            .into_iter()
            .filter_map(|index| slots[index].take())
            .collect();
        Ok(())
    }

    /// Batch-wide padding lengths: per field name and padding key, the
    /// maximum across all instances. Instances missing a key count as 0;
    /// an empty dataset yields an empty map.
    pub fn padding_lengths(&self) -> Result<InstancePaddingLengths, DatasetError> {
        let mut all_field_lengths: BTreeMap<String, Vec<&PaddingLengths>> = BTreeMap::new();
        let mut instance_lengths = Vec::with_capacity(self.instances.len());
        for (position, instance) in self.instances.iter().enumerate() {
            instance_lengths.push(
                instance
                    .get_padding_lengths()
                    .map_err(|source| DatasetError::Instance { position, source })?,
            );
        }
        for lengths in &instance_lengths {
            for (field_name, field_lengths) in lengths {
                all_field_lengths
                    .entry(field_name.clone())
                    .or_default()
                    .push(field_lengths);
            }
        }

        let mut padding_lengths = InstancePaddingLengths::new();
        for (field_name, field_lengths) in all_field_lengths {
            let mut merged = PaddingLengths::new();
            for key in field_lengths[0].keys() {
                let max = field_lengths
                    .iter()
                    .map(|lengths| lengths.get(key).copied().unwrap_or(0))
                    .max()
                    .unwrap_or(0);
                merged.insert(key.clone(), max);
            }
            padding_lengths.insert(field_name, merged);
        }
        Ok(padding_lengths)
    }

    /// Pads every instance to consistent lengths and combines the results
    /// into batched arrays per field name, leading dimension = batch size.
    ///
    /// `overrides` entries take precedence over the data-derived maxima, so
    /// a caller can cap sequence lengths or supply a vocabulary-sized width
    /// for one-hot fields. `verbose` turns on info-level progress logging;
    /// the quiet path still logs at debug level.
    pub fn as_arrays(
        &self,
        overrides: Option<&LengthOverrides>,
        verbose: bool,
    ) -> Result<FieldArrays, DatasetError> {
        if verbose {
            info!(
                "Padding dataset of size {} with overrides {:?}",
                self.instances.len(),
                overrides
            );
        }
        let instance_padding_lengths = self.padding_lengths()?;
        if verbose {
            info!("Instance max lengths: {:?}", instance_padding_lengths);
        }

        let mut lengths_to_use = instance_padding_lengths;
        if let Some(overrides) = overrides {
            for (field_name, field_lengths) in &mut lengths_to_use {
                if let Some(field_overrides) = overrides.get(field_name) {
                    for (key, length) in field_lengths.iter_mut() {
                        if let Some(&override_length) = field_overrides.get(key) {
                            *length = override_length;
                        }
                    }
                }
            }
        }

        if verbose {
            info!("Now actually padding instances to lengths: {:?}", lengths_to_use);
        } else {
            debug!("Padding instances to lengths: {:?}", lengths_to_use);
        }

        let mut field_arrays: BTreeMap<String, Vec<Vec<ArrayD<f64>>>> = BTreeMap::new();
        for (position, instance) in self.instances.iter().enumerate() {
            let padded = instance
                .pad(&lengths_to_use)
                .map_err(|source| DatasetError::Instance { position, source })?;
            for (field_name, arrays) in padded {
                field_arrays.entry(field_name).or_default().push(arrays);
            }
        }

        // Combine across the batch: position i of every instance's output
        // for a field stacks into one batched array.
        let mut batched = FieldArrays::new();
        for (field_name, per_instance) in field_arrays {
            let arity = per_instance[0].len();
            let mut arrays = Vec::with_capacity(arity);
            for position in 0..arity {
                let mut views = Vec::with_capacity(per_instance.len());
                for instance_arrays in &per_instance {
                    let array = instance_arrays.get(position).ok_or_else(|| {
                        DatasetError::Stack {
                            field: field_name.clone(),
                            reason: format!(
                                "expected {} arrays per instance, found {}",
                                arity,
                                instance_arrays.len()
                            ),
                        }
                    })?;
                    views.push(array.view());
                }
                let array = ndarray::stack(Axis(0), &views).map_err(|error| {
                    DatasetError::Stack {
                        field: field_name.clone(),
                        reason: error.to_string(),
                    }
                })?;
                arrays.push(array);
            }
            batched.insert(field_name, arrays);
        }
        Ok(batched)
    }
}

fn add_noise<R: Rng>(value: f64, noise: f64, rng: &mut R) -> f64 {
    let bound = value * noise;
    if bound > 0.0 {
        value + rng.gen_range(-bound..bound)
    } else {
        value
    }
}

fn compare_sort_values(a: &[f64], b: &[f64]) -> Ordering {
    for (left, right) in a.iter().zip(b.iter()) {
        match left.total_cmp(right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}
