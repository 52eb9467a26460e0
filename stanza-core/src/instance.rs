// One example: a named collection of fields
//
// No distinction between model inputs and outputs here - every operation
// runs over all fields, and arrays come back keyed by field name for the
// model layer to pick from.

use crate::data::{InstancePaddingLengths, PaddingLengths, VocabCounter};
use crate::error::FieldError;
use crate::field::Field;
use crate::vocab::Vocabulary;
use ndarray::ArrayD;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single example: a mapping from field name to [`Field`].
///
/// Field names are unique within an instance, and the map is ordered so
/// array output is reproducible regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    fields: BTreeMap<String, Field>,
}

impl Instance {
    pub fn new(fields: BTreeMap<String, Field>) -> Self {
        Instance { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, Field> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    /// Increments `counter` for every vocabulary item in every field that
    /// still needs indexing.
    pub fn count_vocab_items(&self, counter: &mut VocabCounter) -> Result<(), FieldError> {
        for field in self.fields.values() {
            if field.needs_indexing() {
                field.count_vocab_items(counter)?;
            }
        }
        Ok(())
    }

    /// Resolves every un-indexed field against `vocab`, in place. Values
    /// are mutated where they sit; the key set never changes.
    pub fn index_fields(&mut self, vocab: &Vocabulary) -> Result<(), FieldError> {
        for field in self.fields.values_mut() {
            if field.needs_indexing() {
                field.index(vocab)?;
            }
        }
        Ok(())
    }

    /// Padding lengths per field, keyed by field name. Precondition: all
    /// fields are indexed.
    pub fn get_padding_lengths(&self) -> Result<InstancePaddingLengths, FieldError> {
        let mut lengths = InstancePaddingLengths::new();
        for (name, field) in &self.fields {
            lengths.insert(name.clone(), field.get_padding_lengths()?);
        }
        Ok(lengths)
    }

    /// Pads every field to the lengths in `padding_lengths` (keyed the same
    /// way as [`Instance::get_padding_lengths`]), returning arrays per field
    /// name. A field with no entry in the map gets an empty length map, and
    /// fails with [`FieldError::MissingPaddingKey`] if it needed one.
    pub fn pad(
        &self,
        padding_lengths: &InstancePaddingLengths,
    ) -> Result<BTreeMap<String, Vec<ArrayD<f64>>>, FieldError> {
        let empty = PaddingLengths::new();
        let mut arrays = BTreeMap::new();
        for (name, field) in &self.fields {
            let field_lengths = padding_lengths.get(name).unwrap_or(&empty);
            arrays.insert(name.clone(), field.pad(field_lengths)?);
        }
        Ok(arrays)
    }
}
