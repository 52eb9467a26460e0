// Field variants - the typed pieces of data inside an instance
//
// A field knows how to contribute vocabulary counts, convert itself from
// strings to ids, report its own padding requirements, and emit padded
// arrays. Shape decisions during padding always come from the caller's
// length map, never from the field itself, so a whole batch pads
// consistently.
//
// Indexing policy is strict: calling `count_vocab_items` or `index` on a
// field whose `needs_indexing()` is false is an error, not a no-op. Callers
// check `needs_indexing()` first. A permissive no-op would make "no
// vocabulary items" indistinguishable from "forgot to handle this variant".

use crate::data::{PaddingLengths, SequenceRef, VocabCounter};
use crate::error::FieldError;
use crate::vocab::Vocabulary;
use ndarray::{Array1, Array2, ArrayD, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub const DEFAULT_LABEL_NAMESPACE: &str = "labels";
pub const DEFAULT_TAG_NAMESPACE: &str = "tags";

/// A single tagged value inside an instance.
///
/// Closed set of variants rather than an open trait hierarchy: every
/// capability is total over the enum, and misuse surfaces as a
/// [`FieldError`] instead of a missing override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Field {
    /// A categorical label, raw or already resolved to an id.
    Label(LabelField),
    /// A position within some sequence, e.g. a span begin or end.
    Index(IndexField),
    /// Per-element categorical labels over a sequence.
    Tags(TagField),
    /// An ordered list of homogeneous sub-fields.
    List(ListField),
}

impl Field {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Field::Label(_) => "label",
            Field::Index(_) => "index",
            Field::Tags(_) => "tags",
            Field::List(_) => "list",
        }
    }

    /// Whether this field still holds strings that a vocabulary must
    /// resolve. Pure query.
    pub fn needs_indexing(&self) -> bool {
        match self {
            Field::Label(field) => field.needs_indexing(),
            Field::Index(_) => false,
            Field::Tags(field) => field.needs_indexing(),
            Field::List(field) => field.needs_indexing(),
        }
    }

    /// Increments `counter` for every string this field will need an id
    /// for. Only valid while `needs_indexing()` is true.
    pub fn count_vocab_items(&self, counter: &mut VocabCounter) -> Result<(), FieldError> {
        match self {
            Field::Label(field) => field.count_vocab_items(counter),
            Field::Index(_) => Err(FieldError::IndexingUnsupported {
                variant: "index",
                operation: "count_vocab_items",
            }),
            Field::Tags(field) => field.count_vocab_items(counter),
            Field::List(field) => field.count_vocab_items(counter),
        }
    }

    /// Resolves every string in this field to an id, in place. Only valid
    /// while `needs_indexing()` is true; afterwards the field reports
    /// `needs_indexing() == false` and callers skip it.
    pub fn index(&mut self, vocab: &Vocabulary) -> Result<(), FieldError> {
        match self {
            Field::Label(field) => field.index(vocab),
            Field::Index(_) => Err(FieldError::IndexingUnsupported {
                variant: "index",
                operation: "index",
            }),
            Field::Tags(field) => field.index(vocab),
            Field::List(field) => field.index(vocab),
        }
    }

    /// Named length requirements for this field, e.g. `{"num_tokens": 13}`.
    /// Precondition: the field is indexed.
    pub fn get_padding_lengths(&self) -> Result<PaddingLengths, FieldError> {
        match self {
            Field::Label(field) => field.get_padding_lengths(),
            Field::Index(field) => Ok(field.get_padding_lengths()),
            Field::Tags(field) => field.get_padding_lengths(),
            Field::List(field) => field.get_padding_lengths(),
        }
    }

    /// Emits one or more fixed-shape arrays, sized entirely by `lengths`.
    pub fn pad(&self, lengths: &PaddingLengths) -> Result<Vec<ArrayD<f64>>, FieldError> {
        match self {
            Field::Label(field) => field.pad(lengths),
            Field::Index(field) => field.pad(lengths),
            Field::Tags(field) => field.pad(lengths),
            Field::List(field) => field.pad(lengths),
        }
    }

    /// A zero-content field of the same variant, used by list fields to pad
    /// their element count. Nested lists of lists are rejected.
    pub fn empty_field(&self) -> Result<Field, FieldError> {
        match self {
            Field::Label(field) => Ok(Field::Label(field.empty_field())),
            Field::Index(field) => Ok(Field::Index(field.empty_field())),
            Field::Tags(field) => Ok(Field::Tags(field.empty_field())),
            Field::List(_) => Err(FieldError::NestedListUnsupported),
        }
    }
}

/// A categorical label. Starts raw (a string plus a namespace) and becomes a
/// resolved id after indexing. Once indexed, the id is in `[0, num_labels)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelField {
    value: LabelValue,
    namespace: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum LabelValue {
    Raw(String),
    Id(usize),
}

impl LabelField {
    pub fn new(label: impl Into<String>) -> Self {
        LabelField::with_namespace(label, DEFAULT_LABEL_NAMESPACE)
    }

    pub fn with_namespace(label: impl Into<String>, namespace: impl Into<String>) -> Self {
        LabelField {
            value: LabelValue::Raw(label.into()),
            namespace: namespace.into(),
        }
    }

    /// A label already resolved to an id; never needs indexing.
    pub fn from_id(id: usize) -> Self {
        LabelField {
            value: LabelValue::Id(id),
            namespace: DEFAULT_LABEL_NAMESPACE.to_string(),
        }
    }

    pub fn label_id(&self) -> Option<usize> {
        match self.value {
            LabelValue::Raw(_) => None,
            LabelValue::Id(id) => Some(id),
        }
    }

    fn needs_indexing(&self) -> bool {
        matches!(self.value, LabelValue::Raw(_))
    }

    fn count_vocab_items(&self, counter: &mut VocabCounter) -> Result<(), FieldError> {
        match &self.value {
            LabelValue::Raw(label) => {
                *counter
                    .entry(self.namespace.clone())
                    .or_default()
                    .entry(label.clone())
                    .or_default() += 1;
                Ok(())
            }
            LabelValue::Id(_) => Err(FieldError::IndexingUnsupported {
                variant: "label",
                operation: "count_vocab_items",
            }),
        }
    }

    fn index(&mut self, vocab: &Vocabulary) -> Result<(), FieldError> {
        match &self.value {
            LabelValue::Raw(label) => {
                self.value = LabelValue::Id(vocab.get_token_index(label, &self.namespace));
                Ok(())
            }
            LabelValue::Id(_) => Err(FieldError::IndexingUnsupported {
                variant: "label",
                operation: "index",
            }),
        }
    }

    // num_labels is sized to the largest id seen in the data, not to the
    // vocabulary. A batch missing the highest-index label produces an
    // undersized one-hot unless a global width comes in through the
    // as_arrays override map.
    fn get_padding_lengths(&self) -> Result<PaddingLengths, FieldError> {
        let id = self.label_id().ok_or(FieldError::NotIndexed {
            operation: "get_padding_lengths",
        })?;
        let mut lengths = PaddingLengths::new();
        lengths.insert("num_labels".to_string(), id + 1);
        Ok(lengths)
    }

    fn pad(&self, lengths: &PaddingLengths) -> Result<Vec<ArrayD<f64>>, FieldError> {
        let id = self.label_id().ok_or(FieldError::NotIndexed {
            operation: "pad",
        })?;
        let num_labels = required_length(lengths, "num_labels")?;
        Ok(vec![one_hot(id, num_labels)?.into_dyn()])
    }

    fn empty_field(&self) -> LabelField {
        LabelField {
            value: LabelValue::Id(0),
            namespace: self.namespace.clone(),
        }
    }
}

/// An index into some sequence, e.g. the begin or end of an answer span in a
/// passage. Holds a [`SequenceRef`] onto the sequence it points into, for
/// length lookup only; the position itself is already numeric, so this field
/// never needs indexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexField {
    position: usize,
    sequence: SequenceRef,
}

impl IndexField {
    pub fn new(position: usize, sequence: SequenceRef) -> Self {
        IndexField { position, sequence }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    fn get_padding_lengths(&self) -> PaddingLengths {
        let mut lengths = PaddingLengths::new();
        lengths.insert(
            self.sequence.key().to_string(),
            self.sequence.sequence_length(),
        );
        lengths
    }

    fn pad(&self, lengths: &PaddingLengths) -> Result<Vec<ArrayD<f64>>, FieldError> {
        let length = required_length(lengths, self.sequence.key())?;
        Ok(vec![one_hot(self.position, length)?.into_dyn()])
    }

    fn empty_field(&self) -> IndexField {
        // Position 0 with no real sequence behind it; pad only reads
        // lengths from the supplied map.
        IndexField {
            position: 0,
            sequence: self.sequence.empty(),
        }
    }
}

/// A categorical tag per element of some sequence (part-of-speech tags, BIO
/// spans, and the like). The anchoring sequence is referenced for its length
/// only; the tag count must match it exactly, checked at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagField {
    tags: Vec<String>,
    indexed: Option<Vec<usize>>,
    sequence: SequenceRef,
    namespace: String,
}

impl TagField {
    pub fn new(tags: Vec<String>, sequence: SequenceRef) -> Result<Self, FieldError> {
        TagField::with_namespace(tags, sequence, DEFAULT_TAG_NAMESPACE)
    }

    pub fn with_namespace(
        tags: Vec<String>,
        sequence: SequenceRef,
        namespace: impl Into<String>,
    ) -> Result<Self, FieldError> {
        if tags.len() != sequence.sequence_length() {
            return Err(FieldError::TagLengthMismatch {
                tags: tags.len(),
                sequence: sequence.sequence_length(),
            });
        }
        Ok(TagField {
            tags,
            indexed: None,
            sequence,
            namespace: namespace.into(),
        })
    }

    pub fn tag_ids(&self) -> Option<&[usize]> {
        self.indexed.as_deref()
    }

    fn needs_indexing(&self) -> bool {
        self.indexed.is_none()
    }

    fn count_vocab_items(&self, counter: &mut VocabCounter) -> Result<(), FieldError> {
        if self.indexed.is_some() {
            return Err(FieldError::IndexingUnsupported {
                variant: "tags",
                operation: "count_vocab_items",
            });
        }
        let namespace = counter.entry(self.namespace.clone()).or_default();
        for tag in &self.tags {
            *namespace.entry(tag.clone()).or_default() += 1;
        }
        Ok(())
    }

    fn index(&mut self, vocab: &Vocabulary) -> Result<(), FieldError> {
        if self.indexed.is_some() {
            return Err(FieldError::IndexingUnsupported {
                variant: "tags",
                operation: "index",
            });
        }
        self.indexed = Some(
            self.tags
                .iter()
                .map(|tag| vocab.get_token_index(tag, &self.namespace))
                .collect(),
        );
        Ok(())
    }

    // num_tags carries the same data-dependent sizing caveat as num_labels.
    fn get_padding_lengths(&self) -> Result<PaddingLengths, FieldError> {
        let ids = self.indexed.as_ref().ok_or(FieldError::NotIndexed {
            operation: "get_padding_lengths",
        })?;
        let num_tags = ids.iter().max().map_or(0, |&max| max + 1);
        let mut lengths = PaddingLengths::new();
        lengths.insert(
            self.sequence.key().to_string(),
            self.sequence.sequence_length(),
        );
        lengths.insert("num_tags".to_string(), num_tags);
        Ok(lengths)
    }

    fn pad(&self, lengths: &PaddingLengths) -> Result<Vec<ArrayD<f64>>, FieldError> {
        let ids = self.indexed.as_ref().ok_or(FieldError::NotIndexed {
            operation: "pad",
        })?;
        let num_tokens = required_length(lengths, self.sequence.key())?;
        let num_tags = required_length(lengths, "num_tags")?;
        // Trailing zero-padding: downstream masking depends on padded
        // positions sitting at the end, one-hot at the sentinel id 0.
        let padded = pad_to_length(ids, num_tokens);
        let mut rows = Array2::<f64>::zeros((num_tokens, num_tags));
        for (position, &tag) in padded.iter().enumerate() {
            if tag >= num_tags {
                return Err(FieldError::OneHotOutOfRange {
                    index: tag,
                    length: num_tags,
                });
            }
            rows[[position, tag]] = 1.0;
        }
        Ok(vec![rows.into_dyn()])
    }

    fn empty_field(&self) -> TagField {
        // Constructed directly in indexed state so it never re-enters the
        // vocabulary phase.
        TagField {
            tags: Vec::new(),
            indexed: Some(Vec::new()),
            sequence: self.sequence.empty(),
            namespace: self.namespace.clone(),
        }
    }
}

/// An ordered list of homogeneous fields - a list of answer-option labels,
/// for example. Mixing variants is rejected at construction, and the list
/// itself can anchor index and tag fields via [`ListField::sequence_ref`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListField {
    fields: Vec<Field>,
}

impl ListField {
    pub fn new(fields: Vec<Field>) -> Result<Self, FieldError> {
        if fields.is_empty() {
            return Err(FieldError::EmptyList);
        }
        let variants: BTreeSet<&'static str> =
            fields.iter().map(Field::variant_name).collect();
        if variants.len() != 1 {
            return Err(FieldError::HeterogeneousList {
                found: variants.into_iter().map(str::to_string).collect(),
            });
        }
        Ok(ListField { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn sequence_length(&self) -> usize {
        self.fields.len()
    }

    /// A length reference onto this list, for index or tag fields anchored
    /// to its element count.
    pub fn sequence_ref(&self) -> SequenceRef {
        SequenceRef::options(self.fields.len())
    }

    fn needs_indexing(&self) -> bool {
        self.fields.iter().any(Field::needs_indexing)
    }

    fn count_vocab_items(&self, counter: &mut VocabCounter) -> Result<(), FieldError> {
        if !self.needs_indexing() {
            return Err(FieldError::IndexingUnsupported {
                variant: "list",
                operation: "count_vocab_items",
            });
        }
        for field in &self.fields {
            if field.needs_indexing() {
                field.count_vocab_items(counter)?;
            }
        }
        Ok(())
    }

    fn index(&mut self, vocab: &Vocabulary) -> Result<(), FieldError> {
        if !self.needs_indexing() {
            return Err(FieldError::IndexingUnsupported {
                variant: "list",
                operation: "index",
            });
        }
        for field in &mut self.fields {
            if field.needs_indexing() {
                field.index(vocab)?;
            }
        }
        Ok(())
    }

    fn get_padding_lengths(&self) -> Result<PaddingLengths, FieldError> {
        let element_lengths: Vec<PaddingLengths> = self
            .fields
            .iter()
            .map(Field::get_padding_lengths)
            .collect::<Result<_, _>>()?;
        let mut lengths = PaddingLengths::new();
        lengths.insert("num_fields".to_string(), self.fields.len());
        // Keys come from the first element; elements missing a key count
        // as 0 toward the max.
        for key in element_lengths[0].keys() {
            let max = element_lengths
                .iter()
                .map(|lengths| lengths.get(key).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            lengths.insert(key.clone(), max);
        }
        Ok(lengths)
    }

    fn pad(&self, lengths: &PaddingLengths) -> Result<Vec<ArrayD<f64>>, FieldError> {
        let num_fields = required_length(lengths, "num_fields")?;
        let empty = if num_fields > self.fields.len() {
            Some(self.fields[0].empty_field()?)
        } else {
            None
        };
        let mut padded: Vec<&Field> = self.fields.iter().take(num_fields).collect();
        if let Some(ref empty) = empty {
            while padded.len() < num_fields {
                padded.push(empty);
            }
        }
        let mut element_arrays = Vec::with_capacity(padded.len());
        for field in padded {
            element_arrays.push(field.pad(lengths)?);
        }
        if element_arrays.is_empty() {
            return Ok(Vec::new());
        }
        // Zip across elements: position i of every element's output stacks
        // into one batched array with a leading fields dimension.
        let arity = element_arrays[0].len();
        let mut stacked = Vec::with_capacity(arity);
        for position in 0..arity {
            let views: Vec<_> = element_arrays
                .iter()
                .map(|arrays| arrays[position].view())
                .collect();
            let array = ndarray::stack(Axis(0), &views)
                .map_err(|error| FieldError::Stack(error.to_string()))?;
            stacked.push(array);
        }
        Ok(stacked)
    }
}

fn required_length(lengths: &PaddingLengths, key: &str) -> Result<usize, FieldError> {
    lengths
        .get(key)
        .copied()
        .ok_or_else(|| FieldError::MissingPaddingKey(key.to_string()))
}

fn one_hot(index: usize, length: usize) -> Result<Array1<f64>, FieldError> {
    if index >= length {
        return Err(FieldError::OneHotOutOfRange { index, length });
    }
    let mut array = Array1::zeros(length);
    array[index] = 1.0;
    Ok(array)
}

/// Right-pads `ids` with the sentinel id 0 up to `desired`; sequences longer
/// than `desired` keep their leading elements.
fn pad_to_length(ids: &[usize], desired: usize) -> Vec<usize> {
    let mut padded: Vec<usize> = ids.iter().take(desired).copied().collect();
    padded.resize(desired, 0);
    padded
}
