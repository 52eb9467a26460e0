// Error types for stanza

use std::error::Error;
use std::fmt;

/// Top-level errors across the stanza pipeline
#[derive(Debug)]
pub enum PipelineError {
    Field(FieldError),
    Dataset(DatasetError),
}

/// Field construction, indexing, and padding errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// A list field was built from more than one field variant.
    HeterogeneousList { found: Vec<String> },
    /// A list field was built from no fields at all.
    EmptyList,
    /// An operation that requires indexed ids was called on a field still
    /// holding strings.
    NotIndexed { operation: &'static str },
    /// An indexing-only operation was called on a field whose
    /// `needs_indexing()` is false. Callers must guard with
    /// `needs_indexing()` before invoking these.
    IndexingUnsupported {
        variant: &'static str,
        operation: &'static str,
    },
    /// A one-hot position fell outside the supplied padding length.
    OneHotOutOfRange { index: usize, length: usize },
    /// A tag sequence did not line up with its anchoring sequence's length.
    TagLengthMismatch { tags: usize, sequence: usize },
    /// `empty_field` on a list field - nested lists of lists are not
    /// supported.
    NestedListUnsupported,
    /// The padding-length map did not carry a key the field needs.
    MissingPaddingKey(String),
    /// Stacking per-element arrays inside a list field failed.
    Stack(String),
}

/// Batch assembly errors, carrying instance context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetError {
    /// A field operation failed for the instance at `position`.
    Instance { position: usize, source: FieldError },
    /// A sorting key named a field or padding key no instance reports.
    UnknownSortKey { field: String, key: String },
    /// Stacking instance arrays into a batch failed.
    Stack { field: String, reason: String },
}

// Error trait implementations

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Field(e) => Some(e),
            PipelineError::Dataset(e) => Some(e),
        }
    }
}

impl Error for FieldError {}

impl Error for DatasetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DatasetError::Instance { source, .. } => Some(source),
            _ => None,
        }
    }
}

// Display implementations

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Field(e) => write!(f, "Field error: {}", e),
            PipelineError::Dataset(e) => write!(f, "Dataset error: {}", e),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::HeterogeneousList { found } => {
                write!(
                    f,
                    "List fields must contain a single field variant, found: {}",
                    found.join(", ")
                )
            }
            FieldError::EmptyList => {
                write!(f, "List fields must contain at least one field")
            }
            FieldError::NotIndexed { operation } => {
                write!(f, "{} called before the field was indexed", operation)
            }
            FieldError::IndexingUnsupported { variant, operation } => {
                write!(
                    f,
                    "{} field does not need indexing; check needs_indexing() before calling {}",
                    variant, operation
                )
            }
            FieldError::OneHotOutOfRange { index, length } => {
                write!(
                    f,
                    "One-hot position {} does not fit in padding length {}",
                    index, length
                )
            }
            FieldError::TagLengthMismatch { tags, sequence } => {
                write!(
                    f,
                    "Got {} tags for a sequence of length {}",
                    tags, sequence
                )
            }
            FieldError::NestedListUnsupported => {
                write!(
                    f,
                    "Nested list fields are not supported; flatten your data instead"
                )
            }
            FieldError::MissingPaddingKey(key) => {
                write!(f, "Padding lengths are missing required key: {}", key)
            }
            FieldError::Stack(msg) => {
                write!(f, "Failed to stack list element arrays: {}", msg)
            }
        }
    }
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Instance { position, source } => {
                write!(f, "Instance {}: {}", position, source)
            }
            DatasetError::UnknownSortKey { field, key } => {
                write!(f, "Unknown sorting key: ({}, {})", field, key)
            }
            DatasetError::Stack { field, reason } => {
                write!(f, "Failed to batch arrays for field '{}': {}", field, reason)
            }
        }
    }
}

// Convenience From implementations for error composition

impl From<FieldError> for PipelineError {
    fn from(error: FieldError) -> Self {
        PipelineError::Field(error)
    }
}

impl From<DatasetError> for PipelineError {
    fn from(error: DatasetError) -> Self {
        PipelineError::Dataset(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = FieldError::OneHotOutOfRange {
            index: 7,
            length: 5,
        };
        assert!(err.to_string().contains("7"));
        assert!(err.to_string().contains("5"));

        let wrapped = DatasetError::Instance {
            position: 3,
            source: err,
        };
        assert!(wrapped.to_string().starts_with("Instance 3"));
    }

    #[test]
    fn test_source_chain() {
        let err = PipelineError::from(DatasetError::UnknownSortKey {
            field: "text".to_string(),
            key: "num_tokens".to_string(),
        });
        assert!(err.source().is_some());
    }
}
