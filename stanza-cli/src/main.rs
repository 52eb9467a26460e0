use clap::{Parser, Subcommand};
use eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use stanza_core::data::{LengthOverrides, SequenceRef, VocabCounter};
use stanza_core::dataset::Dataset;
use stanza_core::field::{Field, IndexField, LabelField, ListField, TagField};
use stanza_core::instance::Instance;
use stanza_core::vocab::Vocabulary;

#[derive(Parser)]
#[command(name = "stanza")]
#[command(about = "Turn annotated text examples into padded batch arrays")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index a dataset and emit batched arrays
    Arrays {
        /// Input dataset file (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the batched arrays (JSON)
        #[arg(short, long)]
        output: PathBuf,

        /// Padding-length overrides file (JSON, field -> key -> length)
        #[arg(long)]
        lengths: Option<PathBuf>,

        /// Sort instances by a padding length first, as "field:key"
        #[arg(long)]
        sort_by: Option<String>,

        /// Fractional noise applied to lengths while sorting
        #[arg(long, default_value_t = 0.0)]
        noise: f64,

        /// Keep at most this many instances (prefix of the current order)
        #[arg(long)]
        truncate: Option<usize>,

        /// Suppress progress logging
        #[arg(short, long)]
        quiet: bool,
    },
    /// Report batch-wide padding lengths for a dataset
    Lengths {
        /// Input dataset file (JSON)
        input: PathBuf,
    },
    /// Show vocabulary statistics for a dataset
    Vocab {
        /// Input dataset file (JSON)
        input: PathBuf,
    },
    /// Create an example dataset file
    Example {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[derive(Serialize, Deserialize, Debug)]
struct JsonDataset {
    instances: Vec<JsonInstance>,
}

#[derive(Serialize, Deserialize, Debug)]
struct JsonInstance {
    fields: BTreeMap<String, JsonField>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
enum JsonField {
    /// A raw string label, e.g. {"type": "label", "label": "entailment"}
    Label {
        label: String,
        namespace: Option<String>,
    },
    /// A label already resolved to an id
    LabelId { id: usize },
    /// A position within a sequence of the given length
    Index {
        position: usize,
        length: usize,
        /// Padding key the sequence reports its length under
        /// (default "num_tokens")
        key: Option<String>,
    },
    /// One tag per token of the anchoring sequence
    Tags {
        tags: Vec<String>,
        namespace: Option<String>,
    },
    /// A list of homogeneous sub-fields
    List { fields: Vec<JsonField> },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Arrays {
            input,
            output,
            lengths,
            sort_by,
            noise,
            truncate,
            quiet,
        } => {
            emit_arrays(input, output, lengths.as_ref(), sort_by.as_deref(), *noise, *truncate, *quiet)?;
        }
        Commands::Lengths { input } => {
            show_lengths(input)?;
        }
        Commands::Vocab { input } => {
            show_vocab(input)?;
        }
        Commands::Example { output } => {
            create_example(output)?;
        }
    }

    Ok(())
}

fn load_dataset(input: &PathBuf) -> Result<Dataset> {
    let content = fs::read_to_string(input)?;
    let json_dataset: JsonDataset = serde_json::from_str(&content)?;

    let mut instances = Vec::with_capacity(json_dataset.instances.len());
    for json_instance in &json_dataset.instances {
        let mut fields = BTreeMap::new();
        for (name, json_field) in &json_instance.fields {
            fields.insert(name.clone(), convert_field(json_field)?);
        }
        instances.push(Instance::new(fields));
    }
    Ok(Dataset::new(instances))
}

fn convert_field(json: &JsonField) -> Result<Field> {
    match json {
        JsonField::Label { label, namespace } => Ok(Field::Label(match namespace {
            Some(namespace) => LabelField::with_namespace(label.clone(), namespace.clone()),
            None => LabelField::new(label.clone()),
        })),
        JsonField::LabelId { id } => Ok(Field::Label(LabelField::from_id(*id))),
        JsonField::Index {
            position,
            length,
            key,
        } => {
            let sequence = match key.as_deref() {
                Some(key) => SequenceRef::new(key, *length),
                None => SequenceRef::tokens(*length),
            };
            Ok(Field::Index(IndexField::new(*position, sequence)))
        }
        JsonField::Tags { tags, namespace } => {
            let sequence = SequenceRef::tokens(tags.len());
            let field = match namespace {
                Some(namespace) => {
                    TagField::with_namespace(tags.clone(), sequence, namespace.clone())?
                }
                None => TagField::new(tags.clone(), sequence)?,
            };
            Ok(Field::Tags(field))
        }
        JsonField::List { fields } => {
            let converted: Vec<Field> = fields
                .iter()
                .map(convert_field)
                .collect::<Result<Vec<_>>>()?;
            Ok(Field::List(ListField::new(converted)?))
        }
    }
}

/// Build a vocabulary from the dataset's own counts and index in place.
fn index_dataset(dataset: &mut Dataset) -> Result<Vocabulary> {
    let mut counter = VocabCounter::new();
    dataset.count_vocab_items(&mut counter)?;
    let vocab = Vocabulary::from_counter(&counter);
    dataset.index_instances(&vocab)?;
    Ok(vocab)
}

fn parse_sort_key(sort_by: &str) -> Result<(&str, &str)> {
    sort_by
        .split_once(':')
        .ok_or_else(|| eyre::eyre!("Expected sort key as field:padding_key, got: {}", sort_by))
}

fn emit_arrays(
    input: &PathBuf,
    output: &PathBuf,
    lengths: Option<&PathBuf>,
    sort_by: Option<&str>,
    noise: f64,
    truncate: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let mut dataset = load_dataset(input)?;
    index_dataset(&mut dataset)?;

    if let Some(max_instances) = truncate {
        dataset = dataset.truncate(max_instances);
    }
    if let Some(sort_by) = sort_by {
        let (field, key) = parse_sort_key(sort_by)?;
        dataset.sort_by_padding(&[(field, key)], noise)?;
    }

    let overrides: Option<LengthOverrides> = match lengths {
        Some(path) => Some(serde_json::from_str(&fs::read_to_string(path)?)?),
        None => None,
    };

    let arrays = dataset.as_arrays(overrides.as_ref(), !quiet)?;
    fs::write(output, serde_json::to_string_pretty(&arrays)?)?;
    println!(
        "Wrote {} fields for {} instances to {}",
        arrays.len(),
        dataset.len(),
        output.display()
    );
    Ok(())
}

fn show_lengths(input: &PathBuf) -> Result<()> {
    let mut dataset = load_dataset(input)?;
    index_dataset(&mut dataset)?;

    let lengths = dataset.padding_lengths()?;
    println!("{}", serde_json::to_string_pretty(&lengths)?);
    Ok(())
}

fn show_vocab(input: &PathBuf) -> Result<()> {
    let dataset = load_dataset(input)?;
    let mut counter = VocabCounter::new();
    dataset.count_vocab_items(&mut counter)?;
    let vocab = Vocabulary::from_counter(&counter);

    println!("Dataset: {} instances", dataset.len());
    for namespace in vocab.namespaces() {
        println!(
            "  namespace '{}': {} ids (including the unknown slot)",
            namespace,
            vocab.get_vocab_size(namespace)
        );
    }
    Ok(())
}

fn create_example(output: &PathBuf) -> Result<()> {
    let example = serde_json::json!({
        "instances": [
            {
                "fields": {
                    "question": {"type": "tags", "tags": ["O", "O", "B"]},
                    "span_begin": {"type": "index", "position": 2, "length": 3},
                    "answer": {"type": "label", "label": "entailment"}
                }
            },
            {
                "fields": {
                    "question": {"type": "tags", "tags": ["O", "B"]},
                    "span_begin": {"type": "index", "position": 1, "length": 2},
                    "answer": {"type": "label", "label": "neutral"}
                }
            },
            {
                "fields": {
                    "options": {"type": "list", "fields": [
                        {"type": "label", "label": "yes"},
                        {"type": "label", "label": "no"}
                    ]},
                    "answer": {"type": "index", "position": 0, "length": 2, "key": "num_options"}
                }
            }
        ]
    });

    let path = output.join("example-dataset.json");
    fs::write(&path, serde_json::to_string_pretty(&example)?)?;
    println!("Created {}", path.display());
    println!("Try: stanza arrays --input {} --output arrays.json", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_tagged_field() {
        let json: JsonField =
            serde_json::from_str(r#"{"type": "tags", "tags": ["O", "B"]}"#).unwrap();
        let field = convert_field(&json).unwrap();
        assert!(field.needs_indexing());
        assert_eq!(field.variant_name(), "tags");
    }

    #[test]
    fn test_convert_rejects_mixed_list() {
        let json: JsonField = serde_json::from_str(
            r#"{"type": "list", "fields": [
                {"type": "label", "label": "yes"},
                {"type": "index", "position": 0, "length": 2}
            ]}"#,
        )
        .unwrap();
        assert!(convert_field(&json).is_err());
    }

    #[test]
    fn test_parse_sort_key() {
        assert_eq!(parse_sort_key("question:num_tokens").unwrap(), ("question", "num_tokens"));
        assert!(parse_sort_key("question").is_err());
    }
}
