// Core library for stanza - data representation and batching for text models
//
// The pipeline goes: raw instances (fields holding strings) -> vocabulary
// counting -> indexing (strings become dense ids) -> padding-length
// negotiation across the batch -> fixed-shape numeric arrays per field.

pub mod data;
pub mod dataset;
pub mod error;
pub mod field;
pub mod instance;
pub mod vocab;
