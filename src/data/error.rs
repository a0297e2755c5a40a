//! Error types for dataset construction and interchange
//!
//! [`DataError`] covers problems with the shape or content of a dataset: a
//! column the analysis needs is missing, a label is not one of the known
//! factor levels, or the file could not be read or written.

use thiserror::Error;

/// Errors arising from dataset shape and serialization
#[derive(Error, Debug)]
pub enum DataError {
    /// A column required by the design is absent
    #[error("Missing column: {column}")]
    MissingColumn { column: String },

    /// A factor column holds a value that is not a known level
    #[error("Unknown {column} level: '{value}'")]
    UnknownLevel { column: String, value: String },

    /// A row lacks a field the design requires
    #[error("Row {row} has no {field}, which the {design} design requires")]
    MissingField {
        row: usize,
        field: String,
        design: String,
    },

    /// No rows are available for the requested parameter
    #[error("No observations for parameter {parameter}")]
    NoObservations { parameter: String },

    /// A treatment level is absent for a parameter
    #[error("Parameter {parameter} has no observations under treatment {treatment}")]
    MissingTreatment {
        parameter: String,
        treatment: String,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
