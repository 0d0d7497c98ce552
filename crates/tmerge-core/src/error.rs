//! Error types for tmerge-core

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tmerge-core
#[derive(Debug, Error)]
pub enum Error {
    /// A quoted row has no leading field
    #[error("malformed row {line} in '{source_name}': {message}")]
    MalformedRow {
        source_name: String,
        line: usize,
        message: String,
    },

    /// A section row does not match the section header
    #[error("section '{section}' line {line}: expected {expected} fields, found {found}")]
    SectionShape {
        section: String,
        line: usize,
        expected: usize,
        found: usize,
    },

    /// The destination schema lacks a column the merge plan refers to
    #[error("destination template has no column '{column}'")]
    UnknownColumn { column: String },

    /// The destination schema declares the same column twice
    #[error("destination template declares column '{column}' more than once")]
    DuplicateSchemaColumn { column: String },

    /// A tidy table lacks a column needed by a processing step
    #[error("table '{table}' has no column '{column}'")]
    ColumnNotFound { table: String, column: String },

    /// A block would write past the last schema column
    #[error("block '{instrument}' needs columns {start}..{end} but the template has {width}")]
    BlockOutOfRange {
        instrument: String,
        start: usize,
        end: usize,
        width: usize,
    },

    /// A block's columns collide with another block or a stamped column
    #[error("block '{instrument}' overlaps columns already claimed by '{other}'")]
    OverlappingBlock { instrument: String, other: String },

    /// A collaborator could not deliver a file
    #[error("source '{name}' unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    /// File contents are not valid UTF-8
    #[error("'{name}' is not valid UTF-8: {source}")]
    Utf8 {
        name: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// File has no usable delimited structure
    #[error("failed to parse '{name}': {message}")]
    CsvParse { name: String, message: String },

    /// CSV parsing error from the csv crate
    #[error("CSV error in '{name}': {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Directory traversal error
    #[error("failed to traverse directory: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error must stop the whole merge run.
    ///
    /// Everything else is scoped to one file, section, or source and is
    /// reported as a skip.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::UnknownColumn { .. }
                | Error::DuplicateSchemaColumn { .. }
                | Error::BlockOutOfRange { .. }
                | Error::OverlappingBlock { .. }
                | Error::Io(_)
                | Error::Json(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_errors_are_fatal() {
        let err = Error::UnknownColumn {
            column: "date_fb".to_string(),
        };
        assert!(err.is_fatal());
        assert_eq!(
            err.to_string(),
            "destination template has no column 'date_fb'"
        );
    }

    #[test]
    fn test_data_errors_are_not_fatal() {
        let err = Error::SectionShape {
            section: "Sleep".to_string(),
            line: 3,
            expected: 4,
            found: 2,
        };
        assert!(!err.is_fatal());

        let err = Error::SourceUnavailable {
            name: "a.csv".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(!err.is_fatal());
    }
}
