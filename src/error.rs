// ⚠️ Error taxonomy for the import pipeline
//
// Skip conditions (skip-list hits, empty required names) are NOT errors:
// they surface as `None` from the caches and mappers.
// Row-level problems are `RowError` and never leave a source pass.
// Everything else is an `EtlError` and aborts the current source only.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// SOURCE-LEVEL ERRORS
// ============================================================================

#[derive(Error, Debug)]
pub enum EtlError {
    /// Source file is missing (the source contributes zero records)
    #[error("required data file not found: {file_name} ({})", path.display())]
    DataFileNotFound { file_name: String, path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Bulk save failed; sibling kinds saved earlier in the same call are not rolled back
    #[error("persistence error: {context}")]
    Persistence {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("disease not available in cache: {0}")]
    MissingDisease(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EtlError {
    pub fn persistence(context: impl Into<String>, source: anyhow::Error) -> Self {
        EtlError::Persistence {
            context: context.into(),
            source,
        }
    }

    /// Short label used in run summaries
    pub fn kind(&self) -> &'static str {
        match self {
            EtlError::DataFileNotFound { .. } => "file not found",
            EtlError::Io(_) => "io",
            EtlError::Csv(_) => "csv",
            EtlError::Persistence { .. } => "persistence",
            EtlError::MissingDisease(_) => "mapping",
            EtlError::Config(_) => "config",
        }
    }
}

pub type EtlResult<T> = Result<T, EtlError>;

// ============================================================================
// ROW-LEVEL ERRORS (recovered locally: row skipped + counted)
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RowError {
    #[error("insufficient fields (expected at least {expected}, got {got})")]
    InsufficientFields { expected: usize, got: usize },

    #[error("invalid number in field {field}: '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid date '{value}' (expected format {format})")]
    InvalidDate { value: String, format: &'static str },

    #[error("malformed record: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persistence_error_keeps_source() {
        let err = EtlError::persistence("saving countries", anyhow::anyhow!("disk full"));

        assert_eq!(err.kind(), "persistence");
        assert_eq!(err.to_string(), "persistence error: saving countries");

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk full");
    }

    #[test]
    fn test_missing_file_message() {
        let err = EtlError::DataFileNotFound {
            file_name: "full_grouped.csv".to_string(),
            path: PathBuf::from("data/full_grouped.csv"),
        };

        assert!(err.to_string().contains("full_grouped.csv"));
        assert_eq!(err.kind(), "file not found");
    }

    #[test]
    fn test_row_error_display() {
        let err = RowError::InsufficientFields { expected: 10, got: 3 };
        assert_eq!(
            err.to_string(),
            "insufficient fields (expected at least 10, got 3)"
        );
    }
}
