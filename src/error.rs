//! Error types for the table linker.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our custom error.
pub type Result<T> = std::result::Result<T, LinkerError>;

/// Errors that can occur in the table-linking pipeline.
#[derive(Error, Debug)]
pub enum LinkerError {
    /// Error reading or writing files.
    #[error("I/O error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Error reading or writing delimited tables.
    #[error("CSV error: {0}")]
    Csv(String),

    /// A required column is missing from a table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// Invalid configuration: unknown strategy, unknown distance function,
    /// conflicting or missing options.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Neither a table nor a file-path source was supplied.
    #[error("One of the input parameters is required: {0}")]
    MissingInput(String),

    /// Embedding resolution produced no vectors.
    #[error("Embedding resolution failed: {0}")]
    Resolution(String),

    /// A column-vector strategy could not produce a result.
    #[error("Column vector strategy '{0}' failed")]
    Strategy(String),

    /// HTTP request error.
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Failed to parse a value (float field, JSON body).
    #[error("Parse error: {0}")]
    Parse(String),
}

impl LinkerError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<reqwest::Error> for LinkerError {
    fn from(err: reqwest::Error) -> Self {
        LinkerError::Http(err.to_string())
    }
}

impl From<serde_json::Error> for LinkerError {
    fn from(err: serde_json::Error) -> Self {
        LinkerError::Parse(err.to_string())
    }
}

impl From<csv::Error> for LinkerError {
    fn from(err: csv::Error) -> Self {
        LinkerError::Csv(err.to_string())
    }
}
