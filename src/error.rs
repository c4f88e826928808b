use std::path::PathBuf;

use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, MergeError>;

/// Error type covering the different failure cases that can occur while the
/// tool ingests source workbooks, merges them, and emits output files.
#[derive(Debug, Error)]
pub enum MergeError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing of a side file fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when the template workbook is missing or carries no header row.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// Raised when the alias map is malformed (e.g. a chained alias).
    #[error("invalid alias map: {0}")]
    InvalidAliasMap(String),

    /// Raised when no row inside the scanned window of a sheet matches the
    /// template header.
    #[error("no header row found in '{sheet}' of {file}")]
    HeaderNotFound { file: PathBuf, sheet: String },

    /// Raised when a source workbook cannot be read at all.
    #[error("cannot read source file {file}: {message}")]
    SourceRead { file: PathBuf, message: String },

    /// Raised when the reference table used for backfill cannot be loaded.
    #[error("cannot load reference table {file}: {message}")]
    ReferenceTableLoad { file: PathBuf, message: String },

    /// Raised when a column requested for extraction is absent from the
    /// merged schema.
    #[error("column '{0}' not found in merged output")]
    ColumnNotFound(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input path not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
