use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

/// All errors produced by the dashboard crates.
#[derive(Error, Debug)]
pub enum DashboardError {
    /// A stored row lacks a field the record type requires.
    #[error("Missing field `{field}` in {table} row {row}")]
    MissingField {
        table: String,
        row: String,
        field: String,
    },

    /// A measure holds something other than a finite number.
    #[error("Field `{field}` is not numeric: {found}")]
    DataType { field: String, found: String },

    /// A bucket has no contributing data for the requested measure.
    ///
    /// Soft condition: callers drop the bucket rather than surfacing it.
    #[error("No data in bucket {0}")]
    EmptyBucket(NaiveDate),

    /// A timestamp or date string did not match any recognised format.
    #[error("Invalid timestamp format: {0}")]
    TimestampParse(String),

    /// A granularity name is not one of `daily`, `weekly`, `monthly`.
    #[error("Invalid granularity: {0}")]
    InvalidGranularity(String),

    /// The store has no table with this name.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// No row with the given id exists in the table.
    #[error("Row {id} not found in {table}")]
    RowNotFound { table: String, id: i64 },

    /// The nutrition lookup failed or returned no items.
    #[error("Nutrition lookup failed for \"{food}\": {reason}")]
    Lookup { food: String, reason: String },

    /// A serving quantity such as `"150g"` could not be parsed.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DashboardError {
    /// Build a [`DashboardError::MissingField`] for `table`/`row`.
    pub fn missing_field(table: &str, row: impl ToString, field: &str) -> Self {
        Self::MissingField {
            table: table.to_string(),
            row: row.to_string(),
            field: field.to_string(),
        }
    }

    /// Build a [`DashboardError::DataType`] describing the offending value.
    pub fn data_type(field: &str, found: impl ToString) -> Self {
        Self::DataType {
            field: field.to_string(),
            found: found.to_string(),
        }
    }
}

/// Convenience alias used throughout the dashboard crates.
pub type Result<T> = std::result::Result<T, DashboardError>;
