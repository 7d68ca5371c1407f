use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlobeError {
    #[error("Missing file for {table} table: {path}")]
    MissingFile { table: String, path: String },

    #[error("Missing asset file: {path}")]
    MissingAsset { path: String },

    #[error("Missing column '{column}' in {table} table")]
    MissingColumn { table: String, column: String },

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation: {0}")]
    Validation(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),

    #[error("{} input table(s) could not be loaded:\n{}", .0.len(), format_table_errors(.0))]
    Tables(Vec<TableError>),
}

/// A fatal problem with one named input table.
#[derive(Debug)]
pub struct TableError {
    pub table: String,
    pub error: GlobeError,
}

fn format_table_errors(errors: &[TableError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}: {}", e.table, e.error))
        .collect::<Vec<_>>()
        .join("\n")
}

pub type Result<T> = std::result::Result<T, GlobeError>;
