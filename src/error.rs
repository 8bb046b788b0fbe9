use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovrecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found in coverage: {0}")]
    NotFound(String),

    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Inconsistent block in {file}: {reason}")]
    InconsistentBlock { file: String, reason: String },

    #[error("Cannot merge {0}: its blocks were stripped")]
    StrippedMerge(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown coverage format")]
    UnknownFormat,
}

pub type Result<T> = std::result::Result<T, CovrecError>;
