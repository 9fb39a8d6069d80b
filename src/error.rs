use thiserror::Error;

/// Hard failures. Bad field values inside a row never end up here.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("invalid input: expected a list of order records, got {0}")]
    InvalidInput(&'static str),

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON input: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed CSV input: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
