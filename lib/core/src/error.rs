use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A record could not be used to build a corpus (missing join key, bad row).
    #[error("Invalid record at index {index}: {reason}")]
    InvalidRecord { index: usize, reason: String },

    /// Cache miss, or a cached artifact incompatible with the caller's expectation.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Evaluation input too degenerate to produce a meaningful number.
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    pub(crate) fn invalid_record(index: usize, reason: impl Into<String>) -> Self {
        Error::InvalidRecord {
            index,
            reason: reason.into(),
        }
    }
}
