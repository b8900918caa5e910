use thiserror::Error;

/// Errors produced by ranking, ground-truth and serialization operations.
#[derive(Debug, Error)]
pub enum RankError {
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("angular distance is undefined for a zero-norm vector")]
    ZeroNorm,

    #[error("top-k capacity must be greater than 0")]
    InvalidK,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("query batch is empty")]
    EmptyBatch,

    #[error("query {query} holds k={got}, but the batch uses k={expected}")]
    KMismatch {
        expected: usize,
        got: usize,
        query: usize,
    },

    #[error("table index {index} out of range ({num_tables} tables)")]
    TableOutOfRange { index: usize, num_tables: usize },

    #[error("bucket references unknown item id {0}")]
    UnknownId(usize),

    #[error("ground-truth worker thread panicked")]
    WorkerPanicked,

    #[error("value {0} does not fit in a 32-bit ivecs field")]
    IvecsOverflow(usize),

    #[error("parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[cfg(feature = "persistence")]
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A specialized Result type for ranking operations.
pub type Result<T> = std::result::Result<T, RankError>;
