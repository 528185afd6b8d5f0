use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum InduceError {
    /// Extraction produced nothing; the caller should stop on this page.
    #[error("no candidates matched the requested suffixes")]
    NoCandidatesFound,

    #[error("block cannot be generalized: {0}")]
    InhomogeneousBlock(String),

    #[error("selection {start:?}..={end:?} is empty or outside a block of {len} items")]
    EmptySelection {
        start: Option<usize>,
        end: Option<usize>,
        len: usize,
    },

    #[error("block {index} does not exist ({count} blocks stored)")]
    UnknownBlock { index: usize, count: usize },

    #[error("similarity threshold {0} is outside [0, 1]")]
    InvalidThreshold(f64),

    #[error("synthesized pattern failed to compile: {0}")]
    InvalidPattern(String),
}

pub type Result<T> = std::result::Result<T, InduceError>;
