use crate::DocId;
use thiserror::Error;

/// Failures raised by a [`CorpusStore`](crate::store::CorpusStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Sled(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("json encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no document with id {0}")]
    UnknownDocument(DocId),

    #[error("corrupt record under key {0}")]
    Corrupt(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("document {0} not found")]
    NotFound(DocId),

    /// The document was ingested after the last rebuild.
    #[error("document {0} has no vector; rebuild the vocabulary first")]
    MissingVector(DocId),

    #[error("document {id} was vectorized against vocabulary v{found}, current is v{expected}")]
    StaleVector { id: DocId, expected: u64, found: u64 },

    #[error("document {id} has a vector of length {found}, vocabulary has {expected} terms")]
    DimensionMismatch { id: DocId, expected: usize, found: usize },

    #[error("no vocabulary has been built yet")]
    VocabularyMissing,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load configuration: {0}")]
    Config(#[from] figment::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}
