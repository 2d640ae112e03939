//! Statute retrieval: a persisted embedding index over a statute corpus,
//! queried by cosine similarity.
//!
//! Ingestion is offline and exclusive (lock file + atomic rename). Serving
//! loads the index once into an immutable `Arc<StatuteIndex>` shared by all
//! requests.

pub mod corpus;
pub mod embedder;
pub mod index;
pub mod retriever;
pub mod types;

pub use corpus::*;
pub use embedder::*;
pub use index::*;
pub use retriever::*;
pub use types::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corpus parsing failed: {0}")]
    CorpusParse(String),

    #[error("Corpus contains no usable sections")]
    EmptyCorpus,

    #[error("Index not found at {0} (run `ingest` first)")]
    IndexNotFound(PathBuf),

    #[error("Index file is corrupt: {0}")]
    IndexCorrupt(String),

    #[error("Another ingestion holds the lock at {0}")]
    IndexLocked(PathBuf),

    #[error("Index was built with embedding model {index:?}, but {configured:?} is configured")]
    ModelMismatch { index: String, configured: String },

    #[error("Embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model initialization failed: {0}")]
    ModelInit(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Failed to persist index: {0}")]
    Persist(String),
}
