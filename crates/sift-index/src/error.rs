//! Error types for sift-index.

/// Errors that can occur during indexing and retrieval operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// IO error reading source files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Store-layer error (vector, keyword, or tracker).
    #[error("store error: {0}")]
    Store(#[from] sift_store::StoreError),

    /// Model provider error (embedding or classification).
    #[error("LLM error: {0}")]
    Llm(#[from] sift_llm::LlmError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File watcher error.
    #[error("watcher error: {0}")]
    Watcher(#[from] notify::Error),

    /// File exceeds the configured size limit.
    #[error("file too large: {0} bytes")]
    FileTooLarge(u64),

    /// File failed the indexable predicate.
    #[error("unsupported file")]
    UnsupportedFile,

    /// Content extraction failure (corrupt document, decoder error).
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// Invalid configuration value.
    #[error("invalid config: {0}")]
    Config(String),

    /// Generic catch-all error.
    #[error("{0}")]
    Other(String),
}

/// Result type alias using `IndexError`.
pub type Result<T> = std::result::Result<T, IndexError>;
