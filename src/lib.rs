//! Hybrid retrieval engine: incremental file indexing with semantic +
//! lexical rank fusion.
//!
//! [`Engine`] is the composition root: it loads [`EngineConfig`], owns the
//! per-project indexer registry, and exposes the operations the chat
//! pipeline calls: `ensure_indexed`, `index_progress`, `clear_and_reindex`,
//! and `retrieve`.

pub mod config;
pub mod registry;

pub use config::EngineConfig;
pub use registry::Engine;

pub use sift_index::{
    IndexProgress, IndexStatus, ProjectIndexer, RetrievalCoordinator, RetrievalResult, ScoredChunk,
};
pub use sift_llm::{LlmProvider, Message, Role};
