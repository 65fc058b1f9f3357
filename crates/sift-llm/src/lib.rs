//! Model-provider abstraction consumed by the sift retrieval engine.
//!
//! Concrete vendor adapters live outside this workspace; the engine only
//! depends on the [`LlmProvider`] trait for embeddings and classification
//! completions.

pub mod error;
#[cfg(feature = "mock")]
pub mod mock;
pub mod provider;

pub use error::LlmError;
pub use provider::{LlmProvider, Message, Role};
