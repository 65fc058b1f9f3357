//! Persistence layer for the sift retrieval engine.
//!
//! Three stores, each scoped to one project: a cosine-similarity vector
//! index persisted as a JSON snapshot, a BM25 keyword index persisted as a
//! document corpus, and a `SQLite`-backed tracker of per-file content hashes
//! used for incremental change detection.

pub mod error;
pub mod keyword;
pub mod tracker;
pub mod vector;

pub use error::{Result, StoreError};
pub use keyword::{KeywordDoc, KeywordHit, KeywordStore};
pub use tracker::StateTracker;
pub use vector::{FieldCondition, FieldValue, LocalVectorStore, ScoredPoint, VectorFilter, VectorPoint};
