//! Persistent cosine-similarity vector store.
//!
//! Points live in memory behind an `RwLock` and are flushed to a JSON
//! snapshot after every mutation, so a project's index survives restarts
//! without an external service. Reads never block behind a flush.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

const SNAPSHOT_FILE: &str = "vectors.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct ScoredPoint {
    pub id: String,
    pub score: f32,
    pub payload: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default)]
pub struct VectorFilter {
    pub must: Vec<FieldCondition>,
    pub must_not: Vec<FieldCondition>,
}

impl VectorFilter {
    /// Filter matching all points whose payload field equals the given text.
    #[must_use]
    pub fn field_text(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            must: vec![FieldCondition {
                field: field.into(),
                value: FieldValue::Text(value.into()),
            }],
            must_not: vec![],
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldCondition {
    pub field: String,
    pub value: FieldValue,
}

#[derive(Debug, Clone)]
pub enum FieldValue {
    Integer(i64),
    Text(String),
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    dimension: Option<usize>,
    points: Vec<VectorPoint>,
}

#[derive(Debug, Default)]
struct Inner {
    dimension: Option<usize>,
    points: HashMap<String, VectorPoint>,
}

pub struct LocalVectorStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for LocalVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalVectorStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn matches_filter(payload: &HashMap<String, serde_json::Value>, filter: &VectorFilter) -> bool {
    for cond in &filter.must {
        let Some(val) = payload.get(&cond.field) else {
            return false;
        };
        if !field_matches(val, &cond.value) {
            return false;
        }
    }
    for cond in &filter.must_not {
        if let Some(val) = payload.get(&cond.field)
            && field_matches(val, &cond.value)
        {
            return false;
        }
    }
    true
}

fn field_matches(val: &serde_json::Value, expected: &FieldValue) -> bool {
    match expected {
        FieldValue::Integer(i) => val.as_i64() == Some(*i),
        FieldValue::Text(s) => val.as_str() == Some(s.as_str()),
    }
}

impl LocalVectorStore {
    /// Open the store rooted at `dir`, loading an existing snapshot if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// snapshot cannot be read or parsed.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(SNAPSHOT_FILE);

        let inner = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let snapshot: Snapshot = serde_json::from_str(&raw)?;
            Inner {
                dimension: snapshot.dimension,
                points: snapshot
                    .points
                    .into_iter()
                    .map(|p| (p.id.clone(), p))
                    .collect(),
            }
        } else {
            Inner::default()
        };

        Ok(Self {
            path,
            inner: RwLock::new(inner),
        })
    }

    /// Record the embedding dimension on first write.
    ///
    /// Idempotent for a matching size.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` if a different dimension was already
    /// recorded.
    pub async fn ensure_dimension(&self, size: usize) -> Result<()> {
        {
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            match inner.dimension {
                None => inner.dimension = Some(size),
                Some(existing) if existing == size => return Ok(()),
                Some(existing) => {
                    return Err(StoreError::DimensionMismatch {
                        expected: existing,
                        actual: size,
                    });
                }
            }
        }
        self.persist().await
    }

    /// Insert or replace points, then flush the snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DimensionMismatch` for a vector that does not match the
    /// recorded dimension, or an IO error from the flush.
    pub async fn upsert(&self, points: Vec<VectorPoint>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        {
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            for p in points {
                if let Some(expected) = inner.dimension
                    && p.vector.len() != expected
                {
                    return Err(StoreError::DimensionMismatch {
                        expected,
                        actual: p.vector.len(),
                    });
                }
                inner.points.insert(p.id.clone(), p);
            }
        }
        self.persist().await
    }

    /// Rank all points matching `filter` by cosine similarity to `vector`.
    #[must_use]
    pub fn search(
        &self,
        vector: &[f32],
        limit: usize,
        filter: Option<&VectorFilter>,
    ) -> Vec<ScoredPoint> {
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);

        let empty_filter = VectorFilter::default();
        let f = filter.unwrap_or(&empty_filter);

        let mut scored: Vec<ScoredPoint> = inner
            .points
            .values()
            .filter(|p| matches_filter(&p.payload, f))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(limit);
        scored
    }

    /// Remove every point matching `filter`, then flush. Returns the count
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns an IO error from the flush.
    pub async fn delete_by_filter(&self, filter: &VectorFilter) -> Result<usize> {
        let removed = {
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            let before = inner.points.len();
            inner.points.retain(|_, p| !matches_filter(&p.payload, filter));
            before - inner.points.len()
        };
        if removed > 0 {
            tracing::debug!(removed, "vector points deleted by filter");
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Remove all points and delete the snapshot file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the snapshot file cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.points.clear();
            inner.dimension = None;
        }
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .points
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.inner
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .dimension
    }

    async fn persist(&self) -> Result<()> {
        let raw = {
            let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            let snapshot = Snapshot {
                dimension: inner.dimension,
                points: inner.points.values().cloned().collect(),
            };
            serde_json::to_vec(&snapshot)?
        };

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>, path: &str) -> VectorPoint {
        VectorPoint {
            id: id.into(),
            vector,
            payload: HashMap::from([("file_path".into(), serde_json::json!(path))]),
        }
    }

    #[tokio::test]
    async fn upsert_and_search_ranks_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).unwrap();
        store.ensure_dimension(3).await.unwrap();

        store
            .upsert(vec![
                point("a", vec![1.0, 0.0, 0.0], "a.md"),
                point("b", vec![0.0, 1.0, 0.0], "b.md"),
            ])
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0, 0.0], 2, None);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = LocalVectorStore::open(dir.path()).unwrap();
            store.ensure_dimension(3).await.unwrap();
            store
                .upsert(vec![point("a", vec![1.0, 0.0, 0.0], "a.md")])
                .await
                .unwrap();
        }

        let reopened = LocalVectorStore::open(dir.path()).unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.dimension(), Some(3));
        let results = reopened.search(&[1.0, 0.0, 0.0], 1, None);
        assert_eq!(results[0].id, "a");
    }

    #[tokio::test]
    async fn delete_by_filter_removes_path_points() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).unwrap();
        store.ensure_dimension(3).await.unwrap();

        store
            .upsert(vec![
                point("a0", vec![1.0, 0.0, 0.0], "a.md"),
                point("a1", vec![0.9, 0.1, 0.0], "a.md"),
                point("b0", vec![0.0, 1.0, 0.0], "b.md"),
            ])
            .await
            .unwrap();

        let removed = store
            .delete_by_filter(&VectorFilter::field_text("file_path", "a.md"))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.len(), 1);

        let results = store.search(&[1.0, 0.0, 0.0], 10, None);
        assert!(results.iter().all(|p| p.id == "b0"));
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).unwrap();
        store.ensure_dimension(3).await.unwrap();

        let result = store.upsert(vec![point("a", vec![1.0, 0.0], "a.md")]).await;
        assert!(matches!(
            result,
            Err(StoreError::DimensionMismatch { expected: 3, actual: 2 })
        ));

        assert!(store.ensure_dimension(3).await.is_ok());
        assert!(store.ensure_dimension(4).await.is_err());
    }

    #[tokio::test]
    async fn search_with_must_not_filter() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).unwrap();
        store.ensure_dimension(3).await.unwrap();

        store
            .upsert(vec![
                point("a", vec![1.0, 0.0, 0.0], "a.md"),
                point("b", vec![0.9, 0.1, 0.0], "b.md"),
            ])
            .await
            .unwrap();

        let filter = VectorFilter {
            must: vec![],
            must_not: vec![FieldCondition {
                field: "file_path".into(),
                value: FieldValue::Text("a.md".into()),
            }],
        };
        let results = store.search(&[1.0, 0.0, 0.0], 10, Some(&filter));
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "b");
    }

    #[tokio::test]
    async fn clear_empties_store_and_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalVectorStore::open(dir.path()).unwrap();
        store.ensure_dimension(3).await.unwrap();
        store
            .upsert(vec![point("a", vec![1.0, 0.0, 0.0], "a.md")])
            .await
            .unwrap();

        store.clear().await.unwrap();
        assert!(store.is_empty());
        assert_eq!(store.dimension(), None);
        assert!(!dir.path().join(SNAPSHOT_FILE).exists());
    }

    #[test]
    fn cosine_similarity_zero_for_zero_vector() {
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).abs() < f32::EPSILON);
    }
}
