//! Hybrid retrieval: vector and keyword search fused by reciprocal rank.

use std::collections::HashMap;
use std::sync::Arc;

use sift_llm::LlmProvider;
use sift_store::{KeywordHit, KeywordStore, LocalVectorStore, ScoredPoint};

use crate::config::RetrievalConfig;
use crate::error::Result;
use crate::fusion::reciprocal_rank_fusion;

/// One fused result: chunk text plus file metadata and the summed score.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub id: String,
    pub text: String,
    pub file_path: String,
    pub file_name: String,
    pub extension: String,
    pub chunk_index: usize,
    pub score: f32,
}

/// Ordered retrieval output, produced fresh per query and never persisted.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub chunks: Vec<ScoredChunk>,
}

impl RetrievalResult {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// Runs both stores and merges their rankings.
pub struct HybridRetriever<P: LlmProvider> {
    vector: Arc<LocalVectorStore>,
    keyword: Arc<KeywordStore>,
    provider: Arc<P>,
    config: RetrievalConfig,
}

impl<P: LlmProvider + 'static> HybridRetriever<P> {
    #[must_use]
    pub fn new(
        vector: Arc<LocalVectorStore>,
        keyword: Arc<KeywordStore>,
        provider: Arc<P>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            vector,
            keyword,
            provider,
            config,
        }
    }

    /// Retrieve chunks ranked by fused score.
    ///
    /// The two sub-searches run independently; the minimum-score threshold
    /// is applied to vector hits before ranks are assigned.
    ///
    /// # Errors
    ///
    /// Returns an error if query embedding fails.
    pub async fn retrieve(&self, query: &str) -> Result<RetrievalResult> {
        let vector_search = async {
            let query_vector = self.provider.embed(query).await?;
            let mut hits =
                self.vector
                    .search(&query_vector, self.config.vector_max_results, None);
            hits.retain(|h| h.score >= self.config.vector_min_score);
            Ok::<_, crate::error::IndexError>(hits)
        };

        let keyword_store = Arc::clone(&self.keyword);
        let keyword_query = query.to_string();
        let keyword_limit = self.config.keyword_max_results;
        let keyword_search =
            tokio::task::spawn_blocking(move || keyword_store.search(&keyword_query, keyword_limit));

        let (vector_hits, keyword_hits) = tokio::join!(vector_search, keyword_search);
        let vector_hits = vector_hits?;
        let keyword_hits = keyword_hits.unwrap_or_else(|e| {
            tracing::warn!("keyword search task failed: {e}");
            Vec::new()
        });

        tracing::debug!(
            vector = vector_hits.len(),
            keyword = keyword_hits.len(),
            "sub-searches complete"
        );

        Ok(self.fuse(&vector_hits, &keyword_hits))
    }

    fn fuse(&self, vector_hits: &[ScoredPoint], keyword_hits: &[KeywordHit]) -> RetrievalResult {
        let vector_ids: Vec<String> = vector_hits.iter().map(|h| h.id.clone()).collect();
        let keyword_ids: Vec<String> = keyword_hits.iter().map(|h| h.id.clone()).collect();

        let fused =
            reciprocal_rank_fusion(&vector_ids, &keyword_ids, self.config.rank_fusion_constant);

        let by_vector: HashMap<&str, &ScoredPoint> =
            vector_hits.iter().map(|h| (h.id.as_str(), h)).collect();
        let by_keyword: HashMap<&str, &KeywordHit> =
            keyword_hits.iter().map(|h| (h.id.as_str(), h)).collect();

        let chunks = fused
            .into_iter()
            .filter_map(|item| {
                if let Some(point) = by_vector.get(item.id.as_str()) {
                    chunk_from_payload(point, item.score)
                } else {
                    by_keyword
                        .get(item.id.as_str())
                        .map(|hit| chunk_from_keyword(hit, item.score))
                }
            })
            .take(self.config.hybrid_max_results)
            .collect();

        RetrievalResult { chunks }
    }
}

fn chunk_from_payload(point: &ScoredPoint, score: f32) -> Option<ScoredChunk> {
    let p = &point.payload;
    let get_str = |key: &str| p.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let get_int = |key: &str| {
        p.get(key)
            .and_then(serde_json::Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
    };

    Some(ScoredChunk {
        id: point.id.clone(),
        text: get_str("text")?,
        file_path: get_str("file_path")?,
        file_name: get_str("file_name").unwrap_or_default(),
        extension: get_str("extension").unwrap_or_default(),
        chunk_index: get_int("chunk_index").unwrap_or(0),
        score,
    })
}

fn chunk_from_keyword(hit: &KeywordHit, score: f32) -> ScoredChunk {
    let file_name = hit
        .file_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(&hit.file_path)
        .to_string();
    let extension = file_name
        .rsplit('.')
        .next()
        .filter(|e| *e != file_name)
        .unwrap_or("")
        .to_ascii_lowercase();

    ScoredChunk {
        id: hit.id.clone(),
        text: hit.text.clone(),
        file_path: hit.file_path.clone(),
        file_name,
        extension,
        chunk_index: hit.chunk_index,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_store::{KeywordDoc, VectorPoint};

    use sift_llm::provider::Message;

    #[derive(Debug, Clone)]
    struct AxisProvider {
        axis: usize,
        dims: usize,
    }

    impl LlmProvider for AxisProvider {
        fn name(&self) -> &'static str {
            "axis"
        }

        async fn complete(&self, _messages: &[Message]) -> sift_llm::error::Result<String> {
            Ok(String::new())
        }

        async fn embed(&self, _text: &str) -> sift_llm::error::Result<Vec<f32>> {
            let mut v = vec![0.0; self.dims];
            v[self.axis] = 1.0;
            Ok(v)
        }

        fn supports_embeddings(&self) -> bool {
            true
        }
    }

    fn payload(text: &str, path: &str, index: usize) -> std::collections::HashMap<String, serde_json::Value> {
        std::collections::HashMap::from([
            ("text".into(), serde_json::json!(text)),
            ("file_path".into(), serde_json::json!(path)),
            ("file_name".into(), serde_json::json!(path)),
            ("extension".into(), serde_json::json!("md")),
            ("chunk_index".into(), serde_json::json!(index)),
        ])
    }

    async fn stores(dir: &std::path::Path) -> (Arc<LocalVectorStore>, Arc<KeywordStore>) {
        let vector = Arc::new(LocalVectorStore::open(&dir.join("v")).unwrap());
        let keyword = Arc::new(KeywordStore::open(&dir.join("k")).unwrap());
        vector.ensure_dimension(3).await.unwrap();
        (vector, keyword)
    }

    #[tokio::test]
    async fn chunk_found_by_both_retrievers_ranked_first() {
        let dir = tempfile::tempdir().unwrap();
        let (vector, keyword) = stores(dir.path()).await;

        // "shared" matches the query vector weakly and the keyword query;
        // "vec-only" matches the vector strongly, "kw-only" only keywords.
        vector
            .upsert(vec![
                VectorPoint {
                    id: "vec-only".into(),
                    vector: vec![1.0, 0.0, 0.0],
                    payload: payload("semantic passage", "a.md", 0),
                },
                VectorPoint {
                    id: "shared".into(),
                    vector: vec![0.9, 0.1, 0.0],
                    payload: payload("database indexing guide", "b.md", 0),
                },
            ])
            .await
            .unwrap();
        keyword
            .add_batch(vec![
                KeywordDoc {
                    id: "shared".into(),
                    file_path: "b.md".into(),
                    chunk_index: 0,
                    text: "database indexing guide".into(),
                },
                KeywordDoc {
                    id: "kw-only".into(),
                    file_path: "c.md".into(),
                    chunk_index: 0,
                    text: "indexing deep dive".into(),
                },
            ])
            .await
            .unwrap();

        let retriever = HybridRetriever::new(
            vector,
            keyword,
            Arc::new(AxisProvider { axis: 0, dims: 3 }),
            RetrievalConfig {
                vector_min_score: 0.0,
                ..RetrievalConfig::default()
            },
        );

        let result = retriever.retrieve("indexing").await.unwrap();
        assert_eq!(result.chunks[0].id, "shared");
        let ids: Vec<&str> = result.chunks.iter().map(|c| c.id.as_str()).collect();
        assert!(ids.contains(&"vec-only"));
        assert!(ids.contains(&"kw-only"));
    }

    #[tokio::test]
    async fn min_score_prefilters_vector_hits() {
        let dir = tempfile::tempdir().unwrap();
        let (vector, keyword) = stores(dir.path()).await;

        vector
            .upsert(vec![
                VectorPoint {
                    id: "close".into(),
                    vector: vec![1.0, 0.0, 0.0],
                    payload: payload("close match", "a.md", 0),
                },
                VectorPoint {
                    id: "far".into(),
                    vector: vec![0.0, 1.0, 0.0],
                    payload: payload("orthogonal", "b.md", 0),
                },
            ])
            .await
            .unwrap();

        let retriever = HybridRetriever::new(
            vector,
            keyword,
            Arc::new(AxisProvider { axis: 0, dims: 3 }),
            RetrievalConfig {
                vector_min_score: 0.5,
                ..RetrievalConfig::default()
            },
        );

        let result = retriever.retrieve("anything").await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result.chunks[0].id, "close");
    }

    #[tokio::test]
    async fn results_truncated_to_hybrid_max() {
        let dir = tempfile::tempdir().unwrap();
        let (vector, keyword) = stores(dir.path()).await;

        let points = (0..8)
            .map(|i| VectorPoint {
                id: format!("p{i}"),
                vector: vec![1.0, 0.0, 0.0],
                payload: payload("text", "a.md", i),
            })
            .collect();
        vector.upsert(points).await.unwrap();

        let retriever = HybridRetriever::new(
            vector,
            keyword,
            Arc::new(AxisProvider { axis: 0, dims: 3 }),
            RetrievalConfig {
                vector_min_score: 0.0,
                hybrid_max_results: 3,
                ..RetrievalConfig::default()
            },
        );

        let result = retriever.retrieve("query").await.unwrap();
        assert_eq!(result.len(), 3);
    }

    #[tokio::test]
    async fn empty_stores_return_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let (vector, keyword) = stores(dir.path()).await;

        let retriever = HybridRetriever::new(
            vector,
            keyword,
            Arc::new(AxisProvider { axis: 0, dims: 3 }),
            RetrievalConfig::default(),
        );

        let result = retriever.retrieve("query").await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn keyword_only_hit_carries_derived_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let (vector, keyword) = stores(dir.path()).await;

        keyword
            .add_batch(vec![KeywordDoc {
                id: "k1".into(),
                file_path: "notes/topics.md".into(),
                chunk_index: 2,
                text: "rank fusion constants".into(),
            }])
            .await
            .unwrap();

        let retriever = HybridRetriever::new(
            vector,
            keyword,
            Arc::new(AxisProvider { axis: 0, dims: 3 }),
            RetrievalConfig::default(),
        );

        let result = retriever.retrieve("fusion").await.unwrap();
        assert_eq!(result.len(), 1);
        let chunk = &result.chunks[0];
        assert_eq!(chunk.file_name, "topics.md");
        assert_eq!(chunk.extension, "md");
        assert_eq!(chunk.chunk_index, 2);
    }
}
