//! BM25 keyword index over chunk documents.
//!
//! The persisted corpus (one JSON file under a `keyword/` sub-directory of
//! the project index) is the source of truth; the BM25 engine is rebuilt
//! from it on open and after deletes. Additions go through `upsert` so a
//! watcher re-index never duplicates a chunk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use bm25::{Document, Language, SearchEngineBuilder};
use serde::{Deserialize, Serialize};

use crate::error::Result;

const CORPUS_FILE: &str = "docs.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordDoc {
    pub id: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub id: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub text: String,
    pub score: f32,
}

struct Inner {
    docs: HashMap<String, KeywordDoc>,
    engine: bm25::SearchEngine<String>,
}

pub struct KeywordStore {
    path: PathBuf,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for KeywordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeywordStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn build_engine(docs: &HashMap<String, KeywordDoc>) -> bm25::SearchEngine<String> {
    let documents: Vec<Document<String>> = docs
        .values()
        .map(|d| Document {
            id: d.id.clone(),
            contents: d.text.clone(),
        })
        .collect();
    SearchEngineBuilder::<String>::with_documents(Language::English, documents).build()
}

impl KeywordStore {
    /// Open the store rooted at `dir`, loading an existing corpus if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or an existing
    /// corpus file cannot be read or parsed.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(CORPUS_FILE);

        let docs: HashMap<String, KeywordDoc> = if path.exists() {
            let raw = std::fs::read_to_string(&path)?;
            let list: Vec<KeywordDoc> = serde_json::from_str(&raw)?;
            list.into_iter().map(|d| (d.id.clone(), d)).collect()
        } else {
            HashMap::new()
        };

        let engine = build_engine(&docs);
        Ok(Self {
            path,
            inner: RwLock::new(Inner { docs, engine }),
        })
    }

    /// Add all chunks of one file in a single call, then flush the corpus.
    ///
    /// # Errors
    ///
    /// Returns an IO error from the flush.
    pub async fn add_batch(&self, docs: Vec<KeywordDoc>) -> Result<()> {
        if docs.is_empty() {
            return Ok(());
        }
        {
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            for doc in docs {
                inner.engine.upsert(Document {
                    id: doc.id.clone(),
                    contents: doc.text.clone(),
                });
                inner.docs.insert(doc.id.clone(), doc);
            }
        }
        self.persist().await
    }

    /// Rank documents for `query` by BM25 score, best first.
    #[must_use]
    pub fn search(&self, query: &str, limit: usize) -> Vec<KeywordHit> {
        let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        inner
            .engine
            .search(query, limit)
            .into_iter()
            .filter_map(|result| {
                let doc = inner.docs.get(&result.document.id)?;
                Some(KeywordHit {
                    id: doc.id.clone(),
                    file_path: doc.file_path.clone(),
                    chunk_index: doc.chunk_index,
                    text: doc.text.clone(),
                    score: result.score,
                })
            })
            .collect()
    }

    /// Remove every document for `file_path`, rebuild the engine, flush.
    /// Returns the count removed.
    ///
    /// # Errors
    ///
    /// Returns an IO error from the flush.
    pub async fn delete_by_path(&self, file_path: &str) -> Result<usize> {
        let removed = {
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            let before = inner.docs.len();
            inner.docs.retain(|_, d| d.file_path != file_path);
            let removed = before - inner.docs.len();
            if removed > 0 {
                let rebuilt = build_engine(&inner.docs);
                inner.engine = rebuilt;
                tracing::debug!(removed, file_path, "keyword corpus rebuilt after delete");
            }
            removed
        };
        if removed > 0 {
            self.persist().await?;
        }
        Ok(removed)
    }

    /// Remove all documents and delete the corpus file.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the corpus file cannot be removed.
    pub async fn clear(&self) -> Result<()> {
        {
            let mut inner = self.inner.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            inner.docs.clear();
            let rebuilt = build_engine(&inner.docs);
            inner.engine = rebuilt;
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
            .docs
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn persist(&self) -> Result<()> {
        let raw = {
            let inner = self.inner.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            let list: Vec<&KeywordDoc> = inner.docs.values().collect();
            serde_json::to_vec(&list)?
        };

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, raw).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
