//! Project indexing orchestrator: walk → chunk → embed → dual-write.
//!
//! One `ProjectIndexer` exclusively owns one project's vector store, keyword
//! store, tracker scope, and file watcher. Chat queries never wait on it;
//! they read whatever the stores currently hold.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use sift_llm::LlmProvider;
use sift_store::{KeywordDoc, KeywordStore, LocalVectorStore, StateTracker, VectorFilter, VectorPoint};

use crate::chunker;
use crate::config::IndexerConfig;
use crate::error::Result;
use crate::extract;
use crate::progress::{IndexProgress, IndexStatus, ProgressCell};
use crate::scan;
use crate::watcher::{self, WatchHandle};

/// Summary of one indexing run.
#[derive(Debug, Default)]
pub struct IndexReport {
    pub files_scanned: usize,
    pub files_indexed: usize,
    pub files_unchanged: usize,
    pub files_skipped: usize,
    pub chunks_created: usize,
    pub chunks_removed: usize,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

/// In-memory record of a file currently being watched.
#[derive(Debug, Clone)]
pub struct IndexedFileEntry {
    pub path: PathBuf,
    pub last_modified: SystemTime,
    pub indexed_at: SystemTime,
}

enum FileOutcome {
    Indexed(usize),
    Unchanged,
    Skipped,
}

pub struct ProjectIndexer<P: LlmProvider> {
    project_id: String,
    source_type: String,
    index_dir: PathBuf,
    vector: Arc<LocalVectorStore>,
    keyword: Arc<KeywordStore>,
    tracker: StateTracker,
    provider: Arc<P>,
    config: IndexerConfig,
    progress: ProgressCell,
    tracked: Mutex<HashMap<PathBuf, IndexedFileEntry>>,
    roots: Mutex<Vec<PathBuf>>,
    watch_task: Mutex<Option<WatchHandle>>,
    index_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl<P: LlmProvider> std::fmt::Debug for ProjectIndexer<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectIndexer")
            .field("project_id", &self.project_id)
            .field("index_dir", &self.index_dir)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider + 'static> ProjectIndexer<P> {
    /// Open (or create) the project's stores under `index_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if a store cannot be opened or the config is
    /// invalid.
    pub fn new(
        project_id: impl Into<String>,
        source_type: impl Into<String>,
        index_dir: PathBuf,
        tracker: StateTracker,
        provider: Arc<P>,
        config: IndexerConfig,
    ) -> Result<Self> {
        config.validate()?;
        let vector = Arc::new(LocalVectorStore::open(&index_dir)?);
        let keyword = Arc::new(KeywordStore::open(&index_dir.join("keyword"))?);

        Ok(Self {
            project_id: project_id.into(),
            source_type: source_type.into(),
            index_dir,
            vector,
            keyword,
            tracker,
            provider,
            config,
            progress: ProgressCell::new(),
            tracked: Mutex::new(HashMap::new()),
            roots: Mutex::new(Vec::new()),
            watch_task: Mutex::new(None),
            index_task: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    #[must_use]
    pub fn vector_store(&self) -> Arc<LocalVectorStore> {
        Arc::clone(&self.vector)
    }

    #[must_use]
    pub fn keyword_store(&self) -> Arc<KeywordStore> {
        Arc::clone(&self.keyword)
    }

    /// Current progress as an atomic snapshot.
    #[must_use]
    pub fn index_progress(&self) -> IndexProgress {
        self.progress.snapshot()
    }

    /// Trigger asynchronous indexing if not started.
    ///
    /// Idempotent while a run is in flight or complete; returns `false`
    /// only from the failed state, whose error stays readable via
    /// [`Self::index_progress`].
    pub fn ensure_indexed(self: &Arc<Self>, paths: &[PathBuf], watch: bool) -> bool {
        match self.progress.status() {
            IndexStatus::Failed => false,
            IndexStatus::Indexing | IndexStatus::Ready | IndexStatus::Watching => true,
            IndexStatus::NotStarted => {
                self.progress.set_status(IndexStatus::Indexing);
                let this = Arc::clone(self);
                let paths = paths.to_vec();
                let handle = tokio::spawn(async move {
                    if let Err(e) = this.run_index(&paths, watch).await {
                        tracing::error!(project = %this.project_id, "indexing failed: {e}");
                        this.progress.fail(e.to_string());
                    }
                });
                *self.index_task.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
                    Some(handle);
                true
            }
        }
    }

    /// Recovery path for a corrupted or stale index: stop watching, delete
    /// the on-disk index directory, clear tracked state, re-trigger.
    ///
    /// # Errors
    ///
    /// Returns an error if the index directory or tracker state cannot be
    /// cleared.
    pub async fn clear_and_reindex(self: &Arc<Self>, paths: &[PathBuf], watch: bool) -> Result<()> {
        self.stop_watching();
        if let Some(handle) = self
            .index_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }

        self.vector.clear().await?;
        self.keyword.clear().await?;
        match tokio::fs::remove_dir_all(&self.index_dir).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(self.index_dir.join("keyword")).await?;

        self.tracker
            .clear_project_source_state(&self.project_id, &self.source_type)
            .await?;
        self.tracked
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clear();
        self.progress.reset();

        tracing::info!(project = %self.project_id, "index cleared, reindexing");
        self.ensure_indexed(paths, watch);
        Ok(())
    }

    /// Stop the file watcher; in-flight indexing is unaffected.
    pub fn stop_watching(&self) {
        if let Some(handle) = self
            .watch_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        if self.progress.status() == IndexStatus::Watching {
            self.progress.set_status(IndexStatus::Ready);
        }
    }

    /// Stop all background work. In-flight indexing is best-effort on
    /// shutdown and may not complete cleanly.
    pub fn stop(&self) {
        self.stop_watching();
        if let Some(handle) = self
            .index_task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }

    async fn run_index(self: &Arc<Self>, paths: &[PathBuf], watch: bool) -> Result<()> {
        let start = std::time::Instant::now();
        let mut report = IndexReport::default();

        let probe = self.provider.embed("probe").await?;
        self.vector.ensure_dimension(probe.len()).await?;

        let mut work: Vec<(PathBuf, PathBuf)> = Vec::new();
        let mut dir_roots: Vec<PathBuf> = Vec::new();
        for path in paths {
            if path.is_file() {
                let root = path
                    .parent()
                    .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
                work.push((root, path.clone()));
            } else if path.is_dir() {
                for file in scan::collect_files(path, &self.config.scan) {
                    work.push((path.clone(), file));
                }
                dir_roots.push(path.clone());
            }
        }
        *self.roots.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = dir_roots.clone();

        let total = work.len();
        self.progress.set_counts(0, total);
        tracing::info!(project = %self.project_id, total, "indexing started");

        let known = self
            .tracker
            .get_all_hashes(&self.project_id, &self.source_type)
            .await?;

        let mut current: HashSet<String> = HashSet::new();
        let stride = self.config.progress_update_every.0;

        for (processed, (root, abs)) in work.iter().enumerate() {
            let rel = relative_key(root, abs);
            current.insert(rel.clone());
            report.files_scanned += 1;

            match self
                .index_file(abs, &rel, known.get(&rel).map(String::as_str))
                .await
            {
                Ok(FileOutcome::Indexed(chunks)) => {
                    report.files_indexed += 1;
                    report.chunks_created += chunks;
                    self.track_file(abs.clone());
                }
                Ok(FileOutcome::Unchanged) => {
                    report.files_unchanged += 1;
                    self.track_file(abs.clone());
                }
                Ok(FileOutcome::Skipped) => report.files_skipped += 1,
                Err(e) => {
                    tracing::warn!(file = %rel, "indexing file failed: {e}");
                    report.errors.push(format!("{rel}: {e}"));
                }
            }

            if (processed + 1) % stride == 0 {
                self.progress.set_counts(processed + 1, total);
            }
        }

        let tracked_paths = self
            .tracker
            .get_all_file_paths(&self.project_id, &self.source_type)
            .await?;
        let stale: Vec<String> = tracked_paths
            .into_iter()
            .filter(|p| !current.contains(p))
            .collect();
        for path in &stale {
            match self.remove_file_entries(path).await {
                Ok(removed) => report.chunks_removed += removed,
                Err(e) => report.errors.push(format!("cleanup {path}: {e}")),
            }
        }
        if !stale.is_empty() {
            self.tracker
                .remove_deleted(&self.project_id, &self.source_type, &stale)
                .await?;
        }

        self.progress.set_counts(total, total);
        report.duration_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        tracing::info!(
            project = %self.project_id,
            files_indexed = report.files_indexed,
            files_unchanged = report.files_unchanged,
            chunks_created = report.chunks_created,
            chunks_removed = report.chunks_removed,
            errors = report.errors.len(),
            duration_ms = report.duration_ms,
            "indexing complete"
        );

        if watch && !dir_roots.is_empty() {
            let handle = watcher::start(dir_roots, Arc::clone(self))?;
            *self.watch_task.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
                Some(handle);
            self.progress.set_status(IndexStatus::Watching);
        } else {
            self.progress.set_status(IndexStatus::Ready);
        }

        Ok(())
    }

    /// Index one file unless its content hash matches the tracked hash.
    /// Stale entries for a changed file are removed before the re-add.
    async fn index_file(
        &self,
        abs: &Path,
        rel: &str,
        known_hash: Option<&str>,
    ) -> Result<FileOutcome> {
        let meta = tokio::fs::metadata(abs).await?;
        if meta.len() > self.config.scan.max_file_bytes {
            tracing::debug!(file = %rel, bytes = meta.len(), "skipping oversized file");
            return Ok(FileOutcome::Skipped);
        }

        let bytes = tokio::fs::read(abs).await?;
        let hash = blake3::hash(&bytes).to_hex().to_string();

        match known_hash {
            Some(known) if known == hash => return Ok(FileOutcome::Unchanged),
            Some(_) => {
                self.remove_file_entries(rel).await?;
            }
            None => {}
        }

        let text = extract::extract_text(abs, self.config.scan.max_file_bytes).await?;

        let file_name = rel.rsplit(['/', '\\']).next().unwrap_or(rel);
        let extension = file_name
            .rsplit('.')
            .next()
            .filter(|e| *e != file_name)
            .unwrap_or("");
        let header = extract::identity_header(rel, file_name, extension);
        let full = format!("{header}{text}");

        let chunks = chunker::chunk_file(&self.project_id, &full, rel, &self.config.chunker);

        let mut points = Vec::with_capacity(chunks.len());
        let mut docs = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = match self.provider.embed(&chunk.text).await {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(
                        file = %rel,
                        chunk = chunk.chunk_index,
                        "embedding failed, chunk omitted: {e}"
                    );
                    continue;
                }
            };
            points.push(VectorPoint {
                id: chunk.id.clone(),
                vector,
                payload: chunk_payload(chunk),
            });
            docs.push(KeywordDoc {
                id: chunk.id.clone(),
                file_path: chunk.file_path.clone(),
                chunk_index: chunk.chunk_index,
                text: chunk.text.clone(),
            });
        }

        let created = points.len();
        self.vector.upsert(points).await?;
        self.keyword.add_batch(docs).await?;
        self.tracker
            .save_hash(&self.project_id, &self.source_type, rel, &hash)
            .await?;

        tracing::debug!(file = %rel, created, "file indexed");
        Ok(FileOutcome::Indexed(created))
    }

    async fn remove_file_entries(&self, rel: &str) -> Result<usize> {
        let removed = self
            .vector
            .delete_by_filter(&VectorFilter::field_text("file_path", rel))
            .await?;
        self.keyword.delete_by_path(rel).await?;
        Ok(removed)
    }

    /// Re-index one changed (or created) file. Entry point for the watcher
    /// worker; also callable by embedders that track changes themselves.
    pub async fn notify_file_changed(&self, abs: &Path) {
        let Some(root) = self.resolve_root(abs) else {
            return;
        };
        let rel = relative_key(&root, abs);

        let project_excludes = scan::detect_project_excludes(&root);
        let rel_path = abs.strip_prefix(&root).unwrap_or(abs);
        if !scan::is_indexable(rel_path, &self.config.scan, &project_excludes) {
            return;
        }

        let Ok(meta) = tokio::fs::metadata(abs).await else {
            return;
        };
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        let unchanged = {
            let tracked = self
                .tracked
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            tracked
                .get(abs)
                .is_some_and(|entry| entry.last_modified >= modified)
        };
        if unchanged {
            return;
        }

        let known = self
            .tracker
            .get_hash(&self.project_id, &self.source_type, &rel)
            .await
            .ok()
            .flatten();
        let is_new = known.is_none();

        match self.index_file(abs, &rel, known.as_deref()).await {
            Ok(FileOutcome::Indexed(chunks)) => {
                self.track_file(abs.to_path_buf());
                if is_new {
                    self.bump_counts(1, 1);
                }
                tracing::info!(file = %rel, chunks, "watch update indexed");
            }
            Ok(FileOutcome::Unchanged) => self.track_file(abs.to_path_buf()),
            Ok(FileOutcome::Skipped) => {}
            Err(e) => tracing::warn!(file = %rel, "watch update failed: {e}"),
        }
    }

    /// Drop a removed file's chunks and tracked state. Entry point for the
    /// watcher worker. A directory path drops everything beneath it.
    pub async fn notify_file_removed(&self, abs: &Path) {
        let Some(root) = self.resolve_root(abs) else {
            return;
        };

        // The event path may be a file or a deleted directory; collect every
        // tracked entry at or under it.
        let affected: Vec<PathBuf> = {
            let tracked = self
                .tracked
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            tracked
                .keys()
                .filter(|p| *p == abs || p.starts_with(abs))
                .cloned()
                .collect()
        };
        if affected.is_empty() {
            return;
        }

        let mut removed_rels = Vec::with_capacity(affected.len());
        for path in &affected {
            let rel = relative_key(&root, path);
            if let Err(e) = self.remove_file_entries(&rel).await {
                tracing::warn!(file = %rel, "removing index entries failed: {e}");
                continue;
            }
            removed_rels.push(rel);
        }

        if let Err(e) = self
            .tracker
            .remove_deleted(&self.project_id, &self.source_type, &removed_rels)
            .await
        {
            tracing::warn!("removing tracked state failed: {e}");
        }

        {
            let mut tracked = self
                .tracked
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for path in &affected {
                tracked.remove(path);
            }
        }
        #[allow(clippy::cast_possible_wrap)]
        self.bump_counts(-(removed_rels.len() as i64), -(removed_rels.len() as i64));
        tracing::info!(removed = removed_rels.len(), "watch delete applied");
    }

    fn resolve_root(&self, abs: &Path) -> Option<PathBuf> {
        self.roots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .iter()
            .find(|root| abs.starts_with(root))
            .cloned()
    }

    fn track_file(&self, abs: PathBuf) {
        let modified = std::fs::metadata(&abs)
            .and_then(|m| m.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        let entry = IndexedFileEntry {
            path: abs.clone(),
            last_modified: modified,
            indexed_at: SystemTime::now(),
        };
        self.tracked
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(abs, entry);
    }

    fn bump_counts(&self, total_delta: i64, indexed_delta: i64) {
        let snapshot = self.progress.snapshot();
        let apply = |value: usize, delta: i64| {
            if delta >= 0 {
                value.saturating_add(usize::try_from(delta).unwrap_or(0))
            } else {
                value.saturating_sub(usize::try_from(-delta).unwrap_or(0))
            }
        };
        self.progress.set_counts(
            apply(snapshot.files_indexed, indexed_delta),
            apply(snapshot.files_total, total_delta),
        );
    }
}

fn relative_key(root: &Path, abs: &Path) -> String {
    abs.strip_prefix(root)
        .unwrap_or(abs)
        .to_string_lossy()
        .replace('\\', "/")
}

fn chunk_payload(chunk: &chunker::Chunk) -> HashMap<String, serde_json::Value> {
    HashMap::from([
        ("text".into(), serde_json::json!(chunk.text)),
        ("file_path".into(), serde_json::json!(chunk.file_path)),
        ("file_name".into(), serde_json::json!(chunk.file_name)),
        ("extension".into(), serde_json::json!(chunk.extension)),
        ("chunk_index".into(), serde_json::json!(chunk.chunk_index)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use sift_llm::mock::MockProvider;

    async fn indexer(
        dir: &Path,
        provider: MockProvider,
    ) -> Arc<ProjectIndexer<MockProvider>> {
        let tracker = StateTracker::new(":memory:").await.unwrap();
        Arc::new(
            ProjectIndexer::new(
                "p1",
                "files",
                dir.join("index"),
                tracker,
                Arc::new(provider),
                IndexerConfig::default(),
            )
            .unwrap(),
        )
    }

    fn embed_provider() -> MockProvider {
        MockProvider::default().with_embeddings(vec![0.1, 0.2, 0.3])
    }

    async fn wait_until_settled(idx: &Arc<ProjectIndexer<MockProvider>>) -> IndexProgress {
        for _ in 0..200 {
            let p = idx.index_progress();
            match p.status {
                IndexStatus::Indexing | IndexStatus::NotStarted => {
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                }
                _ => return p,
            }
        }
        idx.index_progress()
    }

    #[tokio::test]
    async fn indexes_directory_and_reaches_ready() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "alpha ".repeat(30)).unwrap();
        std::fs::write(docs.join("b.md"), "beta ".repeat(30)).unwrap();

        let idx = indexer(dir.path(), embed_provider()).await;
        assert!(idx.ensure_indexed(&[docs], false));

        let progress = wait_until_settled(&idx).await;
        assert_eq!(progress.status, IndexStatus::Ready);
        assert_eq!(progress.files_total, 2);
        assert_eq!(progress.files_indexed, 2);
        // short files chunk to exactly one chunk each
        assert_eq!(idx.vector_store().len(), 2);
        assert_eq!(idx.keyword_store().len(), 2);
    }

    #[tokio::test]
    async fn ensure_indexed_idempotent_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "content").unwrap();

        let idx = indexer(dir.path(), embed_provider()).await;
        assert!(idx.ensure_indexed(&[docs.clone()], false));
        assert!(idx.ensure_indexed(&[docs.clone()], false));

        let progress = wait_until_settled(&idx).await;
        assert_eq!(progress.status, IndexStatus::Ready);
        assert!(idx.ensure_indexed(&[docs], false));
    }

    #[tokio::test]
    async fn embed_failure_on_probe_fails_indexer() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "content").unwrap();

        // provider without embedding support: probe fails, run fails
        let idx = indexer(dir.path(), MockProvider::default()).await;
        assert!(idx.ensure_indexed(&[docs.clone()], false));

        let progress = wait_until_settled(&idx).await;
        assert_eq!(progress.status, IndexStatus::Failed);
        assert!(progress.error.is_some());

        // failed state reports failure and keeps the stored error
        assert!(!idx.ensure_indexed(&[docs], false));
    }

    #[tokio::test]
    async fn single_file_path_indexed_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("note.md");
        std::fs::write(&file, "a single note file").unwrap();

        let idx = indexer(dir.path(), embed_provider()).await;
        assert!(idx.ensure_indexed(&[file], false));

        let progress = wait_until_settled(&idx).await;
        assert_eq!(progress.status, IndexStatus::Ready);
        assert_eq!(progress.files_indexed, 1);
        assert_eq!(idx.vector_store().len(), 1);
    }

    #[tokio::test]
    async fn oversized_single_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("big.md");
        std::fs::write(&file, "x".repeat(4096)).unwrap();

        let tracker = StateTracker::new(":memory:").await.unwrap();
        let mut config = IndexerConfig::default();
        config.scan.max_file_bytes = 100;
        let idx = Arc::new(
            ProjectIndexer::new(
                "p1",
                "files",
                dir.path().join("index"),
                tracker,
                Arc::new(embed_provider()),
                config,
            )
            .unwrap(),
        );

        assert!(idx.ensure_indexed(&[file], false));
        let progress = wait_until_settled(&idx).await;
        assert_eq!(progress.status, IndexStatus::Ready);
        assert!(idx.vector_store().is_empty());
    }

    #[tokio::test]
    async fn clear_and_reindex_resets_and_rebuilds() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "alpha text").unwrap();

        let idx = indexer(dir.path(), embed_provider()).await;
        idx.ensure_indexed(&[docs.clone()], false);
        wait_until_settled(&idx).await;
        assert_eq!(idx.vector_store().len(), 1);

        std::fs::write(docs.join("b.md"), "beta text").unwrap();
        idx.clear_and_reindex(&[docs], false).await.unwrap();

        let progress = wait_until_settled(&idx).await;
        assert_eq!(progress.status, IndexStatus::Ready);
        assert_eq!(idx.vector_store().len(), 2);
        assert_eq!(idx.keyword_store().len(), 2);
    }

    #[tokio::test]
    async fn deleted_file_cleaned_up_on_reindex() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        std::fs::write(docs.join("a.md"), "alpha text").unwrap();
        std::fs::write(docs.join("b.md"), "beta text").unwrap();

        let tracker = StateTracker::new(":memory:").await.unwrap();
        let provider = Arc::new(embed_provider());
        let idx = Arc::new(
            ProjectIndexer::new(
                "p1",
                "files",
                dir.path().join("index"),
                tracker.clone(),
                Arc::clone(&provider),
                IndexerConfig::default(),
            )
            .unwrap(),
        );
        idx.ensure_indexed(&[docs.clone()], false);
        wait_until_settled(&idx).await;
        assert_eq!(idx.vector_store().len(), 2);

        // a fresh indexer over the same stores sees b.md gone
        std::fs::remove_file(docs.join("b.md")).unwrap();
        let idx2 = Arc::new(
            ProjectIndexer::new(
                "p1",
                "files",
                dir.path().join("index"),
                tracker.clone(),
                provider,
                IndexerConfig::default(),
            )
            .unwrap(),
        );
        idx2.ensure_indexed(&[docs], false);
        wait_until_settled(&idx2).await;

        assert_eq!(idx2.vector_store().len(), 1);
        let paths = tracker.get_all_file_paths("p1", "files").await.unwrap();
        assert_eq!(paths, vec!["a.md".to_string()]);
    }

    #[tokio::test]
    async fn notify_change_and_remove_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        std::fs::create_dir_all(&docs).unwrap();
        let file = docs.join("a.md");
        std::fs::write(&file, "first version").unwrap();

        let idx = indexer(dir.path(), embed_provider()).await;
        idx.ensure_indexed(&[docs], false);
        wait_until_settled(&idx).await;
        assert_eq!(idx.keyword_store().len(), 1);

        std::fs::write(&file, "second version rewritten").unwrap();
        idx.notify_file_changed(&file).await;
        assert_eq!(idx.keyword_store().len(), 1);
        let hits = idx.keyword_store().search("rewritten", 5);
        assert_eq!(hits.len(), 1);

        idx.notify_file_removed(&file).await;
        assert!(idx.keyword_store().is_empty());
        assert!(idx.vector_store().is_empty());
        assert_eq!(idx.index_progress().files_total, 0);
    }
}
