//! Per-project indexer registry with explicit lifecycle.
//!
//! One [`Engine`] per process owns every project's indexer; the registry
//! guarantees one writer per project and gives teardown a deterministic
//! order instead of relying on a runtime shutdown hook.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;

use sift_index::{
    HybridRetriever, IndexProgress, IntentGate, ProjectIndexer, RetrievalCoordinator,
    RetrievalResult,
};
use sift_llm::provider::{LlmProvider, Message};
use sift_store::StateTracker;

use crate::config::EngineConfig;

const SOURCE_TYPE_FILES: &str = "files";

pub struct Engine<P: LlmProvider> {
    config: EngineConfig,
    provider: Arc<P>,
    tracker: StateTracker,
    indexers: Mutex<HashMap<String, Arc<ProjectIndexer<P>>>>,
}

impl<P: LlmProvider + 'static> Engine<P> {
    /// Open the engine's data directory and tracker database.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the tracker database
    /// cannot be opened.
    pub async fn new(config: EngineConfig, provider: Arc<P>) -> anyhow::Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir).context("failed to create data dir")?;

        let db_path = config.data_dir.join("state.db");
        let db_path = db_path
            .to_str()
            .context("data dir path is not valid UTF-8")?;
        let tracker = StateTracker::new(db_path)
            .await
            .context("failed to open state tracker")?;

        Ok(Self {
            config,
            provider,
            tracker,
            indexers: Mutex::new(HashMap::new()),
        })
    }

    /// The project's indexer, created on first use. Long-lived: background
    /// workers run until [`Self::remove_project`] or [`Self::shutdown`].
    ///
    /// # Errors
    ///
    /// Returns an error for an unusable project id or if the project's
    /// stores cannot be opened.
    pub fn indexer(&self, project_id: &str) -> anyhow::Result<Arc<ProjectIndexer<P>>> {
        validate_project_id(project_id)?;

        let mut indexers = self
            .indexers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(existing) = indexers.get(project_id) {
            return Ok(Arc::clone(existing));
        }

        let indexer = Arc::new(ProjectIndexer::new(
            project_id,
            SOURCE_TYPE_FILES,
            self.project_index_dir(project_id),
            self.tracker.clone(),
            Arc::clone(&self.provider),
            self.config.index.clone(),
        )?);
        indexers.insert(project_id.to_string(), Arc::clone(&indexer));
        tracing::debug!(project = project_id, "indexer created");
        Ok(indexer)
    }

    /// Trigger asynchronous indexing for a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project's indexer cannot be created.
    pub fn ensure_indexed(
        &self,
        project_id: &str,
        paths: &[PathBuf],
        watch: bool,
    ) -> anyhow::Result<bool> {
        Ok(self.indexer(project_id)?.ensure_indexed(paths, watch))
    }

    /// Current indexing progress snapshot for a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the project's indexer cannot be created.
    pub fn index_progress(&self, project_id: &str) -> anyhow::Result<IndexProgress> {
        Ok(self.indexer(project_id)?.index_progress())
    }

    /// Wipe and rebuild a project's index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be cleared.
    pub async fn clear_and_reindex(
        &self,
        project_id: &str,
        paths: &[PathBuf],
        watch: bool,
    ) -> anyhow::Result<()> {
        self.indexer(project_id)?
            .clear_and_reindex(paths, watch)
            .await?;
        Ok(())
    }

    /// Ranked context for a message, empty when the intent gate declines or
    /// retrieval fails.
    ///
    /// # Errors
    ///
    /// Returns an error if the project's indexer cannot be created.
    pub async fn retrieve(
        &self,
        project_id: &str,
        message: &str,
        history: &[Message],
    ) -> anyhow::Result<RetrievalResult> {
        let coordinator = self.coordinator(project_id)?;
        Ok(coordinator.retrieve(message, history).await)
    }

    /// Build the gate + retriever composition over a project's stores.
    ///
    /// # Errors
    ///
    /// Returns an error if the project's indexer cannot be created.
    pub fn coordinator(&self, project_id: &str) -> anyhow::Result<RetrievalCoordinator<P>> {
        let indexer = self.indexer(project_id)?;
        let gate = IntentGate::new(Arc::clone(&self.provider), self.config.gate.clone());
        let retriever = HybridRetriever::new(
            indexer.vector_store(),
            indexer.keyword_store(),
            Arc::clone(&self.provider),
            self.config.retrieval.clone(),
        );
        Ok(RetrievalCoordinator::new(gate, retriever))
    }

    /// Stop a project's background work and drop it from the registry.
    pub fn remove_project(&self, project_id: &str) {
        let removed = self
            .indexers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(project_id);
        if let Some(indexer) = removed {
            indexer.stop();
            tracing::debug!(project = project_id, "indexer removed");
        }
    }

    /// Deterministic teardown of every project's background work.
    pub fn shutdown(&self) {
        let mut indexers = self
            .indexers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for (project, indexer) in indexers.drain() {
            indexer.stop();
            tracing::debug!(project = %project, "indexer stopped");
        }
    }

    fn project_index_dir(&self, project_id: &str) -> PathBuf {
        self.config.data_dir.join("projects").join(project_id)
    }
}

fn validate_project_id(project_id: &str) -> anyhow::Result<()> {
    if project_id.is_empty() {
        anyhow::bail!("project id must not be empty");
    }
    if project_id
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '.')
    {
        anyhow::bail!("project id must not contain path separators or dots");
    }
    Ok(())
}
