//! Indexing progress published as an atomically-swapped snapshot.
//!
//! A `tokio::sync::watch` channel holds the latest [`IndexProgress`] value;
//! every update replaces the whole snapshot, so readers never observe a
//! half-updated mix of status and counters.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexStatus {
    #[default]
    NotStarted,
    Indexing,
    Ready,
    Watching,
    Failed,
}

#[derive(Debug, Clone, Default)]
pub struct IndexProgress {
    pub status: IndexStatus,
    pub files_indexed: usize,
    pub files_total: usize,
    pub error: Option<String>,
}

#[derive(Debug)]
pub(crate) struct ProgressCell {
    tx: watch::Sender<IndexProgress>,
}

impl ProgressCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(IndexProgress::default());
        Self { tx }
    }

    pub(crate) fn snapshot(&self) -> IndexProgress {
        self.tx.borrow().clone()
    }

    pub(crate) fn status(&self) -> IndexStatus {
        self.tx.borrow().status
    }

    /// Replace the whole snapshot.
    pub(crate) fn set(&self, progress: IndexProgress) {
        self.tx.send_replace(progress);
    }

    /// Swap the status, keeping counters.
    pub(crate) fn set_status(&self, status: IndexStatus) {
        let mut next = self.snapshot();
        next.status = status;
        self.tx.send_replace(next);
    }

    pub(crate) fn set_counts(&self, files_indexed: usize, files_total: usize) {
        let mut next = self.snapshot();
        next.files_indexed = files_indexed;
        next.files_total = files_total;
        self.tx.send_replace(next);
    }

    pub(crate) fn fail(&self, error: String) {
        let mut next = self.snapshot();
        next.status = IndexStatus::Failed;
        next.error = Some(error);
        self.tx.send_replace(next);
    }

    pub(crate) fn reset(&self) {
        self.tx.send_replace(IndexProgress::default());
    }
}
