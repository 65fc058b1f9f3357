//! Recursive file-system watching for incremental re-indexing.
//!
//! Debounced events land in a bounded channel consumed by one worker loop,
//! decoupling event arrival from event processing. The worker re-applies
//! the indexable predicate and the mtime check before doing any work, so a
//! noisy editor save storm stays cheap.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify_debouncer_mini::{DebouncedEventKind, new_debouncer};
use tokio::sync::mpsc;

use sift_llm::LlmProvider;

use crate::error::Result;
use crate::indexer::ProjectIndexer;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);

/// Handle to a running watch; aborting it releases the watcher.
#[derive(Debug)]
pub(crate) struct WatchHandle {
    handle: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    pub(crate) fn abort(&self) {
        self.handle.abort();
    }
}

/// Watch every root recursively and feed change/delete events into the
/// indexer. New subdirectories are covered by the recursive watch on the
/// root.
pub(crate) fn start<P: LlmProvider + 'static>(
    roots: Vec<PathBuf>,
    indexer: Arc<ProjectIndexer<P>>,
) -> Result<WatchHandle> {
    let (event_tx, mut event_rx) = mpsc::channel::<PathBuf>(EVENT_CHANNEL_CAPACITY);

    let mut debouncer = new_debouncer(
        DEBOUNCE_WINDOW,
        move |events: std::result::Result<
            Vec<notify_debouncer_mini::DebouncedEvent>,
            notify::Error,
        >| {
            let events = match events {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!("file watcher error: {e}");
                    return;
                }
            };

            let paths: HashSet<PathBuf> = events
                .into_iter()
                .filter(|e| e.kind == DebouncedEventKind::Any)
                .map(|e| e.path)
                .collect();

            for path in paths {
                if event_tx.blocking_send(path).is_err() {
                    // worker gone; watch is shutting down
                    return;
                }
            }
        },
    )?;

    for root in &roots {
        debouncer
            .watcher()
            .watch(root, notify::RecursiveMode::Recursive)?;
    }
    tracing::info!(roots = roots.len(), "file watching started");

    let handle = tokio::spawn(async move {
        let _debouncer = debouncer;
        while let Some(path) = event_rx.recv().await {
            if path.exists() {
                indexer.notify_file_changed(&path).await;
            } else {
                indexer.notify_file_removed(&path).await;
            }
        }
    });

    Ok(WatchHandle { handle })
}
