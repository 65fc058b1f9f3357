//! Façade the chat pipeline calls: gate first, retrieve only on yes.

use sift_llm::provider::{LlmProvider, Message};

use crate::gate::IntentGate;
use crate::retriever::{HybridRetriever, RetrievalResult};

/// Pure composition of the intent gate and the hybrid retriever; holds no
/// state of its own.
pub struct RetrievalCoordinator<P: LlmProvider> {
    gate: IntentGate<P>,
    retriever: HybridRetriever<P>,
}

impl<P: LlmProvider + 'static> RetrievalCoordinator<P> {
    #[must_use]
    pub fn new(gate: IntentGate<P>, retriever: HybridRetriever<P>) -> Self {
        Self { gate, retriever }
    }

    /// Ranked context for a message, or an empty result when the gate says
    /// retrieval is not needed.
    ///
    /// Retrieval failures degrade to an empty result rather than surfacing
    /// to the chat pipeline.
    pub async fn retrieve(&self, message: &str, history: &[Message]) -> RetrievalResult {
        if !self.gate.should_retrieve(message, history).await {
            tracing::debug!("intent gate declined retrieval");
            return RetrievalResult::empty();
        }

        match self.retriever.retrieve(message).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("retrieval failed, returning empty context: {e}");
                RetrievalResult::empty()
            }
        }
    }
}
