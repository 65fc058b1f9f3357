//! Reciprocal rank fusion over the two retriever result lists.
//!
//! Rank-based, not score-based: each list contributes `1 / (k + rank)` with
//! 1-based ranks, contributions are summed per item, and ties break toward
//! the better vector rank.

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub(crate) struct FusedItem {
    pub id: String,
    pub score: f32,
}

/// Merge two ranked id lists.
///
/// An item near the top of either list surfaces near the top of the fused
/// list; an item in both outranks an item of similar rank in only one. The
/// constant `k` controls how steeply early ranks dominate.
pub(crate) fn reciprocal_rank_fusion(
    vector_ids: &[String],
    keyword_ids: &[String],
    k: usize,
) -> Vec<FusedItem> {
    #[allow(clippy::cast_precision_loss)]
    let k_param = k as f32;

    let mut scores: HashMap<&str, f32> = HashMap::new();
    let mut vector_rank: HashMap<&str, usize> = HashMap::new();

    for (rank, id) in vector_ids.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let contribution = 1.0 / (k_param + (rank + 1) as f32);
        *scores.entry(id.as_str()).or_insert(0.0) += contribution;
        vector_rank.entry(id.as_str()).or_insert(rank);
    }

    for (rank, id) in keyword_ids.iter().enumerate() {
        #[allow(clippy::cast_precision_loss)]
        let contribution = 1.0 / (k_param + (rank + 1) as f32);
        *scores.entry(id.as_str()).or_insert(0.0) += contribution;
    }

    let mut fused: Vec<(&str, f32)> = scores.into_iter().collect();
    fused.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                let ra = vector_rank.get(a.0).copied().unwrap_or(usize::MAX);
                let rb = vector_rank.get(b.0).copied().unwrap_or(usize::MAX);
                ra.cmp(&rb)
            })
            .then_with(|| a.0.cmp(b.0))
    });

    fused
        .into_iter()
        .map(|(id, score)| FusedItem {
            id: id.to_string(),
            score,
        })
        .collect()
}
