//! Recall@K against externally supplied ground truth.
//!
//! R@K for one query = |top-K ∩ relevant| / |relevant|. Queries whose ground
//! truth is empty are left out of the mean instead of counting as zero.

use serde::Serialize;
use vl_core::{GroundTruthSet, SearchHit};

use crate::decoder::DecodedHits;

/// Mean recall plus the per-query breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecallReport {
    pub recall: f64,
    /// `None` for queries without ground truth.
    pub per_query: Vec<Option<f64>>,
    pub valid_queries: usize,
}

impl RecallReport {
    fn from_per_query(per_query: Vec<Option<f64>>) -> Self {
        let valid: Vec<f64> = per_query.iter().flatten().copied().collect();
        let recall = if valid.is_empty() { 0.0 } else { valid.iter().sum::<f64>() / valid.len() as f64 };
        Self { recall, valid_queries: valid.len(), per_query }
    }
}

fn query_recall<'a>(hits: impl IntoIterator<Item = &'a SearchHit>, relevant: &GroundTruthSet) -> f64 {
    let found = hits.into_iter().filter(|h| relevant.contains(&h.id)).count();
    found as f64 / relevant.len() as f64
}

/// Recall over a flat hit list, assuming each query contributed `k` hits.
///
/// Query `i` is scored on `hits[i*k .. (i+1)*k]`, clamped to the list end. If
/// the store returned fewer than `k` hits for some query, later chunks are
/// misaligned; use [`recall_by_query`] when boundaries are known.
pub fn recall_at_k(hits: &[SearchHit], ground_truth: &[GroundTruthSet], k: usize, num_queries: usize) -> f64 {
    if hits.is_empty() || ground_truth.is_empty() || num_queries == 0 {
        return 0.0;
    }

    let per_query = ground_truth
        .iter()
        .take(num_queries)
        .enumerate()
        .map(|(i, relevant)| {
            if relevant.is_empty() {
                return None;
            }
            let start = (i * k).min(hits.len());
            let end = (start + k).min(hits.len());
            Some(query_recall(&hits[start..end], relevant))
        })
        .collect();

    RecallReport::from_per_query(per_query).recall
}

/// Recall using the decoder's per-query boundaries; only the first `k` hits
/// of each query count.
pub fn recall_by_query(decoded: &DecodedHits, ground_truth: &[GroundTruthSet], k: usize) -> RecallReport {
    let n = decoded.num_queries().min(ground_truth.len());
    let per_query = (0..n)
        .map(|i| {
            let relevant = &ground_truth[i];
            if relevant.is_empty() {
                return None;
            }
            Some(query_recall(decoded.per_query(i).iter().take(k), relevant))
        })
        .collect();

    let report = RecallReport::from_per_query(per_query);
    if ground_truth.len() != decoded.num_queries() {
        tracing::warn!(
            queries = decoded.num_queries(),
            ground_truth = ground_truth.len(),
            "ground truth does not cover every query"
        );
    }
    report
}
