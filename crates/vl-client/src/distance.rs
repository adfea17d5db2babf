//! Exact scoring for the in-memory store.
//!
//! Scores follow the store convention: L2 reports the squared distance
//! (smaller ranks first), IP and COSINE report a similarity (larger ranks
//! first).

use std::cmp::Ordering;

use ordered_float::OrderedFloat;
use vl_core::MetricType;

/// Score of `b` against `a` under `metric`, in one pass over both slices.
pub fn score(metric: MetricType, a: &[f32], b: &[f32]) -> f32 {
    let pairs = a.iter().zip(b);
    match metric {
        MetricType::L2 => pairs.fold(0.0, |acc, (x, y)| acc + (x - y).powi(2)),
        MetricType::Ip => pairs.fold(0.0, |acc, (x, y)| acc + x * y),
        MetricType::Cosine => {
            let (dot, aa, bb) =
                pairs.fold((0.0f32, 0.0f32, 0.0f32), |(d, na, nb), (x, y)| (d + x * y, na + x * x, nb + y * y));
            // Zero vectors have no direction.
            if aa == 0.0 || bb == 0.0 {
                0.0
            } else {
                dot / (aa.sqrt() * bb.sqrt())
            }
        }
    }
}

/// Ordering that puts the better of two scores first.
pub fn rank(metric: MetricType, a: f32, b: f32) -> Ordering {
    let (a, b) = (OrderedFloat(a), OrderedFloat(b));
    match metric {
        MetricType::L2 => a.cmp(&b),
        MetricType::Ip | MetricType::Cosine => b.cmp(&a),
    }
}

/// Indices of the `k` best-scoring candidates, best first.
pub fn top_k<'a>(
    metric: MetricType,
    query: &[f32],
    candidates: impl IntoIterator<Item = (usize, &'a [f32])>,
    k: usize,
) -> Vec<(usize, f32)> {
    let mut scored: Vec<(usize, f32)> = candidates
        .into_iter()
        .filter(|(_, v)| v.len() == query.len())
        .map(|(i, v)| (i, score(metric, query, v)))
        .collect();
    scored.sort_by(|a, b| rank(metric, a.1, b.1).then(a.0.cmp(&b.0)));
    scored.truncate(k);
    scored
}
