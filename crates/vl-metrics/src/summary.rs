//! End-of-run aggregation of recorded samples.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::sample::{Metric, MetricKind, Operation, Sample, Status};

/// Aggregate of one (metric, operation, status) series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub metric: &'static str,
    pub kind: MetricKind,
    pub operation: Operation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub p90: f64,
    pub p95: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSummary {
    pub series: Vec<SeriesSummary>,
}

impl MetricsSummary {
    pub fn from_samples(samples: &[Sample]) -> Self {
        let mut groups: BTreeMap<(Metric, Operation, Option<Status>), Vec<f64>> = BTreeMap::new();
        for s in samples {
            groups
                .entry((s.metric, s.tags.operation, s.tags.status))
                .or_default()
                .push(s.value);
        }

        let series = groups
            .into_iter()
            .map(|((metric, operation, status), mut values)| {
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                let count = values.len();
                let sum: f64 = values.iter().sum();
                SeriesSummary {
                    metric: metric.name(),
                    kind: metric.kind(),
                    operation,
                    status,
                    count,
                    sum,
                    min: values[0],
                    max: values[count - 1],
                    mean: sum / count as f64,
                    p90: percentile(&values, 0.90),
                    p95: percentile(&values, 0.95),
                }
            })
            .collect();

        Self { series }
    }

    pub fn get(&self, metric: Metric, operation: Operation, status: Option<Status>) -> Option<&SeriesSummary> {
        self.series
            .iter()
            .find(|s| s.metric == metric.name() && s.operation == operation && s.status == status)
    }

    /// Fraction of non-zero `vecload_errors` samples for an operation.
    pub fn error_rate(&self, operation: Operation) -> f64 {
        let (hits, total) = self
            .series
            .iter()
            .filter(|s| s.metric == Metric::Errors.name() && s.operation == operation)
            .fold((0.0, 0usize), |(h, t), s| (h + s.sum, t + s.count));
        if total == 0 {
            0.0
        } else {
            hits / total as f64
        }
    }
}

/// Nearest-rank percentile over sorted values.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}
