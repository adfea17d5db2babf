use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::sample::Sample;
use crate::summary::MetricsSummary;

/// Destination for samples. Implementations must accept pushes from many
/// tasks at once.
pub trait MetricsSink: Send + Sync {
    fn push(&self, sample: Sample);

    /// Called once when the run tears down.
    fn flush(&self) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetricsSink for NoopSink {
    fn push(&self, _sample: Sample) {}
}

/// Logs each sample through `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn push(&self, sample: Sample) {
        tracing::debug!(
            metric = sample.metric.name(),
            value = sample.value,
            operation = sample.tags.operation.as_str(),
            collection = %sample.tags.collection,
            status = sample.tags.status.map(|s| s.as_str()).unwrap_or("-"),
            "sample"
        );
    }
}

/// Forwards every sample to several sinks.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn MetricsSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn MetricsSink>>) -> Self {
        Self { sinks }
    }
}

impl MetricsSink for FanoutSink {
    fn push(&self, sample: Sample) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.push(sample.clone());
            }
            last.push(sample);
        }
    }

    fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}

/// In-process recorder: appends into a fixed number of shards so concurrent
/// producers rarely contend on the same lock.
pub struct MetricsRecorder {
    shards: Vec<Mutex<Vec<Sample>>>,
    next: AtomicUsize,
}

impl MetricsRecorder {
    pub fn new(shards: usize) -> Self {
        let shards = shards.max(1);
        Self {
            shards: (0..shards).map(|_| Mutex::new(Vec::new())).collect(),
            next: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all samples, ordered by time.
    pub fn snapshot(&self) -> Vec<Sample> {
        let mut all: Vec<Sample> = self.shards.iter().flat_map(|s| s.lock().clone()).collect();
        all.sort_by_key(|s| s.time);
        all
    }

    /// Take all samples, ordered by time, leaving the recorder empty.
    pub fn drain(&self) -> Vec<Sample> {
        let mut all: Vec<Sample> = Vec::with_capacity(self.len());
        for shard in &self.shards {
            all.append(&mut shard.lock());
        }
        all.sort_by_key(|s| s.time);
        all
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary::from_samples(&self.snapshot())
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new(16)
    }
}

impl MetricsSink for MetricsRecorder {
    fn push(&self, sample: Sample) {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.shards.len();
        self.shards[idx].lock().push(sample);
    }
}
