//! Metric samples and sinks shared by every virtual user of a run.
//!
//! Components never reach for a global registry: a sink is created at run
//! start, passed to each client as `Arc<dyn MetricsSink>`, and drained once
//! at the end.

pub mod emitter;
pub mod sample;
pub mod sink;
pub mod summary;

pub use emitter::MetricsEmitter;
pub use sample::{Metric, MetricKind, Operation, Sample, Status, Tags};
pub use sink::{FanoutSink, MetricsRecorder, MetricsSink, NoopSink, TracingSink};
pub use summary::{MetricsSummary, SeriesSummary};

#[cfg(test)]
mod tests;
