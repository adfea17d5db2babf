use std::sync::Arc;
use std::time::Duration;

use crate::sample::{Metric, Operation, Sample, Status, Tags};
use crate::sink::{MetricsSink, NoopSink};

/// Thin helper that turns call outcomes into tagged samples.
#[derive(Clone)]
pub struct MetricsEmitter {
    sink: Arc<dyn MetricsSink>,
}

impl MetricsEmitter {
    pub fn new(sink: Arc<dyn MetricsSink>) -> Self {
        Self { sink }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopSink))
    }

    pub fn sink(&self) -> &Arc<dyn MetricsSink> {
        &self.sink
    }

    pub fn emit(&self, metric: Metric, value: f64, tags: &Tags) {
        self.sink.push(Sample::new(metric, value, tags.clone()));
    }

    /// Successful request: reqs, duration, processed vectors and a zero error sample.
    pub fn request_ok(&self, tags: Tags, elapsed: Duration, vectors: usize) {
        let tags = tags.with_status(Status::Success);
        self.emit(Metric::Reqs, 1.0, &tags);
        self.emit(Metric::Duration, millis(elapsed), &tags);
        self.emit(Metric::Vectors, vectors as f64, &tags);
        self.emit(Metric::Errors, 0.0, &tags);
    }

    /// Failed request: an error sample and its duration.
    pub fn request_err(&self, tags: Tags, elapsed: Duration) {
        let tags = tags.with_status(Status::Error);
        self.emit(Metric::Errors, 1.0, &tags);
        self.emit(Metric::Duration, millis(elapsed), &tags);
    }

    /// Bytes written by a successful insert.
    pub fn data_size(&self, tags: Tags, bytes: usize) {
        self.emit(Metric::DataSize, bytes as f64, &tags.with_status(Status::Success));
    }

    pub fn recall(&self, tags: Tags, recall: f64) {
        self.emit(Metric::Recall, recall, &tags.with_status(Status::Success));
    }

    pub fn connection(&self, address: &str, ok: bool) {
        let tags = Tags::new(Operation::Connect, "").with("address", address);
        if ok {
            self.emit(Metric::Connections, 1.0, &tags.with_status(Status::Success));
        } else {
            self.emit(Metric::Errors, 1.0, &tags.with_status(Status::Error));
        }
    }

    pub fn flush(&self) {
        self.sink.flush();
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}
