use std::sync::Arc;
use std::time::Duration;

use crate::*;

fn emitter() -> (Arc<MetricsRecorder>, MetricsEmitter) {
    let recorder = Arc::new(MetricsRecorder::new(4));
    let emitter = MetricsEmitter::new(recorder.clone());
    (recorder, emitter)
}

#[test]
fn test_metric_names_and_kinds() {
    assert_eq!(Metric::Reqs.name(), "vecload_reqs");
    assert_eq!(Metric::Duration.kind(), MetricKind::Trend);
    assert_eq!(Metric::Errors.kind(), MetricKind::Rate);
    assert_eq!(Metric::Connections.kind(), MetricKind::Gauge);
    assert_eq!(Metric::Recall.kind(), MetricKind::Trend);
}

#[test]
fn test_request_ok_samples() {
    let (recorder, emitter) = emitter();
    emitter.request_ok(Tags::new(Operation::Insert, "c1"), Duration::from_millis(12), 100);
    let samples = recorder.drain();
    assert_eq!(samples.len(), 4);
    assert!(samples.iter().all(|s| s.tags.status == Some(Status::Success)));
    assert!(samples.iter().all(|s| s.tags.collection == "c1"));
    let vectors = samples.iter().find(|s| s.metric == Metric::Vectors).unwrap();
    assert_eq!(vectors.value, 100.0);
    let errors = samples.iter().find(|s| s.metric == Metric::Errors).unwrap();
    assert_eq!(errors.value, 0.0);
    assert!(recorder.is_empty());
}

#[test]
fn test_data_size_is_status_tagged() {
    let (recorder, emitter) = emitter();
    emitter.data_size(Tags::new(Operation::Insert, "c1"), 4096);
    let samples = recorder.drain();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].metric, Metric::DataSize);
    assert_eq!(samples[0].tags.status, Some(Status::Success));
    assert_eq!(samples[0].value, 4096.0);
}

#[test]
fn test_request_err_samples() {
    let (recorder, emitter) = emitter();
    emitter.request_err(Tags::new(Operation::Search, "c1").with("topk", 10), Duration::from_millis(3));
    let samples = recorder.snapshot();
    assert_eq!(samples.len(), 2);
    assert!(samples.iter().all(|s| s.tags.status == Some(Status::Error)));
    assert_eq!(samples[0].tags.extra["topk"], "10");
    assert!(!samples.iter().any(|s| s.metric == Metric::Reqs));
}

#[test]
fn test_summary_and_error_rate() {
    let (recorder, emitter) = emitter();
    for i in 0..3 {
        emitter.request_ok(Tags::new(Operation::Search, "c"), Duration::from_millis(10 * (i + 1)), 1);
    }
    emitter.request_err(Tags::new(Operation::Search, "c"), Duration::from_millis(1));
    emitter.recall(Tags::new(Operation::SearchWithRecall, "c"), 0.5);
    emitter.recall(Tags::new(Operation::SearchWithRecall, "c"), 1.0);

    let summary = recorder.summary();
    let reqs = summary.get(Metric::Reqs, Operation::Search, Some(Status::Success)).unwrap();
    assert_eq!(reqs.count, 3);
    assert_eq!(reqs.sum, 3.0);
    let dur = summary.get(Metric::Duration, Operation::Search, Some(Status::Success)).unwrap();
    assert!((dur.min - 10.0).abs() < 1e-9);
    assert!((dur.max - 30.0).abs() < 1e-9);
    assert!((summary.error_rate(Operation::Search) - 0.25).abs() < 1e-9);
    let recall = summary
        .get(Metric::Recall, Operation::SearchWithRecall, Some(Status::Success))
        .unwrap();
    assert!((recall.mean - 0.75).abs() < 1e-9);
    assert_eq!(summary.error_rate(Operation::Insert), 0.0);
}

#[test]
fn test_connection_gauge() {
    let (recorder, emitter) = emitter();
    emitter.connection("localhost:19530", true);
    emitter.connection("db:1", false);
    let samples = recorder.drain();
    assert_eq!(samples[0].metric, Metric::Connections);
    assert_eq!(samples[0].tags.extra["address"], "localhost:19530");
    assert_eq!(samples[1].metric, Metric::Errors);
}

#[test]
fn test_fanout_reaches_every_sink() {
    let a = Arc::new(MetricsRecorder::new(1));
    let b = Arc::new(MetricsRecorder::new(2));
    let sinks: Vec<Arc<dyn MetricsSink>> = vec![a.clone(), b.clone(), Arc::new(TracingSink)];
    let fanout = FanoutSink::new(sinks);
    fanout.push(Sample::new(Metric::Reqs, 1.0, Tags::new(Operation::Insert, "c")));
    fanout.flush();
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers() {
    let recorder = Arc::new(MetricsRecorder::new(8));
    let mut handles = Vec::new();
    for vu in 0..16 {
        let emitter = MetricsEmitter::new(recorder.clone());
        handles.push(tokio::spawn(async move {
            for _ in 0..50 {
                emitter.emit(Metric::Reqs, 1.0, &Tags::new(Operation::Search, format!("vu{}", vu)));
            }
        }));
    }
    for h in handles {
        h.await.unwrap();
    }
    assert_eq!(recorder.len(), 16 * 50);
    let summary = MetricsSummary::from_samples(&recorder.drain());
    assert_eq!(summary.get(Metric::Reqs, Operation::Search, None).unwrap().count, 800);
}
