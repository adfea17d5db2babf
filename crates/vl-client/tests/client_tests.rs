//! End-to-end client behaviour against the in-memory store and scripted
//! store doubles.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use vl_client::distance;
use vl_client::{CancelToken, Client, MemoryStore, StoreTask, VectorStore, WriteAck};
use vl_column::{BatchRecord, Column};
use vl_core::{
    ground_truth_from_lists, CollectionSchema, ConnectionConfig, DataType, FieldSchema, IndexSpec, LoadError,
    MetricType, SearchOptions,
};
use vl_metrics::{Metric, MetricsRecorder, Operation, Status};
use vl_query::{IdColumn, RawQueryResult};

fn record(v: Value) -> BatchRecord {
    serde_json::from_value(v).unwrap()
}

fn client_for(store: Arc<dyn VectorStore>, config: ConnectionConfig) -> (Client, Arc<MetricsRecorder>) {
    let recorder = Arc::new(MetricsRecorder::new(4));
    (Client::new(store, &config, recorder.clone()), recorder)
}

fn memory_client() -> (Client, Arc<MetricsRecorder>) {
    client_for(Arc::new(MemoryStore::new()), ConnectionConfig::new("memory"))
}

fn error_samples(recorder: &MetricsRecorder, op: Operation) -> Vec<String> {
    recorder
        .snapshot()
        .into_iter()
        .filter(|s| s.metric == Metric::Errors && s.tags.operation == op && s.tags.status == Some(Status::Error))
        .map(|s| s.tags.extra.get("error").cloned().unwrap_or_default())
        .collect()
}

/// Store double with a fixed write acknowledgement.
struct ScriptedStore {
    ack: WriteAck,
    schema: Option<CollectionSchema>,
    fail: bool,
    written: Mutex<Vec<Column>>,
}

impl ScriptedStore {
    fn acking(ack: WriteAck) -> Self {
        Self { ack, schema: None, fail: false, written: Mutex::new(Vec::new()) }
    }

    fn failing() -> Self {
        Self { fail: true, ..Self::acking(WriteAck::default()) }
    }
}

#[async_trait]
impl VectorStore for ScriptedStore {
    async fn create_collection(&self, _schema: &CollectionSchema) -> anyhow::Result<()> {
        Ok(())
    }
    async fn drop_collection(&self, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn has_collection(&self, _name: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
    async fn describe_collection(&self, _name: &str) -> anyhow::Result<Option<CollectionSchema>> {
        Ok(self.schema.clone())
    }
    async fn load_collection(&self, _name: &str) -> anyhow::Result<StoreTask> {
        Ok(vl_client::store::ready_task())
    }
    async fn release_collection(&self, _name: &str) -> anyhow::Result<()> {
        Ok(())
    }
    async fn create_index(&self, _c: &str, _f: &str, _spec: &IndexSpec) -> anyhow::Result<StoreTask> {
        Ok(vl_client::store::ready_task())
    }
    async fn write(&self, _collection: &str, columns: &[Column]) -> anyhow::Result<WriteAck> {
        if self.fail {
            anyhow::bail!("store unavailable");
        }
        self.written.lock().extend_from_slice(columns);
        Ok(self.ack.clone())
    }
    async fn query(
        &self,
        _collection: &str,
        vectors: &[Vec<f32>],
        _top_k: usize,
        _options: &SearchOptions,
    ) -> anyhow::Result<Vec<RawQueryResult>> {
        if self.fail {
            anyhow::bail!("store unavailable");
        }
        Ok(vectors.iter().map(|_| RawQueryResult::new(IdColumn::Int64(vec![1]), vec![0.0])).collect())
    }
}

// ========== Round trip through the memory store ==========

fn catalog_schema() -> CollectionSchema {
    CollectionSchema::new("catalog")
        .with_field(FieldSchema::new("id", DataType::Int64).primary_key(true))
        .with_field(FieldSchema::new("title", DataType::VarChar).with_max_length(32))
        .with_field(FieldSchema::new("rating", DataType::Double))
        .with_field(FieldSchema::new("vector", DataType::FloatVector).with_dimension(4))
}

#[tokio::test]
async fn test_insert_index_load_search_with_recall() {
    let (client, recorder) = memory_client();
    client.create_collection(catalog_schema()).await.unwrap();

    let vectors: Vec<Vec<f32>> = (0..50).map(|i| vec![i as f32, (i % 7) as f32, 0.5, -(i as f32)]).collect();
    let titles: Vec<String> = (0..50).map(|i| format!("item-{}", i)).collect();
    let ratings: Vec<f64> = (0..50).map(|i| i as f64 / 10.0).collect();
    let ids = client
        .insert("catalog", &record(json!({"vector": vectors, "title": titles, "rating": ratings})))
        .await
        .unwrap();
    assert_eq!(ids, (1..=50).collect::<Vec<i64>>());

    client.create_index("catalog", "vector", &IndexSpec::hnsw(MetricType::L2)).await.unwrap();
    client.load_collection("catalog").await.unwrap();

    let queries: Vec<Vec<f32>> = vec![vec![3.2, 3.0, 0.5, -3.0], vec![40.1, 5.0, 0.4, -40.0]];
    let expected: Vec<Vec<i64>> = queries
        .iter()
        .map(|q| {
            let candidates = vectors.iter().map(Vec::as_slice).enumerate();
            distance::top_k(MetricType::L2, q, candidates, 5).into_iter().map(|(i, _)| ids[i]).collect()
        })
        .collect();
    let gt = ground_truth_from_lists(&expected);

    let options = SearchOptions::default().with_output_fields(["id", "title", "rating"]);
    let (hits, report) = client.search_with_recall("catalog", &queries, 5, &options, &gt).await.unwrap();
    assert_eq!(hits.counts(), vec![5, 5]);
    assert_eq!(hits.per_query(0)[0].id, 4);
    assert_eq!(hits.per_query(0)[0].fields["title"], json!("item-3"));
    assert_eq!(hits.per_query(0)[0].fields["rating"], json!(0.3));
    assert!(!hits.per_query(0)[0].fields.contains_key("id"));
    let report = report.unwrap();
    assert_eq!(report.recall, 1.0);
    assert_eq!(report.valid_queries, 2);

    let summary = recorder.summary();
    let recall = summary.get(Metric::Recall, Operation::SearchWithRecall, Some(Status::Success)).unwrap();
    assert_eq!(recall.mean, 1.0);
    let vectors_in = summary.get(Metric::Vectors, Operation::Insert, Some(Status::Success)).unwrap();
    assert_eq!(vectors_in.sum, 50.0);
    assert!(summary.get(Metric::DataSize, Operation::Insert, Some(Status::Success)).unwrap().sum > 0.0);
    assert_eq!(summary.error_rate(Operation::Search), 0.0);
}

#[tokio::test]
async fn test_second_handle_uses_described_schema() {
    let backend = MemoryStore::new();
    let (setup, _) = client_for(Arc::new(backend.connect()), ConnectionConfig::new("memory"));
    setup.create_collection(catalog_schema()).await.unwrap();

    let (vu, _) = client_for(Arc::new(backend.connect()), ConnectionConfig::new("memory"));
    let rec = record(json!({"vector": [[0.0, 0.0, 0.0, 0.0]], "title": ["a"], "rating": [1]}));
    assert_eq!(vu.insert("catalog", &rec).await.unwrap(), vec![1]);
    assert_eq!(vu.schema("catalog").await.unwrap().unwrap().name, "catalog");
}

#[tokio::test]
async fn test_insert_vectors_and_search_simple() {
    let (client, _) = memory_client();
    client.create_collection_simple("plain", 3).await.unwrap();
    let ids = client.insert_vectors("plain", &[vec![1.0, 0.0, 0.0], vec![0.0, 1.0, 0.0]]).await.unwrap();
    assert_eq!(ids, vec![1, 2]);
    client.load_collection("plain").await.unwrap();
    let hits = client.search_simple("plain", &[vec![0.0, 0.9, 0.0]], 1).await.unwrap();
    assert_eq!(hits.hits()[0].id, 2);

    client.release_collection("plain").await.unwrap();
    assert!(client.search_simple("plain", &[vec![0.0, 0.9, 0.0]], 1).await.is_err());
    client.drop_collection("plain").await.unwrap();
    assert!(!client.has_collection("plain").await.unwrap());
}

#[tokio::test]
async fn test_collection_from_json_definition() {
    let (client, _) = memory_client();
    let def = r#"{
        "name": "docs",
        "fields": [
            {"name": "pk", "dataType": "VarChar", "isPrimaryKey": true, "maxLength": 16},
            {"name": "emb", "dataType": "FloatVector", "dimension": 2}
        ]
    }"#;
    client.create_collection_from_json(def).await.unwrap();
    let ids = client
        .insert("docs", &record(json!({"pk": ["7", "8"], "emb": [[0.0, 1.0], [1.0, 0.0]]})))
        .await
        .unwrap();
    assert_eq!(ids, vec![7, 8]);
}

// ========== Insert acknowledgement ==========

#[tokio::test]
async fn test_count_mismatch_is_an_error() {
    let store = ScriptedStore::acking(WriteAck { insert_count: 2, ids: None });
    let (client, recorder) = client_for(Arc::new(store), ConnectionConfig::new("scripted"));
    let err = client
        .insert_vectors("c", &[vec![0.0], vec![1.0], vec![2.0]])
        .await
        .unwrap_err();
    assert!(matches!(err, LoadError::CountMismatch { expected: 3, got: 2 }));
    assert_eq!(error_samples(&recorder, Operation::Insert), vec!["count_mismatch"]);
    assert!(recorder.summary().get(Metric::Reqs, Operation::Insert, Some(Status::Success)).is_none());
}

#[tokio::test]
async fn test_positional_ids_without_store_ids() {
    let store = ScriptedStore::acking(WriteAck { insert_count: 3, ids: None });
    let (client, _) = client_for(Arc::new(store), ConnectionConfig::new("scripted"));
    let ids = client.insert_vectors("c", &[vec![0.0], vec![1.0], vec![2.0]]).await.unwrap();
    assert_eq!(ids, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_store_ids_are_surfaced() {
    let store = ScriptedStore::acking(WriteAck { insert_count: 2, ids: Some(IdColumn::Int64(vec![901, 902])) });
    let (client, _) = client_for(Arc::new(store), ConnectionConfig::new("scripted"));
    assert_eq!(client.insert_vectors("c", &[vec![0.0], vec![1.0]]).await.unwrap(), vec![901, 902]);
}

#[tokio::test]
async fn test_schemaless_insert_infers_columns() {
    let store = Arc::new(ScriptedStore::acking(WriteAck { insert_count: 2, ids: None }));
    let (client, _) = client_for(store.clone(), ConnectionConfig::new("scripted"));
    client
        .insert("c", &record(json!({"vector": [[0.1, 0.2], [0.3, 0.4]], "rating": [1, 2], "note": ["a", "b"]})))
        .await
        .unwrap();
    let written = store.written.lock();
    let types: Vec<(String, DataType)> = written.iter().map(|c| (c.name().to_string(), c.data_type())).collect();
    assert_eq!(
        types,
        vec![
            ("note".to_string(), DataType::VarChar),
            ("rating".to_string(), DataType::Int64),
            ("vector".to_string(), DataType::FloatVector),
        ]
    );
}

#[tokio::test]
async fn test_encoding_failure_is_recorded() {
    let (client, recorder) = memory_client();
    client.create_collection(catalog_schema()).await.unwrap();
    let bad = record(json!({"vector": [[0.0, 0.0, 0.0]], "title": ["a"], "rating": [1.0]}));
    let err = client.insert("catalog", &bad).await.unwrap_err();
    assert!(matches!(err, LoadError::InconsistentVectorDimension { expected: 4, got: 3, .. }));
    assert_eq!(error_samples(&recorder, Operation::Insert), vec!["inconsistent_vector_dimension"]);
}

// ========== Failure surfaces ==========

#[tokio::test]
async fn test_store_failure_is_connection_error() {
    let (client, recorder) = client_for(Arc::new(ScriptedStore::failing()), ConnectionConfig::new("scripted"));
    let err = client.search_simple("c", &[vec![0.0]], 3).await.unwrap_err();
    assert!(matches!(err, LoadError::Connection(_)));
    assert_eq!(error_samples(&recorder, Operation::Search), vec!["connection"]);
    assert_eq!(recorder.summary().error_rate(Operation::Search), 1.0);
}

#[tokio::test]
async fn test_query_dimension_checked_before_store() {
    let (client, recorder) = memory_client();
    client.create_collection_simple("c", 4).await.unwrap();
    let err = client.search_simple("c", &[vec![0.0; 4], vec![0.0; 3]], 1).await.unwrap_err();
    assert!(matches!(err, LoadError::InconsistentVectorDimension { row: 1, expected: 4, got: 3, .. }));
    assert_eq!(error_samples(&recorder, Operation::Search).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_load_times_out() {
    let store = MemoryStore::new().with_task_latency(Duration::from_secs(30));
    let config = ConnectionConfig { task_timeout: Some(Duration::from_millis(100)), ..ConnectionConfig::new("memory") };
    let (client, recorder) = client_for(Arc::new(store), config);
    client.create_collection_simple("slow", 2).await.unwrap();
    let err = client.load_collection("slow").await.unwrap_err();
    assert!(matches!(err, LoadError::TimedOut { ref operation, .. } if operation == "load_collection"));
    assert_eq!(error_samples(&recorder, Operation::LoadCollection), vec!["timed_out"]);
}

#[tokio::test(start_paused = true)]
async fn test_index_build_can_be_cancelled() {
    let store = MemoryStore::new().with_task_latency(Duration::from_secs(30));
    let config = ConnectionConfig { task_timeout: None, ..ConnectionConfig::new("memory") };
    let token = CancelToken::new();
    let (client, _) = client_for(Arc::new(store), config);
    let client = client.with_cancel(token.clone());
    client.create_collection_simple("c", 2).await.unwrap();

    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });
    let err = client.create_index("c", "vector", &IndexSpec::default()).await.unwrap_err();
    assert!(matches!(err, LoadError::Cancelled(_)));
    assert!(token.is_cancelled());
}

#[tokio::test]
async fn test_invalid_index_params() {
    let (client, recorder) = memory_client();
    client.create_collection_simple("c", 2).await.unwrap();
    let mut params = Map::new();
    params.insert("indexType".into(), json!("NOT_AN_INDEX"));
    let err = client.create_index_from_params("c", "vector", &params).await.unwrap_err();
    assert!(matches!(err, LoadError::InvalidIndex(_)));
    assert_eq!(error_samples(&recorder, Operation::CreateIndex), vec!["invalid_index"]);
}

#[tokio::test]
async fn test_invalid_schema_never_reaches_store() {
    let (client, _) = memory_client();
    let err = client.create_collection(CollectionSchema::new("empty")).await.unwrap_err();
    assert!(matches!(err, LoadError::Schema(_)));
    assert!(!client.has_collection("empty").await.unwrap());
}

#[tokio::test]
async fn test_recall_skipped_without_ground_truth() {
    let (client, recorder) = client_for(
        Arc::new(ScriptedStore::acking(WriteAck::default())),
        ConnectionConfig::new("scripted"),
    );
    let (hits, report) = client
        .search_with_recall("c", &[vec![0.0]], 1, &SearchOptions::default(), &[])
        .await
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(report.is_none());
    assert!(recorder.snapshot().iter().all(|s| s.metric != Metric::Recall));
}

#[tokio::test]
async fn test_connect_records_outcome() {
    let recorder = Arc::new(MetricsRecorder::new(1));
    let config = ConnectionConfig::new("db:19530");
    let client = Client::connect(&config, recorder.clone(), |_addr| async {
        Ok(Arc::new(MemoryStore::new()) as Arc<dyn VectorStore>)
    })
    .await
    .unwrap();
    assert_eq!(client.address(), "db:19530");

    let failed = Client::connect(&config, recorder.clone(), |addr| async move {
        Err::<Arc<dyn VectorStore>, _>(anyhow::anyhow!("dial {} refused", addr))
    })
    .await;
    assert!(matches!(failed, Err(LoadError::Connection(_))));

    let samples = recorder.drain();
    assert_eq!(samples[0].metric, Metric::Connections);
    assert_eq!(samples[1].metric, Metric::Errors);
    assert_eq!(samples[1].tags.extra["address"], "db:19530");
}

#[tokio::test]
async fn test_closed_client_rejects_calls() {
    let (client, _) = memory_client();
    client.close().await.unwrap();
    assert!(matches!(client.has_collection("x").await, Err(LoadError::Connection(_))));
}
