//! In-process [`VectorStore`] with exact flat search.
//!
//! Backs the runner's dry-run mode and the integration tests. Handles from
//! [`MemoryStore::connect`] share one backend, the way several virtual users
//! share one database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, ensure};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use vl_column::Column;
use vl_core::{CollectionSchema, DataType, IndexSpec, MetricType, SearchOptions};
use vl_query::{IdColumn, RawQueryResult};

use crate::distance;
use crate::filter::Filter;
use crate::store::{StoreTask, VectorStore, WriteAck};

const FIRST_AUTO_ID: i64 = 1;

struct StoredCollection {
    schema: CollectionSchema,
    rows: Vec<HashMap<String, Value>>,
    /// Integer key of each row: the primary key, or the row ordinal when the
    /// key is a string or the schema has none.
    keys: Vec<i64>,
    /// Dense vectors per vector field, row-aligned.
    vectors: HashMap<String, Vec<Vec<f32>>>,
    indexes: HashMap<String, IndexSpec>,
    loaded: bool,
    next_auto_id: i64,
}

impl StoredCollection {
    fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            keys: Vec::new(),
            vectors: HashMap::new(),
            indexes: HashMap::new(),
            loaded: false,
            next_auto_id: FIRST_AUTO_ID,
        }
    }

    fn metric_for(&self, field: &str) -> MetricType {
        self.indexes.get(field).map(|s| s.metric).unwrap_or_default()
    }
}

type Collections = Arc<RwLock<HashMap<String, StoredCollection>>>;

pub struct MemoryStore {
    collections: Collections,
    task_latency: Duration,
    closed: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: Arc::new(RwLock::new(HashMap::new())),
            task_latency: Duration::ZERO,
            closed: AtomicBool::new(false),
        }
    }

    /// Delay before index builds and loads report completion.
    pub fn with_task_latency(mut self, latency: Duration) -> Self {
        self.task_latency = latency;
        self
    }

    /// A new handle onto the same collections.
    pub fn connect(&self) -> Self {
        Self {
            collections: self.collections.clone(),
            task_latency: self.task_latency,
            closed: AtomicBool::new(false),
        }
    }

    /// Number of rows stored in `collection`.
    pub fn row_count(&self, collection: &str) -> Option<usize> {
        self.collections.read().get(collection).map(|c| c.rows.len())
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        ensure!(!self.closed.load(Ordering::SeqCst), "connection is closed");
        Ok(())
    }

    fn delayed(&self, apply: impl FnOnce(&mut StoredCollection) + Send + 'static, name: &str) -> StoreTask {
        let collections = self.collections.clone();
        let latency = self.task_latency;
        let name = name.to_string();
        Box::pin(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let mut guard = collections.write();
            let coll = guard
                .get_mut(&name)
                .ok_or_else(|| anyhow!("collection '{}' was dropped", name))?;
            apply(coll);
            Ok(())
        })
    }
}

fn missing(name: &str) -> anyhow::Error {
    anyhow!("collection '{}' does not exist", name)
}

#[async_trait]
impl VectorStore for MemoryStore {
    async fn create_collection(&self, schema: &CollectionSchema) -> anyhow::Result<()> {
        self.ensure_open()?;
        schema.validate()?;
        let mut collections = self.collections.write();
        ensure!(!collections.contains_key(&schema.name), "collection '{}' already exists", schema.name);
        collections.insert(schema.name.clone(), StoredCollection::new(schema.clone()));
        tracing::debug!(collection = %schema.name, "memory store: created collection");
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.collections.write().remove(name).ok_or_else(|| missing(name))?;
        Ok(())
    }

    async fn has_collection(&self, name: &str) -> anyhow::Result<bool> {
        self.ensure_open()?;
        Ok(self.collections.read().contains_key(name))
    }

    async fn describe_collection(&self, name: &str) -> anyhow::Result<Option<CollectionSchema>> {
        self.ensure_open()?;
        Ok(self.collections.read().get(name).map(|c| c.schema.clone()))
    }

    async fn load_collection(&self, name: &str) -> anyhow::Result<StoreTask> {
        self.ensure_open()?;
        if !self.collections.read().contains_key(name) {
            return Err(missing(name));
        }
        Ok(self.delayed(|c| c.loaded = true, name))
    }

    async fn release_collection(&self, name: &str) -> anyhow::Result<()> {
        self.ensure_open()?;
        let mut collections = self.collections.write();
        let coll = collections.get_mut(name).ok_or_else(|| missing(name))?;
        coll.loaded = false;
        Ok(())
    }

    async fn create_index(&self, collection: &str, field: &str, spec: &IndexSpec) -> anyhow::Result<StoreTask> {
        self.ensure_open()?;
        {
            let collections = self.collections.read();
            let coll = collections.get(collection).ok_or_else(|| missing(collection))?;
            let declared = coll
                .schema
                .field(field)
                .ok_or_else(|| anyhow!("field '{}' not found in '{}'", field, collection))?;
            ensure!(declared.data_type.is_vector(), "field '{}' is not a vector field", field);
        }
        let field = field.to_string();
        let spec = *spec;
        Ok(self.delayed(
            move |c| {
                c.indexes.insert(field, spec);
            },
            collection,
        ))
    }

    async fn write(&self, collection: &str, columns: &[Column]) -> anyhow::Result<WriteAck> {
        self.ensure_open()?;
        let mut collections = self.collections.write();
        let coll = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        let n = columns.first().map(Column::len).unwrap_or(0);
        ensure!(n > 0, "empty insert");
        for col in columns {
            ensure!(col.len() == n, "column '{}' has {} rows, expected {}", col.name(), col.len(), n);
            let field = coll
                .schema
                .field(col.name())
                .ok_or_else(|| anyhow!("field '{}' not found in '{}'", col.name(), collection))?;
            ensure!(
                col.data_type() == field.data_type,
                "field '{}' is {} but column is {}",
                field.name,
                field.data_type,
                col.data_type()
            );
            if field.data_type.is_dense_vector() || field.data_type == DataType::BinaryVector {
                ensure!(col.dim() == Some(field.dim()), "dimension mismatch for field '{}'", field.name);
            }
            ensure!(!field.is_auto_id, "field '{}' is auto-generated", field.name);
        }
        for field in coll.schema.fields.iter().filter(|f| !f.is_auto_id) {
            ensure!(
                columns.iter().any(|c| c.name() == field.name),
                "missing field '{}'",
                field.name
            );
        }

        let pk = coll.schema.primary_key().cloned();
        let base = coll.rows.len();
        let mut rows: Vec<HashMap<String, Value>> = vec![HashMap::new(); n];
        for col in columns {
            for (i, row) in rows.iter_mut().enumerate() {
                if let Some(v) = col.get(i) {
                    row.insert(col.name().to_string(), v);
                }
            }
            if col.data_type().is_dense_vector() {
                let store = coll.vectors.entry(col.name().to_string()).or_default();
                for i in 0..n {
                    store.push(col.vector_f32(i).unwrap_or_default());
                }
            }
        }

        let ids = match &pk {
            Some(f) if f.is_auto_id => {
                let start = coll.next_auto_id;
                coll.next_auto_id += n as i64;
                let ids: Vec<i64> = (start..start + n as i64).collect();
                for (row, id) in rows.iter_mut().zip(&ids) {
                    row.insert(f.name.clone(), Value::from(*id));
                }
                Some(IdColumn::Int64(ids))
            }
            Some(f) if f.data_type == DataType::VarChar => Some(IdColumn::VarChar(
                rows.iter()
                    .map(|r| r.get(&f.name).and_then(Value::as_str).unwrap_or_default().to_string())
                    .collect(),
            )),
            Some(f) => Some(IdColumn::Int64(
                rows.iter().map(|r| r.get(&f.name).and_then(Value::as_i64).unwrap_or_default()).collect(),
            )),
            None => Some(IdColumn::Int64((base..base + n).map(|i| i as i64).collect())),
        };

        match &ids {
            Some(IdColumn::Int64(v)) => coll.keys.extend_from_slice(v),
            _ => coll.keys.extend((base..base + n).map(|i| i as i64)),
        }
        coll.rows.extend(rows);

        Ok(WriteAck { insert_count: n as u64, ids })
    }

    async fn query(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        top_k: usize,
        options: &SearchOptions,
    ) -> anyhow::Result<Vec<RawQueryResult>> {
        self.ensure_open()?;
        ensure!(top_k > 0, "topk must be positive");
        let filter = options.expr.as_deref().map(Filter::parse).transpose()?;

        let collections = self.collections.read();
        let coll = collections.get(collection).ok_or_else(|| missing(collection))?;
        ensure!(coll.loaded, "collection '{}' is not loaded", collection);

        let field = coll
            .schema
            .field(&options.vector_field)
            .ok_or_else(|| anyhow!("field '{}' not found in '{}'", options.vector_field, collection))?;
        if !field.data_type.is_dense_vector() {
            bail!("search on {} field '{}' is not supported", field.data_type, field.name);
        }
        let metric = coll.metric_for(&field.name);
        let stored = coll.vectors.get(&field.name).map(Vec::as_slice).unwrap_or_default();

        let candidates: Vec<usize> = match &filter {
            Some(f) => (0..coll.rows.len()).filter(|&i| f.matches(&coll.rows[i])).collect(),
            None => (0..coll.rows.len()).collect(),
        };

        let varchar_pk = coll
            .schema
            .primary_key()
            .filter(|f| f.data_type == DataType::VarChar)
            .map(|f| f.name.as_str());

        let mut results = Vec::with_capacity(vectors.len());
        for query in vectors {
            ensure!(
                query.len() == field.dim(),
                "query vector has dimension {}, field '{}' expects {}",
                query.len(),
                field.name,
                field.dim()
            );
            let hits = distance::top_k(
                metric,
                query,
                candidates.iter().filter_map(|&i| stored.get(i).map(|v| (i, v.as_slice()))),
                top_k,
            );

            let ids = match varchar_pk {
                Some(pk) => IdColumn::VarChar(
                    hits.iter()
                        .map(|(i, _)| coll.rows[*i].get(pk).and_then(Value::as_str).unwrap_or_default().to_string())
                        .collect(),
                ),
                None => IdColumn::Int64(hits.iter().map(|(i, _)| coll.keys[*i]).collect()),
            };
            let mut result = RawQueryResult::new(ids, hits.iter().map(|(_, s)| *s).collect());
            for name in &options.output_fields {
                let Some(out) = coll.schema.field(name) else {
                    continue;
                };
                let values: Vec<Value> =
                    hits.iter().map(|(i, _)| coll.rows[*i].get(name).cloned().unwrap_or(Value::Null)).collect();
                result = result.with_field(Column::from_values(out, &values)?);
            }
            results.push(result);
        }
        Ok(results)
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
