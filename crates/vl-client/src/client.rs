//! The harness-facing client: one per virtual user.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use vl_column::{BatchRecord, Column, ColumnData, ColumnEncoder};
use vl_core::{
    CollectionSchema, ConnectionConfig, DataType, GroundTruthSet, IndexSpec, LoadError, Result, SearchOptions,
};
use vl_metrics::{MetricsEmitter, MetricsSink, Operation, Tags};
use vl_query::{DecodedHits, RecallReport};

use crate::call::{CallContext, CancelToken};
use crate::insert;
use crate::search::{self, SearchRequest};
use crate::store::VectorStore;

pub struct Client {
    store: Arc<dyn VectorStore>,
    metrics: MetricsEmitter,
    ctx: CallContext,
    address: String,
    schemas: RwLock<HashMap<String, Arc<CollectionSchema>>>,
}

impl Client {
    /// Wrap an already-connected store handle.
    pub fn new(store: Arc<dyn VectorStore>, config: &ConnectionConfig, sink: Arc<dyn MetricsSink>) -> Self {
        let address = config.resolved_address();
        let metrics = MetricsEmitter::new(sink);
        metrics.connection(&address, true);
        tracing::info!(address = %address, "client connected");
        Self {
            store,
            metrics,
            ctx: CallContext::from_config(config),
            address,
            schemas: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve the address, open a store handle with `open`, and record the
    /// attempt as a connection sample.
    pub async fn connect<F, Fut>(config: &ConnectionConfig, sink: Arc<dyn MetricsSink>, open: F) -> Result<Self>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = anyhow::Result<Arc<dyn VectorStore>>>,
    {
        let address = config.resolved_address();
        let ctx = CallContext::from_config(config);
        match ctx.request("connect", open(address.clone())).await {
            Ok(store) => Ok(Self::new(store, config, sink)),
            Err(e) => {
                MetricsEmitter::new(sink).connection(&address, false);
                tracing::error!(address = %address, error = %e, "connection failed");
                Err(e)
            }
        }
    }

    /// Share `token` so an external caller can cancel in-flight calls.
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.ctx = self.ctx.with_cancel(token);
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn context(&self) -> &CallContext {
        &self.ctx
    }

    pub fn metrics(&self) -> &MetricsEmitter {
        &self.metrics
    }

    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    pub async fn close(&self) -> Result<()> {
        let res = self.ctx.request("close", self.store.close()).await;
        self.metrics.flush();
        res
    }

    async fn observed<T, F>(&self, operation: Operation, collection: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let tags = Tags::new(operation, collection);
        let start = Instant::now();
        match fut.await {
            Ok(v) => {
                self.metrics.request_ok(tags, start.elapsed(), 0);
                Ok(v)
            }
            Err(e) => {
                self.metrics.request_err(tags.with("error", e.kind()), start.elapsed());
                tracing::warn!(operation = operation.as_str(), collection, error = %e, "store call failed");
                Err(e)
            }
        }
    }

    // ========== Collections ==========

    pub async fn create_collection(&self, schema: CollectionSchema) -> Result<()> {
        let name = schema.name.clone();
        self.observed(Operation::CreateCollection, &name, async {
            schema.validate()?;
            self.ctx.request("create_collection", self.store.create_collection(&schema)).await?;
            tracing::info!(collection = %schema.name, fields = schema.fields.len(), "collection created");
            self.schemas.write().insert(schema.name.clone(), Arc::new(schema));
            Ok(())
        })
        .await
    }

    pub async fn create_collection_from_json(&self, json: &str) -> Result<()> {
        self.create_collection(CollectionSchema::from_json(json)?).await
    }

    /// Collection with an auto-id `id` key and a `vector` field of `dim`.
    pub async fn create_collection_simple(&self, name: &str, dim: usize) -> Result<()> {
        self.create_collection(CollectionSchema::simple(name, dim)).await
    }

    pub async fn drop_collection(&self, name: &str) -> Result<()> {
        self.observed(Operation::DropCollection, name, async {
            self.ctx.request("drop_collection", self.store.drop_collection(name)).await?;
            self.schemas.write().remove(name);
            Ok(())
        })
        .await
    }

    pub async fn has_collection(&self, name: &str) -> Result<bool> {
        self.ctx.request("has_collection", self.store.has_collection(name)).await
    }

    /// Blocks until the store reports the collection loaded.
    pub async fn load_collection(&self, name: &str) -> Result<()> {
        self.observed(Operation::LoadCollection, name, async {
            let task = self.ctx.request("load_collection", self.store.load_collection(name)).await?;
            self.ctx.task("load_collection", task).await
        })
        .await
    }

    pub async fn release_collection(&self, name: &str) -> Result<()> {
        self.observed(Operation::ReleaseCollection, name, async {
            self.ctx.request("release_collection", self.store.release_collection(name)).await
        })
        .await
    }

    /// Cached schema, falling back to asking the store.
    pub async fn schema(&self, collection: &str) -> Result<Option<Arc<CollectionSchema>>> {
        let cached = self.schemas.read().get(collection).cloned();
        if cached.is_some() {
            return Ok(cached);
        }
        let described = self
            .ctx
            .request("describe_collection", self.store.describe_collection(collection))
            .await?;
        Ok(described.map(|schema| {
            let schema = Arc::new(schema);
            self.schemas.write().insert(collection.to_string(), schema.clone());
            schema
        }))
    }

    async fn schema_or_none(&self, collection: &str) -> Option<Arc<CollectionSchema>> {
        match self.schema(collection).await {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(collection, error = %e, "schema lookup failed");
                None
            }
        }
    }

    // ========== Indexes ==========

    /// Blocks until the index build finishes.
    pub async fn create_index(&self, collection: &str, field: &str, spec: &IndexSpec) -> Result<()> {
        self.observed(Operation::CreateIndex, collection, async {
            let task = self.ctx.request("create_index", self.store.create_index(collection, field, spec)).await?;
            self.ctx.task("create_index", task).await?;
            tracing::info!(
                collection,
                field,
                index_type = spec.kind.as_str(),
                metric = spec.metric.as_str(),
                "index built"
            );
            Ok(())
        })
        .await
    }

    /// Index from loose `indexType` / `metricType` / `params` options.
    pub async fn create_index_from_params(&self, collection: &str, field: &str, params: &Map<String, Value>) -> Result<()> {
        let spec = match IndexSpec::from_params(params) {
            Ok(spec) => spec,
            Err(e) => {
                self.metrics
                    .request_err(Tags::new(Operation::CreateIndex, collection).with("error", e.kind()), Default::default());
                return Err(e);
            }
        };
        self.create_index(collection, field, &spec).await
    }

    // ========== Writes ==========

    /// Encode a batch record against the collection schema (or by inference
    /// when none is known) and insert it.
    pub async fn insert(&self, collection: &str, record: &BatchRecord) -> Result<Vec<i64>> {
        let start = Instant::now();
        let encoded = async {
            let schema = self.schema(collection).await?;
            match schema.as_deref() {
                Some(s) => ColumnEncoder::new(s).encode(record),
                None => ColumnEncoder::schemaless().encode(record),
            }
        }
        .await;

        match encoded {
            Ok(columns) => self.submit(collection, &columns).await,
            Err(e) => {
                self.metrics
                    .request_err(Tags::new(Operation::Insert, collection).with("error", e.kind()), start.elapsed());
                tracing::warn!(collection, error = %e, "batch encoding failed");
                Err(e)
            }
        }
    }

    /// Insert bare vectors into the collection's first vector field.
    pub async fn insert_vectors(&self, collection: &str, vectors: &[Vec<f32>]) -> Result<Vec<i64>> {
        let start = Instant::now();
        let schema = self.schema_or_none(collection).await;
        match vector_column(schema.as_deref(), vectors) {
            Ok(column) => self.submit(collection, std::slice::from_ref(&column)).await,
            Err(e) => {
                self.metrics
                    .request_err(Tags::new(Operation::Insert, collection).with("error", e.kind()), start.elapsed());
                Err(e)
            }
        }
    }

    /// Insert already-encoded columns; returns the row ids.
    pub async fn submit(&self, collection: &str, columns: &[Column]) -> Result<Vec<i64>> {
        insert::submit(self.store.as_ref(), &self.ctx, &self.metrics, collection, columns).await
    }

    // ========== Search ==========

    pub async fn search(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        top_k: usize,
        options: &SearchOptions,
    ) -> Result<DecodedHits> {
        let schema = self.schema_or_none(collection).await;
        let req = SearchRequest { collection, vectors, top_k, options, schema: schema.as_deref() };
        search::search(self.store.as_ref(), &self.ctx, &self.metrics, &req).await
    }

    /// Search the `vector` field returning ids only.
    pub async fn search_simple(&self, collection: &str, vectors: &[Vec<f32>], top_k: usize) -> Result<DecodedHits> {
        self.search(collection, vectors, top_k, &SearchOptions::default()).await
    }

    /// Search and, when ground truth is given, score recall per query.
    pub async fn search_with_recall(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        top_k: usize,
        options: &SearchOptions,
        ground_truth: &[GroundTruthSet],
    ) -> Result<(DecodedHits, Option<RecallReport>)> {
        let schema = self.schema_or_none(collection).await;
        let req = SearchRequest { collection, vectors, top_k, options, schema: schema.as_deref() };
        search::search_with_recall(self.store.as_ref(), &self.ctx, &self.metrics, &req, ground_truth).await
    }
}

fn vector_column(schema: Option<&CollectionSchema>, vectors: &[Vec<f32>]) -> Result<Column> {
    let field = schema.and_then(|s| s.vector_fields().find(|f| f.data_type.is_dense_vector()));
    match field {
        Some(f) if f.data_type != DataType::FloatVector => {
            let values: Vec<Value> = vectors.iter().map(|v| Value::from(v.clone())).collect();
            Column::from_values(f, &values)
        }
        _ => {
            let name = field.map(|f| f.name.as_str()).unwrap_or("vector");
            let dim = field.map(|f| f.dim()).or_else(|| vectors.first().map(Vec::len)).unwrap_or(0);
            if let Some(row) = vectors.iter().position(|v| v.len() != dim) {
                return Err(LoadError::InconsistentVectorDimension {
                    field: name.to_string(),
                    row,
                    expected: dim,
                    got: vectors[row].len(),
                });
            }
            Ok(Column::new(name, ColumnData::FloatVector { dim, rows: vectors.to_vec() }))
        }
    }
}
