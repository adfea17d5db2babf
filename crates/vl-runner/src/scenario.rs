//! Setup, concurrent virtual users, and the end-of-run report.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use uuid::Uuid;
use vl_client::{CancelToken, Client, MemoryStore};
use vl_core::{GroundTruthSet, IndexSpec, LoadError, SearchOptions};
use vl_metrics::{FanoutSink, MetricsRecorder, MetricsSink, MetricsSummary, TracingSink};

use crate::config::RunConfig;
use crate::data::{exact_ground_truth, generate_batch, random_vectors};

/// Query pool and its exact neighbours.
#[derive(Debug, Clone, Default)]
pub struct Workload {
    pub queries: Vec<Vec<f32>>,
    pub ground_truth: Vec<GroundTruthSet>,
    pub inserted: usize,
}

impl Workload {
    /// `nq` consecutive queries starting at `start`, wrapping around the pool.
    pub fn window(&self, start: usize, nq: usize) -> (Vec<Vec<f32>>, Vec<GroundTruthSet>) {
        let len = self.queries.len();
        if len == 0 {
            return (Vec::new(), Vec::new());
        }
        (start..start + nq)
            .map(|i| (self.queries[i % len].clone(), self.ground_truth[i % len].clone()))
            .unzip()
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct VuOutcome {
    ok: usize,
    failed: usize,
    recall_sum: f64,
    recall_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub collection: String,
    pub address: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub vus: usize,
    pub rows: usize,
    pub iterations_ok: usize,
    pub iterations_failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_recall: Option<f64>,
    pub summary: MetricsSummary,
}

pub struct Scenario {
    config: RunConfig,
    store: MemoryStore,
    recorder: Arc<MetricsRecorder>,
    sink: Arc<dyn MetricsSink>,
    cancel: CancelToken,
    run_id: Uuid,
}

impl Scenario {
    pub fn new(config: RunConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }

    pub fn with_store(config: RunConfig, store: MemoryStore) -> Self {
        let recorder = Arc::new(MetricsRecorder::default());
        Self {
            config,
            store,
            sink: recorder.clone(),
            recorder,
            cancel: CancelToken::new(),
            run_id: Uuid::new_v4(),
        }
    }

    /// Also log every sample through `tracing`.
    pub fn trace_samples(mut self) -> Self {
        let recorder: Arc<dyn MetricsSink> = self.recorder.clone();
        self.sink = Arc::new(FanoutSink::new(vec![recorder, Arc::new(TracingSink)]));
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn recorder(&self) -> &Arc<MetricsRecorder> {
        &self.recorder
    }

    /// A fresh client on its own store handle.
    pub fn client(&self) -> Client {
        Client::new(Arc::new(self.store.connect()), &self.config.connection, self.sink.clone())
            .with_cancel(self.cancel.clone())
    }

    /// Create, fill, index and load the collection, then compute ground truth
    /// for the query pool.
    pub async fn setup(&self, client: &Client) -> anyhow::Result<Workload> {
        let cfg = &self.config;
        let schema = cfg.schema();
        let name = schema.name.clone();
        let field = cfg.search.vector_field.clone();
        let dim = schema.field(&field).map(|f| f.dim()).unwrap_or(cfg.dim);

        if client.has_collection(&name).await? {
            tracing::info!(collection = %name, "dropping existing collection");
            client.drop_collection(&name).await?;
        }
        client.create_collection(schema.clone()).await?;

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut base = Vec::with_capacity(cfg.rows);
        let mut ids = Vec::with_capacity(cfg.rows);
        let started = Instant::now();
        let mut start = 0;
        while start < cfg.rows {
            let n = cfg.batch_size.min(cfg.rows - start);
            let batch = generate_batch(&schema, &field, start, n, &mut rng);
            ids.extend(client.insert(&name, &batch.record).await?);
            base.extend(batch.vectors);
            start += n;
        }
        tracing::info!(collection = %name, rows = ids.len(), elapsed = ?started.elapsed(), "data inserted");

        let spec = IndexSpec::from_params(&cfg.index)?;
        client.create_index(&name, &field, &spec).await?;
        client.load_collection(&name).await?;
        tracing::info!(collection = %name, index = spec.kind.as_str(), "collection indexed and loaded");

        let queries = random_vectors(&mut rng, cfg.queries, dim);
        let ground_truth = exact_ground_truth(spec.metric, &base, &ids, &queries, cfg.top_k);
        Ok(Workload { queries, ground_truth, inserted: ids.len() })
    }

    /// Full run: setup, `vus` concurrent users, optional cleanup, summary.
    pub async fn run(&self) -> anyhow::Result<RunReport> {
        let started_at = Utc::now();
        let cfg = &self.config;
        let name = cfg.collection_name().to_string();
        tracing::info!(run_id = %self.run_id, collection = %name, vus = cfg.vus, "run starting");

        let admin = self.client();
        let workload = Arc::new(self.setup(&admin).await?);

        let mut handles = Vec::with_capacity(cfg.vus);
        for vu in 0..cfg.vus {
            let client = self.client();
            let workload = workload.clone();
            let collection = name.clone();
            let options = cfg.search.clone();
            let (top_k, nq, iterations) = (cfg.top_k, cfg.nq, cfg.iterations);
            handles.push(tokio::spawn(async move {
                run_vu(vu, client, &collection, &options, &workload, top_k, nq, iterations).await
            }));
        }

        let mut total = VuOutcome::default();
        for handle in handles {
            let vu = handle.await?;
            total.ok += vu.ok;
            total.failed += vu.failed;
            total.recall_sum += vu.recall_sum;
            total.recall_count += vu.recall_count;
        }

        if cfg.cleanup {
            if let Err(e) = admin.drop_collection(&name).await {
                tracing::warn!(collection = %name, error = %e, "cleanup failed");
            }
        }
        admin.close().await?;

        let summary = MetricsSummary::from_samples(&self.recorder.drain());
        let mean_recall = (total.recall_count > 0).then(|| total.recall_sum / total.recall_count as f64);
        tracing::info!(
            run_id = %self.run_id,
            ok = total.ok,
            failed = total.failed,
            recall = ?mean_recall,
            "run finished"
        );

        Ok(RunReport {
            run_id: self.run_id,
            collection: name,
            address: admin.address().to_string(),
            started_at,
            finished_at: Utc::now(),
            vus: cfg.vus,
            rows: workload.inserted,
            iterations_ok: total.ok,
            iterations_failed: total.failed,
            mean_recall,
            summary,
        })
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_vu(
    vu: usize,
    client: Client,
    collection: &str,
    options: &SearchOptions,
    workload: &Workload,
    top_k: usize,
    nq: usize,
    iterations: usize,
) -> VuOutcome {
    let mut outcome = VuOutcome::default();
    for i in 0..iterations {
        let (queries, ground_truth) = workload.window((vu * iterations + i) * nq, nq);
        match client.search_with_recall(collection, &queries, top_k, options, &ground_truth).await {
            Ok((_, report)) => {
                outcome.ok += 1;
                if let Some(r) = report.filter(|r| r.valid_queries > 0) {
                    outcome.recall_sum += r.recall;
                    outcome.recall_count += 1;
                }
            }
            Err(LoadError::Cancelled(_)) => {
                tracing::info!(vu, iteration = i, "virtual user cancelled");
                break;
            }
            Err(e) => {
                outcome.failed += 1;
                tracing::warn!(vu, iteration = i, error = %e, "iteration failed");
            }
        }
    }
    if let Err(e) = client.close().await {
        tracing::debug!(vu, error = %e, "close failed");
    }
    outcome
}
