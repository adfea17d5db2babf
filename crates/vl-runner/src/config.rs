use std::path::Path;

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use vl_core::{CollectionSchema, ConnectionConfig, DataType, IndexSpec, SearchOptions};

use crate::args::RunArgs;

/// Everything one run needs. Loaded from JSON; every key is optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub connection: ConnectionConfig,
    pub collection: String,
    /// Vector dimension of the generated `simple` schema.
    pub dim: usize,
    /// Full schema; replaces the generated one when set.
    pub schema: Option<CollectionSchema>,
    pub rows: usize,
    pub batch_size: usize,
    /// Size of the query pool ground truth is computed for.
    pub queries: usize,
    /// Query vectors per search request.
    pub nq: usize,
    pub top_k: usize,
    pub vus: usize,
    pub iterations: usize,
    /// Loose index parameters (`indexType`, `metricType`, ...).
    pub index: Map<String, Value>,
    pub search: SearchOptions,
    pub seed: u64,
    pub cleanup: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        let index = match json!({"indexType": "HNSW", "metricType": "L2"}) {
            Value::Object(m) => m,
            _ => Map::new(),
        };
        Self {
            connection: ConnectionConfig::default(),
            collection: "vecload_bench".to_string(),
            dim: 128,
            schema: None,
            rows: 10_000,
            batch_size: 1_000,
            queries: 100,
            nq: 1,
            top_k: 10,
            vus: 4,
            iterations: 100,
            index,
            search: SearchOptions::default(),
            seed: 42,
            cleanup: true,
        }
    }
}

impl RunConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }

    /// Config file (if any) with CLI flags applied on top.
    pub fn from_args(args: &RunArgs) -> anyhow::Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(args);
        Ok(config)
    }

    pub fn apply(&mut self, args: &RunArgs) {
        if let Some(address) = &args.address {
            self.connection.address = address.clone();
        }
        if let Some(v) = args.vus {
            self.vus = v;
        }
        if let Some(v) = args.iterations {
            self.iterations = v;
        }
        if let Some(v) = &args.collection {
            self.collection = v.clone();
        }
        if let Some(v) = args.dim {
            self.dim = v;
        }
        if let Some(v) = args.rows {
            self.rows = v;
        }
        if let Some(v) = args.top_k {
            self.top_k = v;
        }
        if args.keep {
            self.cleanup = false;
        }
    }

    /// The schema the run creates.
    pub fn schema(&self) -> CollectionSchema {
        match &self.schema {
            Some(s) => s.clone(),
            None => CollectionSchema::simple(self.collection.as_str(), self.dim),
        }
    }

    pub fn collection_name(&self) -> &str {
        self.schema.as_ref().map(|s| s.name.as_str()).unwrap_or(&self.collection)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.vus > 0, "vus must be positive");
        ensure!(self.batch_size > 0, "batch_size must be positive");
        ensure!(self.top_k > 0, "top_k must be positive");
        ensure!(self.nq > 0, "nq must be positive");
        ensure!(self.queries >= self.nq, "queries ({}) must cover nq ({})", self.queries, self.nq);
        let schema = self.schema();
        schema.validate()?;
        let field = schema
            .field(&self.search.vector_field)
            .with_context(|| format!("search field '{}' is not in the schema", self.search.vector_field))?;
        ensure!(
            field.data_type.is_dense_vector(),
            "search field '{}' must be a dense vector",
            field.name
        );
        if let Some(pk) = schema.primary_key().filter(|f| f.data_type == DataType::VarChar) {
            let widest = self.rows.saturating_sub(1).to_string().len();
            ensure!(
                pk.max_length.map_or(true, |max| max >= widest),
                "primary key '{}' cannot hold {} generated keys (maxLength {:?})",
                pk.name,
                self.rows,
                pk.max_length
            );
        }
        IndexSpec::from_params(&self.index)?;
        Ok(())
    }
}
