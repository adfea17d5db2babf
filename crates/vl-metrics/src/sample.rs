use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How an observability pipeline should aggregate a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Trend,
    Rate,
    Gauge,
}

/// Metrics published by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Reqs,
    Duration,
    Vectors,
    DataSize,
    Errors,
    Connections,
    Recall,
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Reqs => "vecload_reqs",
            Self::Duration => "vecload_req_duration",
            Self::Vectors => "vecload_vectors",
            Self::DataSize => "vecload_data_size",
            Self::Errors => "vecload_errors",
            Self::Connections => "vecload_connections",
            Self::Recall => "vecload_recall",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Self::Reqs | Self::Vectors | Self::DataSize => MetricKind::Counter,
            Self::Duration | Self::Recall => MetricKind::Trend,
            Self::Errors => MetricKind::Rate,
            Self::Connections => MetricKind::Gauge,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Connect,
    CreateCollection,
    DropCollection,
    LoadCollection,
    ReleaseCollection,
    CreateIndex,
    Insert,
    Search,
    SearchWithRecall,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::CreateCollection => "create_collection",
            Self::DropCollection => "drop_collection",
            Self::LoadCollection => "load_collection",
            Self::ReleaseCollection => "release_collection",
            Self::CreateIndex => "create_index",
            Self::Insert => "insert",
            Self::Search => "search",
            Self::SearchWithRecall => "search_with_recall",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
        }
    }
}

/// Tags attached to every sample.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    pub operation: Operation,
    pub collection: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Tags {
    pub fn new(operation: Operation, collection: impl Into<String>) -> Self {
        Self { operation, collection: collection.into(), status: None, extra: BTreeMap::new() }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.extra.insert(key.into(), value.to_string());
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }
}

/// One observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub metric: Metric,
    pub value: f64,
    pub tags: Tags,
    pub time: DateTime<Utc>,
}

impl Sample {
    pub fn new(metric: Metric, value: f64, tags: Tags) -> Self {
        Self { metric, value, tags, time: Utc::now() }
    }
}
