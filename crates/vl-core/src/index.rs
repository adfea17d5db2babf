//! Index configuration: translation from loose harness parameters into a
//! typed index description.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{LoadError, Result};

pub const DEFAULT_NLIST: u32 = 1024;
pub const DEFAULT_PQ_M: u32 = 4;
pub const DEFAULT_PQ_NBITS: u32 = 8;
pub const DEFAULT_HNSW_M: u32 = 16;
pub const DEFAULT_EF_CONSTRUCTION: u32 = 200;

/// Similarity metric used by the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MetricType {
    #[default]
    L2,
    Ip,
    Cosine,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L2 => "L2",
            Self::Ip => "IP",
            Self::Cosine => "COSINE",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "L2" => Some(Self::L2),
            "IP" => Some(Self::Ip),
            "COSINE" => Some(Self::Cosine),
            _ => None,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index type with its build parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    Flat,
    IvfFlat { nlist: u32 },
    IvfSq8 { nlist: u32 },
    IvfPq { nlist: u32, m: u32, nbits: u32 },
    Hnsw { m: u32, ef_construction: u32 },
}

impl IndexKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "FLAT",
            Self::IvfFlat { .. } => "IVF_FLAT",
            Self::IvfSq8 { .. } => "IVF_SQ8",
            Self::IvfPq { .. } => "IVF_PQ",
            Self::Hnsw { .. } => "HNSW",
        }
    }
}

/// Full index description handed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSpec {
    pub kind: IndexKind,
    pub metric: MetricType,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self { kind: IndexKind::Flat, metric: MetricType::L2 }
    }
}

impl IndexSpec {
    pub fn flat(metric: MetricType) -> Self {
        Self { kind: IndexKind::Flat, metric }
    }

    pub fn hnsw(metric: MetricType) -> Self {
        Self {
            kind: IndexKind::Hnsw { m: DEFAULT_HNSW_M, ef_construction: DEFAULT_EF_CONSTRUCTION },
            metric,
        }
    }

    /// Build from loose parameters such as
    /// `{"indexType": "IVF_PQ", "metricType": "IP", "nlist": 256}`.
    ///
    /// Missing keys take the documented defaults. An unknown metric keeps L2.
    pub fn from_params(params: &Map<String, Value>) -> Result<Self> {
        let index_type = params.get("indexType").and_then(Value::as_str).unwrap_or("FLAT");

        let metric = match params.get("metricType").and_then(Value::as_str) {
            Some(s) => MetricType::parse(s).unwrap_or_else(|| {
                tracing::warn!(metric = s, "unknown metricType, using L2");
                MetricType::L2
            }),
            None => MetricType::L2,
        };

        let int = |key: &str, default: u32| -> Result<u32> {
            match params.get(key) {
                None => Ok(default),
                Some(v) => v
                    .as_u64()
                    .filter(|n| *n > 0 && *n <= u32::MAX as u64)
                    .map(|n| n as u32)
                    .ok_or_else(|| {
                        LoadError::InvalidIndex(format!("{} must be a positive integer, got {}", key, v))
                    }),
            }
        };

        let kind = match index_type {
            "FLAT" => IndexKind::Flat,
            "IVF_FLAT" => IndexKind::IvfFlat { nlist: int("nlist", DEFAULT_NLIST)? },
            "IVF_SQ8" => IndexKind::IvfSq8 { nlist: int("nlist", DEFAULT_NLIST)? },
            "IVF_PQ" => IndexKind::IvfPq {
                nlist: int("nlist", DEFAULT_NLIST)?,
                m: int("m", DEFAULT_PQ_M)?,
                nbits: int("nbits", DEFAULT_PQ_NBITS)?,
            },
            "HNSW" => IndexKind::Hnsw {
                m: int("M", DEFAULT_HNSW_M)?,
                ef_construction: int("efConstruction", DEFAULT_EF_CONSTRUCTION)?,
            },
            other => return Err(LoadError::InvalidIndex(format!("unsupported index type: {}", other))),
        };

        Ok(Self { kind, metric })
    }

    /// Store-facing key/value parameters.
    pub fn to_params(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        out.insert("index_type".to_string(), self.kind.as_str().to_string());
        out.insert("metric_type".to_string(), self.metric.as_str().to_string());
        match self.kind {
            IndexKind::Flat => {}
            IndexKind::IvfFlat { nlist } | IndexKind::IvfSq8 { nlist } => {
                out.insert("nlist".to_string(), nlist.to_string());
            }
            IndexKind::IvfPq { nlist, m, nbits } => {
                out.insert("nlist".to_string(), nlist.to_string());
                out.insert("m".to_string(), m.to_string());
                out.insert("nbits".to_string(), nbits.to_string());
            }
            IndexKind::Hnsw { m, ef_construction } => {
                out.insert("M".to_string(), m.to_string());
                out.insert("efConstruction".to_string(), ef_construction.to_string());
            }
        }
        out
    }
}
