use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One retrieved item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: i64,
    pub score: f32,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, Value>,
}

impl SearchHit {
    pub fn new(id: i64, score: f32) -> Self {
        Self { id, score, fields: HashMap::new() }
    }
}

/// Relevant ids for one query.
pub type GroundTruthSet = HashSet<i64>;

/// Convert per-query id lists (as supplied by a harness script) into sets.
pub fn ground_truth_from_lists<L: AsRef<[i64]>>(lists: &[L]) -> Vec<GroundTruthSet> {
    lists.iter().map(|l| l.as_ref().iter().copied().collect()).collect()
}
