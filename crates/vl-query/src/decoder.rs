//! Raw per-query store results → ordered search hits.

use vl_column::Column;
use vl_core::{LoadError, Result, SearchHit};

/// Primary keys as returned by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum IdColumn {
    Int64(Vec<i64>),
    VarChar(Vec<String>),
}

impl IdColumn {
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::VarChar(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Integer id at `row`. String keys are accepted when they hold an integer.
    pub fn get_i64(&self, row: usize) -> Result<i64> {
        match self {
            Self::Int64(v) => v
                .get(row)
                .copied()
                .ok_or_else(|| LoadError::Decode(format!("no id at row {}", row))),
            Self::VarChar(v) => {
                let s = v
                    .get(row)
                    .ok_or_else(|| LoadError::Decode(format!("no id at row {}", row)))?;
                s.parse::<i64>()
                    .map_err(|_| LoadError::Decode(format!("primary key '{}' is not an integer", s)))
            }
        }
    }
}

/// One query's hits in store rank order, column-oriented.
#[derive(Debug, Clone, PartialEq)]
pub struct RawQueryResult {
    pub ids: IdColumn,
    pub scores: Vec<f32>,
    pub fields: Vec<Column>,
}

impl RawQueryResult {
    pub fn new(ids: IdColumn, scores: Vec<f32>) -> Self {
        Self { ids, scores, fields: Vec::new() }
    }

    pub fn with_field(mut self, column: Column) -> Self {
        self.fields.push(column);
        self
    }

    pub fn result_count(&self) -> usize {
        self.ids.len()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.fields.iter().find(|c| c.name() == name)
    }
}

/// Flat hit list plus the boundaries of each query's slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedHits {
    hits: Vec<SearchHit>,
    /// `offsets[i]..offsets[i + 1]` is query `i`; always `num_queries + 1` long.
    offsets: Vec<usize>,
}

impl DecodedHits {
    pub fn num_queries(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn hits(&self) -> &[SearchHit] {
        &self.hits
    }

    pub fn into_hits(self) -> Vec<SearchHit> {
        self.hits
    }

    /// Hits of query `i`; empty for an out-of-range index.
    pub fn per_query(&self, i: usize) -> &[SearchHit] {
        match (self.offsets.get(i), self.offsets.get(i + 1)) {
            (Some(&start), Some(&end)) => &self.hits[start..end],
            _ => &[],
        }
    }

    pub fn iter_queries(&self) -> impl Iterator<Item = &[SearchHit]> + '_ {
        self.offsets.windows(2).map(move |w| &self.hits[w[0]..w[1]])
    }

    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }
}

/// Decode raw results, copying the requested output fields.
///
/// Requested fields missing from the results are skipped. The id field is
/// never copied into `fields`.
pub fn decode(raw: &[RawQueryResult], output_fields: &[String], id_field: &str) -> Result<DecodedHits> {
    let total: usize = raw.iter().map(RawQueryResult::result_count).sum();
    let mut hits = Vec::with_capacity(total);
    let mut offsets = Vec::with_capacity(raw.len() + 1);
    offsets.push(0);

    let wanted: Vec<&String> = output_fields.iter().filter(|f| f.as_str() != id_field).collect();

    for (q, result) in raw.iter().enumerate() {
        let count = result.result_count();
        if result.scores.len() != count {
            return Err(LoadError::Decode(format!(
                "query {}: {} ids but {} scores",
                q,
                count,
                result.scores.len()
            )));
        }

        let columns: Vec<&Column> = wanted.iter().filter_map(|f| result.column(f)).collect();
        if let Some(short) = columns.iter().find(|c| c.len() < count) {
            return Err(LoadError::Decode(format!(
                "query {}: column '{}' has {} values for {} hits",
                q,
                short.name(),
                short.len(),
                count
            )));
        }

        for i in 0..count {
            let mut hit = SearchHit::new(result.ids.get_i64(i)?, result.scores[i]);
            for col in &columns {
                if let Some(value) = col.get(i) {
                    hit.fields.insert(col.name().to_string(), value);
                }
            }
            hits.push(hit);
        }
        offsets.push(hits.len());
    }

    Ok(DecodedHits { hits, offsets })
}
