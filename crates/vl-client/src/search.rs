//! Query submission, decoding and recall scoring.

use std::time::Instant;

use vl_core::{CollectionSchema, GroundTruthSet, LoadError, Result, SearchOptions};
use vl_metrics::{MetricsEmitter, Operation, Tags};
use vl_query::{decode, recall_by_query, DecodedHits, RecallReport};

use crate::call::CallContext;
use crate::store::VectorStore;

/// Reject query vectors whose length differs from the searched field.
pub fn check_query_dims(schema: &CollectionSchema, field: &str, vectors: &[Vec<f32>]) -> Result<()> {
    let Some(declared) = schema.field(field).filter(|f| f.data_type.is_dense_vector()) else {
        return Ok(());
    };
    let expected = declared.dim();
    match vectors.iter().position(|v| v.len() != expected) {
        Some(row) => Err(LoadError::InconsistentVectorDimension {
            field: field.to_string(),
            row,
            expected,
            got: vectors[row].len(),
        }),
        None => Ok(()),
    }
}

pub struct SearchRequest<'a> {
    pub collection: &'a str,
    pub vectors: &'a [Vec<f32>],
    pub top_k: usize,
    pub options: &'a SearchOptions,
    pub schema: Option<&'a CollectionSchema>,
}

impl SearchRequest<'_> {
    fn tags(&self, operation: Operation) -> Tags {
        Tags::new(operation, self.collection).with("topk", self.top_k)
    }
}

/// Run one batched search and record the outcome.
pub async fn search(
    store: &dyn VectorStore,
    ctx: &CallContext,
    metrics: &MetricsEmitter,
    req: &SearchRequest<'_>,
) -> Result<DecodedHits> {
    let tags = req.tags(Operation::Search);
    let start = Instant::now();

    let outcome = async {
        if req.vectors.is_empty() {
            return Err(LoadError::Validation("no query vectors provided".to_string()));
        }
        if req.top_k == 0 {
            return Err(LoadError::Validation("topK must be positive".to_string()));
        }
        if let Some(schema) = req.schema {
            check_query_dims(schema, &req.options.vector_field, req.vectors)?;
        }
        let raw = ctx
            .request("search", store.query(req.collection, req.vectors, req.top_k, req.options))
            .await?;
        let id_field = req.schema.map(CollectionSchema::id_field).unwrap_or("id");
        decode(&raw, &req.options.output_fields, id_field)
    }
    .await;

    match outcome {
        Ok(hits) => {
            metrics.request_ok(tags, start.elapsed(), req.vectors.len());
            tracing::debug!(
                collection = req.collection,
                queries = hits.num_queries(),
                hits = hits.len(),
                "search complete"
            );
            Ok(hits)
        }
        Err(e) => {
            metrics.request_err(tags.with("error", e.kind()), start.elapsed());
            tracing::warn!(collection = req.collection, error = %e, "search failed");
            Err(e)
        }
    }
}

/// Search, then score the hits against `ground_truth`.
///
/// Recall is computed only when ground truth is supplied and is emitted as a
/// trend sample tagged with the collection and `topk`.
pub async fn search_with_recall(
    store: &dyn VectorStore,
    ctx: &CallContext,
    metrics: &MetricsEmitter,
    req: &SearchRequest<'_>,
    ground_truth: &[GroundTruthSet],
) -> Result<(DecodedHits, Option<RecallReport>)> {
    let hits = search(store, ctx, metrics, req).await?;
    if ground_truth.is_empty() {
        return Ok((hits, None));
    }

    let report = recall_by_query(&hits, ground_truth, req.top_k);
    metrics.recall(req.tags(Operation::SearchWithRecall), report.recall);
    tracing::debug!(
        collection = req.collection,
        recall = report.recall,
        valid_queries = report.valid_queries,
        "recall computed"
    );
    Ok((hits, Some(report)))
}
