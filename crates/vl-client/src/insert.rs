//! Submit encoded columns and reconcile the store's acknowledgement.

use std::time::Instant;

use vl_column::Column;
use vl_core::{LoadError, Result};
use vl_metrics::{MetricsEmitter, Operation, Tags};
use vl_query::IdColumn;

use crate::call::CallContext;
use crate::store::{VectorStore, WriteAck};

/// Rows in a batch: the longest column.
pub fn row_count(columns: &[Column]) -> usize {
    columns.iter().map(Column::len).max().unwrap_or(0)
}

/// Ids for an acknowledged write of `rows` rows.
///
/// Store-assigned integer ids are returned as-is; otherwise the batch gets
/// positional ids `0..rows`.
pub fn resolve_ids(ack: &WriteAck, rows: usize) -> Result<Vec<i64>> {
    if ack.insert_count != rows as u64 {
        return Err(LoadError::CountMismatch { expected: rows as u64, got: ack.insert_count });
    }
    match &ack.ids {
        Some(ids) if ids.len() == rows => match (0..rows).map(|i| ids.get_i64(i)).collect::<Result<Vec<_>>>() {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::debug!(error = %e, "store ids are not integers; using positional ids");
                Ok(positional(rows))
            }
        },
        Some(IdColumn::Int64(v)) if !v.is_empty() => {
            tracing::warn!(ids = v.len(), rows, "store returned a partial id list; using positional ids");
            Ok(positional(rows))
        }
        _ => Ok(positional(rows)),
    }
}

fn positional(rows: usize) -> Vec<i64> {
    (0..rows as i64).collect()
}

/// Write `columns` and record the outcome.
pub async fn submit(
    store: &dyn VectorStore,
    ctx: &CallContext,
    metrics: &MetricsEmitter,
    collection: &str,
    columns: &[Column],
) -> Result<Vec<i64>> {
    let tags = Tags::new(Operation::Insert, collection);
    let rows = row_count(columns);
    let start = Instant::now();

    let outcome = async {
        if columns.is_empty() || rows == 0 {
            return Err(LoadError::Validation("no valid columns provided".to_string()));
        }
        let ack = ctx.request("insert", store.write(collection, columns)).await?;
        resolve_ids(&ack, rows)
    }
    .await;

    match outcome {
        Ok(ids) => {
            let bytes: usize = columns.iter().map(Column::byte_size).sum();
            metrics.data_size(tags.clone(), bytes);
            metrics.request_ok(tags, start.elapsed(), rows);
            tracing::debug!(collection, rows, bytes, "inserted batch");
            Ok(ids)
        }
        Err(e) => {
            metrics.request_err(tags.with("error", e.kind()), start.elapsed());
            tracing::warn!(collection, rows, error = %e, "insert failed");
            Err(e)
        }
    }
}
