//! Synthetic rows, query vectors and exact ground truth.

use rand::Rng;
use serde_json::{json, Map, Value};
use vl_client::distance;
use vl_column::BatchRecord;
use vl_core::{CollectionSchema, DataType, FieldSchema, GroundTruthSet, MetricType};

pub fn random_vector(rng: &mut impl Rng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
}

pub fn random_vectors(rng: &mut impl Rng, n: usize, dim: usize) -> Vec<Vec<f32>> {
    (0..n).map(|_| random_vector(rng, dim)).collect()
}

/// One generated batch plus the vectors written to the searched field.
pub struct GeneratedBatch {
    pub record: BatchRecord,
    pub vectors: Vec<Vec<f32>>,
}

/// Values for every writable field of rows `start..start + rows`.
pub fn generate_batch(
    schema: &CollectionSchema,
    search_field: &str,
    start: usize,
    rows: usize,
    rng: &mut impl Rng,
) -> GeneratedBatch {
    let mut record = BatchRecord::new();
    let mut vectors = Vec::new();

    for field in schema.fields.iter().filter(|f| !f.is_auto_id) {
        let values: Vec<Value> = if field.data_type.is_dense_vector() {
            let generated = random_vectors(rng, rows, field.dim());
            let values = generated.iter().map(|v| json!(v)).collect();
            if field.name == search_field {
                vectors = generated;
            }
            values
        } else {
            (start..start + rows).map(|row| scalar_value(field, row, rng)).collect()
        };
        record.insert(field.name.clone(), Value::Array(values));
    }

    GeneratedBatch { record, vectors }
}

fn scalar_value(field: &FieldSchema, row: usize, rng: &mut impl Rng) -> Value {
    match field.data_type {
        DataType::Int8 => json!(row % 128),
        DataType::Int16 => json!(row % 32_768),
        DataType::Int32 | DataType::Int64 => json!(row),
        DataType::Bool => json!(row % 2 == 0),
        DataType::Float | DataType::Double => json!(rng.gen::<f64>()),
        // String keys stay integer-parsable so searches decode them as ids.
        DataType::VarChar if field.is_primary_key => json!(row.to_string()),
        DataType::String | DataType::VarChar => {
            let mut s = format!("row-{}", row);
            if let Some(max) = field.max_length {
                s.truncate(max);
            }
            json!(s)
        }
        DataType::Json => json!({ "row": row }),
        DataType::BinaryVector => {
            let bytes: Vec<u8> = (0..field.dim() / 8).map(|_| rng.gen()).collect();
            json!(bytes)
        }
        DataType::SparseFloatVector => {
            let mut pairs = Map::new();
            for _ in 0..4 {
                pairs.insert(rng.gen_range(0u32..1000).to_string(), json!(rng.gen::<f32>()));
            }
            Value::Object(pairs)
        }
        DataType::FloatVector | DataType::Float16Vector | DataType::BFloat16Vector => {
            json!(random_vector(rng, field.dim()))
        }
    }
}

/// Exact top-`k` ids of each query over `base`, whose row `i` has id `ids[i]`.
pub fn exact_ground_truth(
    metric: MetricType,
    base: &[Vec<f32>],
    ids: &[i64],
    queries: &[Vec<f32>],
    k: usize,
) -> Vec<GroundTruthSet> {
    queries
        .iter()
        .map(|q| {
            let candidates = base.iter().map(Vec::as_slice).enumerate();
            distance::top_k(metric, q, candidates, k)
                .into_iter()
                .filter_map(|(i, _)| ids.get(i).copied())
                .collect()
        })
        .collect()
}
