//! Batch record → column conversion.
//!
//! With a schema, each field's column type comes from its declared logical
//! type. Without one, the type is inferred from the first element.

use std::collections::HashMap;

use half::{bf16, f16};
use serde_json::Value;
use vl_core::{CollectionSchema, DataType, FieldSchema, LoadError, Result};

use crate::column::{Column, ColumnData, SparseRow};

/// Field name → value sequence, as handed over by a load script.
pub type BatchRecord = HashMap<String, Value>;

/// Encodes batch records into columns.
#[derive(Debug, Clone, Copy)]
pub struct ColumnEncoder<'a> {
    schema: Option<&'a CollectionSchema>,
}

impl<'a> ColumnEncoder<'a> {
    pub fn new(schema: &'a CollectionSchema) -> Self {
        Self { schema: Some(schema) }
    }

    pub fn schemaless() -> Self {
        Self { schema: None }
    }

    /// Produce one column per non-empty field.
    ///
    /// Schema-driven columns come out in declaration order; inferred ones in
    /// field-name order.
    pub fn encode(&self, record: &BatchRecord) -> Result<Vec<Column>> {
        let columns = match self.schema {
            Some(schema) => encode_with_schema(schema, record)?,
            None => encode_inferred(record)?,
        };
        if columns.is_empty() {
            return Err(LoadError::Validation("no valid columns provided".to_string()));
        }
        check_batch_len(&columns)?;
        tracing::debug!(
            columns = columns.len(),
            rows = columns[0].len(),
            "encoded batch record"
        );
        Ok(columns)
    }
}

impl Column {
    /// Build the column for one declared field.
    pub fn from_values(field: &FieldSchema, values: &[Value]) -> Result<Self> {
        let name = field.name.as_str();
        let data = match field.data_type {
            DataType::Int8 => ColumnData::Int8(convert(values, |r, v| int_cell(name, r, v, "Int8"))?),
            DataType::Int16 => ColumnData::Int16(convert(values, |r, v| int_cell(name, r, v, "Int16"))?),
            DataType::Int32 => ColumnData::Int32(convert(values, |r, v| int_cell(name, r, v, "Int32"))?),
            DataType::Int64 => ColumnData::Int64(convert(values, |r, v| int_cell(name, r, v, "Int64"))?),
            DataType::Bool => ColumnData::Bool(convert(values, |_, v| bool_cell(name, v))?),
            DataType::Float => {
                ColumnData::Float(convert(values, |_, v| number_cell(name, v).map(|f| f as f32))?)
            }
            DataType::Double => ColumnData::Double(convert(values, |_, v| number_cell(name, v))?),
            DataType::String => ColumnData::String(convert(values, |_, v| text_cell(name, v))?),
            DataType::VarChar => {
                let max = field.max_length.unwrap_or(usize::MAX);
                ColumnData::VarChar(convert(values, |row, v| {
                    let s = text_cell(name, v)?;
                    if s.len() > max {
                        return Err(LoadError::Validation(format!(
                            "value of length {} exceeds maxLength {} for field '{}' at row {}",
                            s.len(),
                            max,
                            name,
                            row
                        )));
                    }
                    Ok(s)
                })?)
            }
            DataType::Json => ColumnData::Json(values.to_vec()),
            DataType::FloatVector => {
                let dim = field.dim();
                let rows = convert(values, |r, v| dense_row(name, r, v, dim, |x| x as f32))?;
                ColumnData::FloatVector { dim, rows }
            }
            DataType::Float16Vector => {
                let dim = field.dim();
                let rows = convert(values, |r, v| dense_row(name, r, v, dim, |x| f16::from_f64(x)))?;
                ColumnData::Float16Vector { dim, rows }
            }
            DataType::BFloat16Vector => {
                let dim = field.dim();
                let rows = convert(values, |r, v| dense_row(name, r, v, dim, |x| bf16::from_f64(x)))?;
                ColumnData::BFloat16Vector { dim, rows }
            }
            DataType::BinaryVector => {
                let dim = field.dim();
                let rows = convert(values, |r, v| binary_row(name, r, v, dim / 8))?;
                ColumnData::BinaryVector { dim, rows }
            }
            DataType::SparseFloatVector => {
                ColumnData::SparseFloatVector(convert(values, |_, v| sparse_row(name, v))?)
            }
        };
        Ok(Column::new(name, data))
    }
}

fn encode_with_schema(schema: &CollectionSchema, record: &BatchRecord) -> Result<Vec<Column>> {
    if let Some(unknown) = record.keys().find(|k| schema.field(k).is_none()) {
        return Err(LoadError::Schema(format!(
            "field '{}' is not declared in collection '{}'",
            unknown, schema.name
        )));
    }

    let mut columns = Vec::new();
    for field in &schema.fields {
        let Some(value) = record.get(&field.name) else {
            continue;
        };
        let values = as_sequence(&field.name, value)?;
        if values.is_empty() {
            continue;
        }
        if field.is_auto_id {
            return Err(LoadError::Validation(format!(
                "field '{}' is an auto-id primary key and must not be supplied",
                field.name
            )));
        }
        columns.push(Column::from_values(field, values)?);
    }
    Ok(columns)
}

fn encode_inferred(record: &BatchRecord) -> Result<Vec<Column>> {
    let mut names: Vec<&String> = record.keys().collect();
    names.sort();

    let mut columns = Vec::new();
    for name in names {
        let values = as_sequence(name, &record[name])?;
        let Some(first) = values.first() else {
            continue;
        };
        let field = match first {
            Value::Array(inner) if inner.is_empty() => {
                return Err(LoadError::Validation(format!(
                    "field '{}' starts with an empty vector; dimension must be positive",
                    name
                )))
            }
            Value::Array(inner) => {
                FieldSchema::new(name.as_str(), DataType::FloatVector).with_dimension(inner.len())
            }
            Value::String(_) => FieldSchema::new(name.as_str(), DataType::VarChar),
            Value::Bool(_) => FieldSchema::new(name.as_str(), DataType::Bool),
            Value::Number(_) => {
                let all_int = values.iter().all(|v| v.is_i64() || v.is_u64());
                let dt = if all_int { DataType::Int64 } else { DataType::Float };
                FieldSchema::new(name.as_str(), dt)
            }
            other => {
                return Err(LoadError::unsupported(
                    name.as_str(),
                    format!("unsupported element type {}", shape(other)),
                ))
            }
        };
        columns.push(Column::from_values(&field, values)?);
    }
    Ok(columns)
}

fn check_batch_len(columns: &[Column]) -> Result<()> {
    let expected = columns[0].len();
    if let Some(bad) = columns.iter().find(|c| c.len() != expected) {
        return Err(LoadError::Validation(format!(
            "inconsistent batch size: field '{}' has {} rows, field '{}' has {}",
            columns[0].name(),
            expected,
            bad.name(),
            bad.len()
        )));
    }
    Ok(())
}

fn as_sequence<'v>(field: &str, value: &'v Value) -> Result<&'v [Value]> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(LoadError::unsupported(
            field,
            format!("expected a sequence of values, got {}", shape(other)),
        )),
    }
}

fn convert<T>(values: &[Value], mut cell: impl FnMut(usize, &Value) -> Result<T>) -> Result<Vec<T>> {
    values.iter().enumerate().map(|(row, v)| cell(row, v)).collect()
}

fn shape(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn int_cell<T: TryFrom<i64>>(field: &str, row: usize, v: &Value, type_name: &str) -> Result<T> {
    let n = match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e18).map(|f| f as i64)),
        _ => None,
    };
    let n = n.ok_or_else(|| {
        LoadError::unsupported(field, format!("expected an integer at row {}, got {}", row, shape(v)))
    })?;
    T::try_from(n).map_err(|_| {
        LoadError::Validation(format!(
            "value {} out of range for {} field '{}' at row {}",
            n, type_name, field, row
        ))
    })
}

fn number_cell(field: &str, v: &Value) -> Result<f64> {
    v.as_f64()
        .ok_or_else(|| LoadError::unsupported(field, format!("expected a number, got {}", shape(v))))
}

fn bool_cell(field: &str, v: &Value) -> Result<bool> {
    v.as_bool()
        .ok_or_else(|| LoadError::unsupported(field, format!("expected a bool, got {}", shape(v))))
}

fn text_cell(field: &str, v: &Value) -> Result<String> {
    v.as_str()
        .map(str::to_string)
        .ok_or_else(|| LoadError::unsupported(field, format!("expected a string, got {}", shape(v))))
}

fn dense_row<T>(field: &str, row: usize, v: &Value, dim: usize, cast: impl Fn(f64) -> T) -> Result<Vec<T>> {
    let items = v.as_array().ok_or_else(|| {
        LoadError::unsupported(field, format!("expected a vector at row {}, got {}", row, shape(v)))
    })?;
    if items.len() != dim {
        return Err(LoadError::InconsistentVectorDimension {
            field: field.to_string(),
            row,
            expected: dim,
            got: items.len(),
        });
    }
    items.iter().map(|x| number_cell(field, x).map(&cast)).collect()
}

fn binary_row(field: &str, row: usize, v: &Value, bytes: usize) -> Result<Vec<u8>> {
    let items = v.as_array().ok_or_else(|| {
        LoadError::unsupported(field, format!("expected a byte vector at row {}, got {}", row, shape(v)))
    })?;
    if items.len() != bytes {
        return Err(LoadError::InconsistentVectorDimension {
            field: field.to_string(),
            row,
            expected: bytes,
            got: items.len(),
        });
    }
    items
        .iter()
        .map(|x| {
            x.as_u64()
                .filter(|b| *b <= u8::MAX as u64)
                .map(|b| b as u8)
                .ok_or_else(|| LoadError::unsupported(field, format!("expected a byte at row {}, got {}", row, x)))
        })
        .collect()
}

fn sparse_row(field: &str, v: &Value) -> Result<SparseRow> {
    let map = v.as_object().ok_or_else(|| {
        LoadError::unsupported(field, format!("expected a sparse vector object, got {}", shape(v)))
    })?;
    let pairs = map
        .iter()
        .map(|(k, val)| {
            let idx = k
                .parse::<u32>()
                .map_err(|_| LoadError::unsupported(field, format!("invalid sparse index '{}'", k)))?;
            Ok((idx, number_cell(field, val)? as f32))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(SparseRow::from_pairs(pairs))
}
