//! Typed write columns.

use byteorder::{ByteOrder, LittleEndian};
use half::{bf16, f16};
use serde_json::{Map, Value};
use vl_core::DataType;

/// One row of a sparse float vector, sorted by index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseRow {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseRow {
    /// Build from unsorted pairs; later duplicates overwrite earlier ones.
    pub fn from_pairs(mut pairs: Vec<(u32, f32)>) -> Self {
        pairs.sort_by_key(|p| p.0);
        let mut row = Self::default();
        for (idx, val) in pairs {
            if row.indices.last() == Some(&idx) {
                if let Some(last) = row.values.last_mut() {
                    *last = val;
                }
                continue;
            }
            row.indices.push(idx);
            row.values.push(val);
        }
        row
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Homogeneous column payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Bool(Vec<bool>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    String(Vec<String>),
    VarChar(Vec<String>),
    Json(Vec<Value>),
    FloatVector { dim: usize, rows: Vec<Vec<f32>> },
    /// `dim` is in bits; each row holds `dim / 8` bytes.
    BinaryVector { dim: usize, rows: Vec<Vec<u8>> },
    Float16Vector { dim: usize, rows: Vec<Vec<f16>> },
    BFloat16Vector { dim: usize, rows: Vec<Vec<bf16>> },
    SparseFloatVector(Vec<SparseRow>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Int8(v) => v.len(),
            Self::Int16(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::String(v) | Self::VarChar(v) => v.len(),
            Self::Json(v) => v.len(),
            Self::FloatVector { rows, .. } => rows.len(),
            Self::BinaryVector { rows, .. } => rows.len(),
            Self::Float16Vector { rows, .. } => rows.len(),
            Self::BFloat16Vector { rows, .. } => rows.len(),
            Self::SparseFloatVector(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int8(_) => DataType::Int8,
            Self::Int16(_) => DataType::Int16,
            Self::Int32(_) => DataType::Int32,
            Self::Int64(_) => DataType::Int64,
            Self::Bool(_) => DataType::Bool,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
            Self::VarChar(_) => DataType::VarChar,
            Self::Json(_) => DataType::Json,
            Self::FloatVector { .. } => DataType::FloatVector,
            Self::BinaryVector { .. } => DataType::BinaryVector,
            Self::Float16Vector { .. } => DataType::Float16Vector,
            Self::BFloat16Vector { .. } => DataType::BFloat16Vector,
            Self::SparseFloatVector(_) => DataType::SparseFloatVector,
        }
    }
}

/// A typed sequence bound to one field name.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self { name: name.into(), data }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn into_data(self) -> ColumnData {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Declared dimension of a dense vector column.
    pub fn dim(&self) -> Option<usize> {
        match &self.data {
            ColumnData::FloatVector { dim, .. }
            | ColumnData::BinaryVector { dim, .. }
            | ColumnData::Float16Vector { dim, .. }
            | ColumnData::BFloat16Vector { dim, .. } => Some(*dim),
            _ => None,
        }
    }

    /// Render one cell as JSON.
    pub fn get(&self, row: usize) -> Option<Value> {
        if row >= self.len() {
            return None;
        }
        let floats = |v: &[f32]| Value::Array(v.iter().map(|x| Value::from(*x as f64)).collect());
        let value = match &self.data {
            ColumnData::Int8(v) => Value::from(v[row]),
            ColumnData::Int16(v) => Value::from(v[row]),
            ColumnData::Int32(v) => Value::from(v[row]),
            ColumnData::Int64(v) => Value::from(v[row]),
            ColumnData::Bool(v) => Value::from(v[row]),
            ColumnData::Float(v) => Value::from(v[row] as f64),
            ColumnData::Double(v) => Value::from(v[row]),
            ColumnData::String(v) | ColumnData::VarChar(v) => Value::from(v[row].clone()),
            ColumnData::Json(v) => v[row].clone(),
            ColumnData::FloatVector { rows, .. } => floats(&rows[row]),
            ColumnData::BinaryVector { rows, .. } => {
                Value::Array(rows[row].iter().map(|b| Value::from(*b)).collect())
            }
            ColumnData::Float16Vector { rows, .. } => {
                Value::Array(rows[row].iter().map(|x| Value::from(x.to_f64())).collect())
            }
            ColumnData::BFloat16Vector { rows, .. } => {
                Value::Array(rows[row].iter().map(|x| Value::from(x.to_f64())).collect())
            }
            ColumnData::SparseFloatVector(rows) => {
                let sparse = &rows[row];
                let map: Map<String, Value> = sparse
                    .indices
                    .iter()
                    .zip(sparse.values.iter())
                    .map(|(i, v)| (i.to_string(), Value::from(*v as f64)))
                    .collect();
                Value::Object(map)
            }
        };
        Some(value)
    }

    /// A dense vector row widened to `f32`; binary and sparse rows are not
    /// representable and return `None`.
    pub fn vector_f32(&self, row: usize) -> Option<Vec<f32>> {
        match &self.data {
            ColumnData::FloatVector { rows, .. } => rows.get(row).cloned(),
            ColumnData::Float16Vector { rows, .. } => {
                rows.get(row).map(|r| r.iter().map(|x| x.to_f32()).collect())
            }
            ColumnData::BFloat16Vector { rows, .. } => {
                rows.get(row).map(|r| r.iter().map(|x| x.to_f32()).collect())
            }
            _ => None,
        }
    }

    /// Little-endian wire bytes of one vector row.
    ///
    /// Sparse rows are `(u32 index, f32 value)` pairs.
    pub fn vector_bytes(&self, row: usize) -> Option<Vec<u8>> {
        match &self.data {
            ColumnData::FloatVector { rows, .. } => {
                let r = rows.get(row)?;
                let mut buf = vec![0u8; r.len() * 4];
                LittleEndian::write_f32_into(r, &mut buf);
                Some(buf)
            }
            ColumnData::BinaryVector { rows, .. } => rows.get(row).cloned(),
            ColumnData::Float16Vector { rows, .. } => {
                let bits: Vec<u16> = rows.get(row)?.iter().map(|x| x.to_bits()).collect();
                let mut buf = vec![0u8; bits.len() * 2];
                LittleEndian::write_u16_into(&bits, &mut buf);
                Some(buf)
            }
            ColumnData::BFloat16Vector { rows, .. } => {
                let bits: Vec<u16> = rows.get(row)?.iter().map(|x| x.to_bits()).collect();
                let mut buf = vec![0u8; bits.len() * 2];
                LittleEndian::write_u16_into(&bits, &mut buf);
                Some(buf)
            }
            ColumnData::SparseFloatVector(rows) => {
                let r = rows.get(row)?;
                let mut buf = vec![0u8; r.len() * 8];
                for (i, (idx, val)) in r.indices.iter().zip(r.values.iter()).enumerate() {
                    LittleEndian::write_u32(&mut buf[i * 8..i * 8 + 4], *idx);
                    LittleEndian::write_f32(&mut buf[i * 8 + 4..i * 8 + 8], *val);
                }
                Some(buf)
            }
            _ => None,
        }
    }

    /// Approximate payload size in bytes.
    pub fn byte_size(&self) -> usize {
        match &self.data {
            ColumnData::Int8(v) => v.len(),
            ColumnData::Int16(v) => v.len() * 2,
            ColumnData::Int32(v) => v.len() * 4,
            ColumnData::Int64(v) => v.len() * 8,
            ColumnData::Bool(v) => v.len(),
            ColumnData::Float(v) => v.len() * 4,
            ColumnData::Double(v) => v.len() * 8,
            ColumnData::String(v) | ColumnData::VarChar(v) => v.iter().map(String::len).sum(),
            ColumnData::Json(v) => v.iter().map(|j| j.to_string().len()).sum(),
            ColumnData::FloatVector { dim, rows } => rows.len() * dim * 4,
            ColumnData::BinaryVector { dim, rows } => rows.len() * dim / 8,
            ColumnData::Float16Vector { dim, rows } => rows.len() * dim * 2,
            ColumnData::BFloat16Vector { dim, rows } => rows.len() * dim * 2,
            ColumnData::SparseFloatVector(rows) => rows.iter().map(|r| r.len() * 8).sum(),
        }
    }
}
