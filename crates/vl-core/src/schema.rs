//! Collection schema definitions.
//!
//! A schema is parsed from the harness JSON format, validated once, and then
//! treated as immutable by the encoder and the client.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, Result};

/// Logical type of a collection field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    Bool,
    Float,
    Double,
    String,
    VarChar,
    #[serde(rename = "JSON")]
    Json,
    FloatVector,
    BinaryVector,
    Float16Vector,
    BFloat16Vector,
    SparseFloatVector,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Int8 => "Int8",
            Self::Int16 => "Int16",
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::Bool => "Bool",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::VarChar => "VarChar",
            Self::Json => "JSON",
            Self::FloatVector => "FloatVector",
            Self::BinaryVector => "BinaryVector",
            Self::Float16Vector => "Float16Vector",
            Self::BFloat16Vector => "BFloat16Vector",
            Self::SparseFloatVector => "SparseFloatVector",
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            Self::FloatVector
                | Self::BinaryVector
                | Self::Float16Vector
                | Self::BFloat16Vector
                | Self::SparseFloatVector
        )
    }

    /// Dense vector types carry a fixed dimension.
    pub fn is_dense_vector(&self) -> bool {
        self.is_vector() && *self != Self::SparseFloatVector
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        let dt = match s {
            "Int8" => Self::Int8,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "Bool" => Self::Bool,
            "Float" => Self::Float,
            "Double" => Self::Double,
            "String" => Self::String,
            "VarChar" => Self::VarChar,
            "JSON" => Self::Json,
            "FloatVector" => Self::FloatVector,
            "BinaryVector" => Self::BinaryVector,
            "Float16Vector" => Self::Float16Vector,
            "BFloat16Vector" => Self::BFloat16Vector,
            "SparseFloatVector" => Self::SparseFloatVector,
            other => return Err(LoadError::Schema(format!("unsupported data type: '{}'", other))),
        };
        Ok(dt)
    }
}

/// Field descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub is_primary_key: bool,
    #[serde(default, rename = "isAutoID")]
    pub is_auto_id: bool,
    /// Vector dimension; bits for `BinaryVector`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    /// Maximum byte length for `VarChar`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            is_primary_key: false,
            is_auto_id: false,
            dimension: None,
            max_length: None,
            description: String::new(),
        }
    }

    pub fn primary_key(mut self, auto_id: bool) -> Self {
        self.is_primary_key = true;
        self.is_auto_id = auto_id;
        self
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = Some(dim);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Declared dimension, zero when absent.
    pub fn dim(&self) -> usize {
        self.dimension.unwrap_or(0)
    }

    fn validate(&self) -> Result<()> {
        if !field_name_pattern().is_match(&self.name) {
            return Err(LoadError::Schema(format!("invalid field name '{}'", self.name)));
        }
        if self.data_type.is_dense_vector() {
            let dim = self.dim();
            if dim == 0 {
                return Err(LoadError::Schema(format!(
                    "vector field '{}' requires a positive dimension",
                    self.name
                )));
            }
            if self.data_type == DataType::BinaryVector && dim % 8 != 0 {
                return Err(LoadError::Schema(format!(
                    "binary vector field '{}' dimension {} is not a multiple of 8",
                    self.name, dim
                )));
            }
        }
        if self.data_type == DataType::VarChar && self.max_length.unwrap_or(0) == 0 {
            return Err(LoadError::Schema(format!(
                "VarChar field '{}' requires a positive maxLength",
                self.name
            )));
        }
        if self.is_auto_id && !(self.is_primary_key && self.data_type == DataType::Int64) {
            return Err(LoadError::Schema(format!(
                "auto-id is only valid on an Int64 primary key, not '{}'",
                self.name
            )));
        }
        if self.is_primary_key && !matches!(self.data_type, DataType::Int64 | DataType::VarChar) {
            return Err(LoadError::Schema(format!(
                "primary key '{}' must be Int64 or VarChar, got {}",
                self.name, self.data_type
            )));
        }
        Ok(())
    }
}

/// Collection schema: ordered fields plus name and description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

/// Loose field definition as written in schema JSON; `dataType` may be
/// missing or misspelled and is checked on conversion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldDefinition {
    name: String,
    #[serde(default)]
    data_type: String,
    #[serde(default)]
    is_primary_key: bool,
    #[serde(default, rename = "isAutoID")]
    is_auto_id: bool,
    #[serde(default)]
    dimension: Option<i64>,
    #[serde(default)]
    max_length: Option<i64>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct SchemaDefinition {
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    fields: Vec<FieldDefinition>,
}

impl TryFrom<FieldDefinition> for FieldSchema {
    type Error = LoadError;

    fn try_from(def: FieldDefinition) -> Result<Self> {
        if def.data_type.is_empty() {
            return Err(LoadError::Schema(format!("field {} has empty dataType", def.name)));
        }
        let data_type: DataType = def.data_type.parse().map_err(|_| {
            LoadError::Schema(format!(
                "unsupported data type: '{}' for field '{}'",
                def.data_type, def.name
            ))
        })?;
        // Non-positive sizes read as "not set"; validation reports them.
        let positive = |v: Option<i64>| v.filter(|n| *n > 0).map(|n| n as usize);
        Ok(FieldSchema {
            name: def.name,
            data_type,
            is_primary_key: def.is_primary_key,
            is_auto_id: def.is_auto_id,
            dimension: positive(def.dimension),
            max_length: positive(def.max_length),
            description: def.description,
        })
    }
}

impl CollectionSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), description: String::new(), fields: Vec::new() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// `id` auto-id Int64 primary key plus a `vector` float vector field.
    pub fn simple(name: impl Into<String>, dimension: usize) -> Self {
        Self::new(name)
            .with_description("Simple collection for load testing")
            .with_field(FieldSchema::new("id", DataType::Int64).primary_key(true))
            .with_field(FieldSchema::new("vector", DataType::FloatVector).with_dimension(dimension))
    }

    /// Parse schema JSON. Field types are checked here; structural rules are
    /// checked by [`CollectionSchema::validate`].
    pub fn from_json(json: &str) -> Result<Self> {
        let def: SchemaDefinition = serde_json::from_str(json)
            .map_err(|e| LoadError::Schema(format!("failed to parse schema JSON: {}", e)))?;
        let fields = def
            .fields
            .into_iter()
            .map(FieldSchema::try_from)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { name: def.name, description: def.description, fields })
    }

    pub fn validate(&self) -> Result<()> {
        if !field_name_pattern().is_match(&self.name) {
            return Err(LoadError::Schema(format!("invalid collection name '{}'", self.name)));
        }
        if self.fields.is_empty() {
            return Err(LoadError::Schema(format!("collection '{}' declares no fields", self.name)));
        }
        let mut seen = HashSet::new();
        for field in &self.fields {
            if !seen.insert(field.name.as_str()) {
                return Err(LoadError::Schema(format!("duplicate field '{}'", field.name)));
            }
            field.validate()?;
        }
        let pk_count = self.fields.iter().filter(|f| f.is_primary_key).count();
        if pk_count > 1 {
            return Err(LoadError::Schema(format!(
                "collection '{}' declares {} primary keys",
                self.name, pk_count
            )));
        }
        Ok(())
    }

    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn primary_key(&self) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.is_primary_key)
    }

    /// Name of the primary key, `"id"` when none is declared.
    pub fn id_field(&self) -> &str {
        self.primary_key().map(|f| f.name.as_str()).unwrap_or("id")
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.data_type.is_vector())
    }
}

fn field_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static pattern"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_schema() {
        let schema = CollectionSchema::from_json(
            r#"{
                "name": "test_collection",
                "fields": [
                    {"name": "id", "dataType": "Int64", "isPrimaryKey": true, "isAutoID": true},
                    {"name": "vector", "dataType": "FloatVector", "dimension": 128}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.name, "test_collection");
        assert_eq!(schema.fields.len(), 2);
        assert!(schema.fields[0].is_auto_id);
        assert_eq!(schema.fields[1].dimension, Some(128));
        schema.validate().unwrap();
    }

    #[test]
    fn test_parse_all_field_types() {
        let schema = CollectionSchema::from_json(
            r#"{
                "name": "complex_collection",
                "description": "A complex collection",
                "fields": [
                    {"name": "id", "dataType": "Int64", "isPrimaryKey": true},
                    {"name": "int32_field", "dataType": "Int32"},
                    {"name": "float_field", "dataType": "Float"},
                    {"name": "double_field", "dataType": "Double"},
                    {"name": "bool_field", "dataType": "Bool"},
                    {"name": "meta", "dataType": "JSON"},
                    {"name": "string_field", "dataType": "VarChar", "maxLength": 200},
                    {"name": "vector", "dataType": "FloatVector", "dimension": 256},
                    {"name": "bits", "dataType": "BinaryVector", "dimension": 64},
                    {"name": "sparse", "dataType": "SparseFloatVector"}
                ]
            }"#,
        )
        .unwrap();
        schema.validate().unwrap();
        assert_eq!(schema.field("meta").unwrap().data_type, DataType::Json);
        assert_eq!(schema.vector_fields().count(), 3);
        assert_eq!(schema.id_field(), "id");
    }

    #[test]
    fn test_invalid_json_is_schema_error() {
        let err = CollectionSchema::from_json("{invalid}").unwrap_err();
        assert!(matches!(err, LoadError::Schema(_)));
    }

    #[test]
    fn test_empty_data_type() {
        let err = CollectionSchema::from_json(r#"{"name": "c", "fields": [{"name": "x"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("empty dataType"));
    }

    #[test]
    fn test_unknown_data_type() {
        let err = CollectionSchema::from_json(
            r#"{"name": "c", "fields": [{"name": "x", "dataType": "Decimal"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("'Decimal'"));
    }

    #[test]
    fn test_empty_name_parses() {
        let schema = CollectionSchema::from_json(r#"{"fields": []}"#).unwrap();
        assert!(schema.name.is_empty());
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_varchar_requires_max_length() {
        let schema = CollectionSchema::new("c")
            .with_field(FieldSchema::new("id", DataType::Int64).primary_key(false))
            .with_field(FieldSchema::new("text", DataType::VarChar));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_vector_requires_dimension() {
        for dt in [DataType::FloatVector, DataType::BinaryVector, DataType::Float16Vector] {
            let schema = CollectionSchema::new("c").with_field(FieldSchema::new("v", dt));
            assert!(schema.validate().is_err(), "{} without dimension", dt);
        }
        let sparse = CollectionSchema::new("c")
            .with_field(FieldSchema::new("s", DataType::SparseFloatVector));
        sparse.validate().unwrap();
    }

    #[test]
    fn test_binary_dimension_multiple_of_eight() {
        let schema = CollectionSchema::new("c")
            .with_field(FieldSchema::new("b", DataType::BinaryVector).with_dimension(12));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_two_primary_keys_rejected() {
        let schema = CollectionSchema::new("c")
            .with_field(FieldSchema::new("a", DataType::Int64).primary_key(false))
            .with_field(FieldSchema::new("b", DataType::Int64).primary_key(false));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_duplicate_and_bad_names() {
        let dup = CollectionSchema::new("c")
            .with_field(FieldSchema::new("a", DataType::Bool))
            .with_field(FieldSchema::new("a", DataType::Bool));
        assert!(dup.validate().is_err());
        let bad = CollectionSchema::new("c").with_field(FieldSchema::new("1abc", DataType::Bool));
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_simple_schema() {
        let schema = CollectionSchema::simple("bench", 8);
        schema.validate().unwrap();
        assert_eq!(schema.primary_key().unwrap().name, "id");
        assert!(schema.primary_key().unwrap().is_auto_id);
        assert_eq!(schema.field("vector").unwrap().dim(), 8);
    }

    #[test]
    fn test_schema_serde_roundtrip() {
        let schema = CollectionSchema::simple("rt", 16);
        let json = serde_json::to_string(&schema).unwrap();
        assert!(json.contains("\"isAutoID\":true"));
        assert!(json.contains("\"dataType\":\"FloatVector\""));
        let back = CollectionSchema::from_json(&json).unwrap();
        assert_eq!(back, schema);
    }
}
