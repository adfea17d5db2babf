//! Search request options.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options for a vector search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchOptions {
    /// Vector field to search against.
    pub vector_field: String,
    /// Fields to copy into each hit. The id field is always returned.
    pub output_fields: Vec<String>,
    /// Boolean filter expression passed through to the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expr: Option<String>,
    /// Reserved for store-specific search parameters; not interpreted.
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub search_params: Map<String, Value>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            vector_field: "vector".to_string(),
            output_fields: vec!["id".to_string()],
            expr: None,
            search_params: Map::new(),
        }
    }
}

impl SearchOptions {
    pub fn with_vector_field(mut self, field: impl Into<String>) -> Self {
        self.vector_field = field.into();
        self
    }

    pub fn with_output_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_expr(mut self, expr: impl Into<String>) -> Self {
        self.expr = Some(expr.into());
        self
    }
}
