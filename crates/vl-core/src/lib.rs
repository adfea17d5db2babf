//! Shared types for the vecload harness: collection schemas, index and search
//! parameters, search hits and the error taxonomy.

pub mod config;
pub mod error;
pub mod index;
pub mod schema;
pub mod search;
pub mod types;

pub use config::ConnectionConfig;
pub use error::{LoadError, Result};
pub use index::{IndexKind, IndexSpec, MetricType};
pub use schema::{CollectionSchema, DataType, FieldSchema};
pub use search::SearchOptions;
pub use types::{ground_truth_from_lists, GroundTruthSet, SearchHit};
