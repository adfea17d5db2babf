//! Search result decoding and recall evaluation.

pub mod decoder;
pub mod recall;

pub use decoder::{decode, DecodedHits, IdColumn, RawQueryResult};
pub use recall::{recall_at_k, recall_by_query, RecallReport};
