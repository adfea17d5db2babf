//! Store-facing side of the harness: the [`VectorStore`] seam, the
//! [`Client`] facade that encodes, submits, decodes and records metrics, and
//! an in-process [`MemoryStore`] backend.

pub mod call;
pub mod client;
pub mod distance;
pub mod filter;
pub mod insert;
pub mod memory;
pub mod search;
pub mod store;

pub use call::{CallContext, CancelToken};
pub use client::Client;
pub use memory::MemoryStore;
pub use store::{StoreTask, VectorStore, WriteAck};
