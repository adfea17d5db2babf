use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use vl_column::Column;
use vl_core::{CollectionSchema, IndexSpec, SearchOptions};
use vl_query::{IdColumn, RawQueryResult};

/// A long-running store job (index build, collection load). Resolves once the
/// store reports the job finished.
pub type StoreTask = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Store acknowledgement of a columnar write.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WriteAck {
    pub insert_count: u64,
    /// Primary keys assigned or accepted by the store, in row order.
    pub ids: Option<IdColumn>,
}

/// Connection to a vector database. One handle per virtual user.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn create_collection(&self, schema: &CollectionSchema) -> anyhow::Result<()>;
    async fn drop_collection(&self, name: &str) -> anyhow::Result<()>;
    async fn has_collection(&self, name: &str) -> anyhow::Result<bool>;

    /// Schema of an existing collection, if the store can describe it.
    async fn describe_collection(&self, _name: &str) -> anyhow::Result<Option<CollectionSchema>> {
        Ok(None)
    }

    async fn load_collection(&self, name: &str) -> anyhow::Result<StoreTask>;
    async fn release_collection(&self, name: &str) -> anyhow::Result<()>;

    async fn create_index(&self, collection: &str, field: &str, spec: &IndexSpec) -> anyhow::Result<StoreTask>;

    async fn write(&self, collection: &str, columns: &[Column]) -> anyhow::Result<WriteAck>;

    /// One [`RawQueryResult`] per query vector, in query order.
    async fn query(
        &self,
        collection: &str,
        vectors: &[Vec<f32>],
        top_k: usize,
        options: &SearchOptions,
    ) -> anyhow::Result<Vec<RawQueryResult>>;

    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// A task that is already complete.
pub fn ready_task() -> StoreTask {
    Box::pin(async { Ok(()) })
}
