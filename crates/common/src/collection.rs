use async_trait::async_trait;

use crate::error::Result;
use crate::record::{RecordKey, VectorStoreRecord};
use crate::search::{GetRecordOptions, VectorSearchOptions, VectorSearchResults};

/// CRUD over one collection of records of type `T`.
#[async_trait]
pub trait VectorStoreCollection<T: VectorStoreRecord>: Send + Sync {
    fn name(&self) -> &str;

    async fn collection_exists(&self) -> Result<bool>;

    /// Creates the collection from the record definition unless it already exists.
    async fn ensure_collection_exists(&self) -> Result<()>;

    async fn ensure_collection_deleted(&self) -> Result<()>;

    async fn upsert(&self, record: &T) -> Result<RecordKey> {
        let mut keys = self.upsert_batch(std::slice::from_ref(record)).await?;
        keys.pop().ok_or_else(|| {
            crate::error::ConnectorError::VectorStoreModel("upsert returned no key".to_string())
        })
    }

    async fn upsert_batch(&self, records: &[T]) -> Result<Vec<RecordKey>>;

    async fn get(&self, key: &RecordKey, options: GetRecordOptions) -> Result<Option<T>> {
        Ok(self
            .get_batch(std::slice::from_ref(key), options)
            .await?
            .into_iter()
            .next())
    }

    /// Missing keys are skipped rather than reported.
    async fn get_batch(&self, keys: &[RecordKey], options: GetRecordOptions) -> Result<Vec<T>>;

    async fn delete(&self, key: &RecordKey) -> Result<()> {
        self.delete_batch(std::slice::from_ref(key)).await
    }

    async fn delete_batch(&self, keys: &[RecordKey]) -> Result<()>;
}

#[async_trait]
pub trait VectorSearch<T: VectorStoreRecord>: Send + Sync {
    async fn search_vector(
        &self,
        vector: &[f32],
        options: &VectorSearchOptions,
    ) -> Result<VectorSearchResults<T>>;

    /// Embeds `text` with the collection's generator and searches with the result.
    async fn search(&self, text: &str, options: &VectorSearchOptions) -> Result<VectorSearchResults<T>>;

    async fn hybrid_search(
        &self,
        vector: &[f32],
        keywords: &[String],
        options: &VectorSearchOptions,
    ) -> Result<VectorSearchResults<T>>;
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    fn store_name(&self) -> &str;

    async fn list_collection_names(&self) -> Result<Vec<String>>;

    async fn collection_exists(&self, name: &str) -> Result<bool>;

    async fn ensure_collection_deleted(&self, name: &str) -> Result<()>;
}
