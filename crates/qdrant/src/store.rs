use std::sync::Arc;

use async_trait::async_trait;
use kernel_connectors_common::{
    run_store_operation, DynamicRecord, EmbeddingGenerator, RecordDefinition, Result, VectorStore,
    VectorStoreRecord,
};
use tracing::info;

use crate::backend::QdrantBackend;
use crate::collection::QdrantCollection;
use crate::settings::QdrantSettings;
use crate::STORE_NAME;

/// Entry point to a Qdrant instance; hands out typed collections.
#[derive(Clone)]
pub struct QdrantVectorStore {
    backend: Arc<dyn QdrantBackend>,
    embedding_generator: Option<Arc<dyn EmbeddingGenerator>>,
}

impl QdrantVectorStore {
    pub fn new(backend: Arc<dyn QdrantBackend>) -> Self {
        Self {
            backend,
            embedding_generator: None,
        }
    }

    pub fn from_settings(settings: &QdrantSettings) -> Result<Self> {
        let client = settings.build_client()?;
        Ok(Self::new(Arc::new(client)))
    }

    /// Generator passed on to every collection created by this store.
    pub fn with_embedding_generator(mut self, generator: Arc<dyn EmbeddingGenerator>) -> Self {
        self.embedding_generator = Some(generator);
        self
    }

    pub fn get_collection<T: VectorStoreRecord>(
        &self,
        name: &str,
        definition: Option<RecordDefinition>,
    ) -> Result<QdrantCollection<T>> {
        let collection = QdrantCollection::new(self.backend.clone(), name, definition, true)?;
        Ok(match &self.embedding_generator {
            Some(generator) => collection.with_embedding_generator(generator.clone()),
            None => collection,
        })
    }

    /// Collection of schemaless records; the definition is required.
    pub fn get_dynamic_collection(
        &self,
        name: &str,
        definition: RecordDefinition,
    ) -> Result<QdrantCollection<DynamicRecord>> {
        self.get_collection(name, Some(definition))
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    fn store_name(&self) -> &str {
        STORE_NAME
    }

    async fn list_collection_names(&self) -> Result<Vec<String>> {
        run_store_operation(STORE_NAME, None, "list_collections", self.backend.list_collections()).await
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        run_store_operation(
            STORE_NAME,
            Some(name),
            "collection_exists",
            self.backend.collection_exists(name),
        )
        .await
    }

    async fn ensure_collection_deleted(&self, name: &str) -> Result<()> {
        if !self.collection_exists(name).await? {
            return Ok(());
        }
        run_store_operation(
            STORE_NAME,
            Some(name),
            "delete_collection",
            self.backend.delete_collection(name),
        )
        .await?;
        info!("Deleted Qdrant collection: {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockQdrantBackend;
    use kernel_connectors_common::{ConnectorError, VectorStoreField};

    #[tokio::test]
    async fn test_list_collection_names() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_list_collections()
            .returning(|| Ok(vec!["notes".to_string(), "hotels".to_string()]));

        let store = QdrantVectorStore::new(Arc::new(backend));
        assert_eq!(store.list_collection_names().await.unwrap(), vec!["notes", "hotels"]);
        assert_eq!(store.store_name(), "Qdrant");
    }

    #[tokio::test]
    async fn test_delete_is_skipped_for_missing_collection() {
        let mut backend = MockQdrantBackend::new();
        backend.expect_collection_exists().returning(|_| Ok(false));
        backend.expect_delete_collection().never();

        let store = QdrantVectorStore::new(Arc::new(backend));
        store.ensure_collection_deleted("gone").await.unwrap();
    }

    #[tokio::test]
    async fn test_vendor_errors_are_wrapped() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_collection_exists()
            .returning(|_| Err("transport error".into()));

        let store = QdrantVectorStore::new(Arc::new(backend));
        let err = store.collection_exists("notes").await.unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::VectorStoreOperation { ref operation, .. } if operation == "collection_exists"
        ));
    }

    #[test]
    fn test_dynamic_collection_requires_valid_definition() {
        let store = QdrantVectorStore::new(Arc::new(MockQdrantBackend::new()));
        let definition = RecordDefinition::new(vec![
            VectorStoreField::key("id"),
            VectorStoreField::vector("a", 2),
            VectorStoreField::vector("b", 2),
        ])
        .unwrap();

        let collection = store.get_dynamic_collection("things", definition).unwrap();
        assert_eq!(collection.definition().vector_fields().count(), 2);

        assert!(store.get_collection::<DynamicRecord>("things", None).is_err());
    }
}
