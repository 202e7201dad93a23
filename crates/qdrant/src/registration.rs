use std::sync::Arc;

use kernel_connectors_common::{MemoryStore, Result, VectorStore};
use kernel_connectors_core::KernelBuilder;

use crate::memory_store::QdrantMemoryStore;
use crate::settings::QdrantSettings;
use crate::store::QdrantVectorStore;

/// Registers Qdrant services on a [`KernelBuilder`].
pub trait QdrantKernelBuilderExt: Sized {
    /// Registers the store both as `QdrantVectorStore` (for typed collections)
    /// and as `dyn VectorStore`.
    fn add_qdrant_vector_store(self, store: QdrantVectorStore, service_id: Option<&str>) -> Self;

    fn add_qdrant_memory_store(self, store: QdrantMemoryStore, service_id: Option<&str>) -> Self;

    fn add_qdrant_vector_store_from_settings(
        self,
        settings: &QdrantSettings,
        service_id: Option<&str>,
    ) -> Result<Self> {
        Ok(self.add_qdrant_vector_store(QdrantVectorStore::from_settings(settings)?, service_id))
    }
}

impl QdrantKernelBuilderExt for KernelBuilder {
    fn add_qdrant_vector_store(self, store: QdrantVectorStore, service_id: Option<&str>) -> Self {
        let store = Arc::new(store);
        self.add_service::<QdrantVectorStore>(store.clone(), service_id)
            .add_service::<dyn VectorStore>(store, service_id)
    }

    fn add_qdrant_memory_store(self, store: QdrantMemoryStore, service_id: Option<&str>) -> Self {
        self.add_service::<dyn MemoryStore>(Arc::new(store), service_id)
    }
}
