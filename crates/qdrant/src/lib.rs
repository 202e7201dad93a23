pub mod backend;
pub mod collection;
pub mod filter;
pub mod mapper;
pub mod memory_store;
pub mod registration;
pub mod settings;
pub mod store;

pub use backend::QdrantBackend;
pub use collection::QdrantCollection;
pub use memory_store::QdrantMemoryStore;
pub use registration::QdrantKernelBuilderExt;
pub use settings::QdrantSettings;
pub use store::QdrantVectorStore;

pub const STORE_NAME: &str = "Qdrant";
