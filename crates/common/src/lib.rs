pub mod chat;
pub mod collection;
pub mod definition;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod mapping;
pub mod memory;
pub mod record;
pub mod search;
pub mod settings;

// Error types
pub use error::{run_store_operation, store_error, BoxError, ConnectorError, Result};

// Record model and mapping
pub use definition::{DistanceFunction, FieldKind, IndexKind, RecordDefinition, VectorStoreField};
pub use mapping::{deserialize_record, serialize_record, StorageRecord, VectorValue};
pub use record::{DynamicRecord, RecordKey, VectorStoreRecord};

// Vector store contracts
pub use collection::{VectorSearch, VectorStore, VectorStoreCollection};
pub use filter::FilterExpr;
pub use search::{GetRecordOptions, SearchType, VectorSearchOptions, VectorSearchResult, VectorSearchResults};

// Legacy memory store
pub use memory::{MemoryRecord, MemoryRecordMetadata, MemoryStore};

// AI services
pub use chat::{
    AuthorRole, ChatCompletionService, ChatHistory, ChatMessageContent, ChatMessageStream,
    FunctionCallContent, FunctionDefinition, PromptExecutionSettings, StreamingChatMessageContent,
    TextContent, TextGenerationService, TextStream, ToolChoice,
};
pub use embedding::EmbeddingGenerator;

pub use settings::load_settings;
