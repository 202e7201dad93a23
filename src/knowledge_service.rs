use anyhow::{Context, Result};
use kernel_connectors_common::embedding::ensure_embedding_count;
use kernel_connectors_common::{
    EmbeddingGenerator, FilterExpr, RecordDefinition, VectorSearch, VectorSearchOptions,
    VectorStoreCollection, VectorStoreField, VectorStoreRecord,
};
use kernel_connectors_qdrant::{QdrantCollection, QdrantVectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};
use tracing::{debug, info};
use uuid::Uuid;

pub const DEFAULT_COLLECTION: &str = "personal_knowledge";
const MAX_TOKENS_PER_CHUNK: usize = 500;
const CHUNK_OVERLAP: usize = 50;

/// One token window of an ingested document, stored as one Qdrant point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub source: String,
    pub tags: Vec<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

// The vector size depends on the embedding model, so the definition is built at runtime.
impl VectorStoreRecord for DocumentChunk {
    fn record_definition() -> Option<RecordDefinition> {
        None
    }
}

impl DocumentChunk {
    pub fn definition(dimensions: usize) -> Result<RecordDefinition> {
        Ok(RecordDefinition::new(vec![
            VectorStoreField::key("id"),
            VectorStoreField::data("document_id").indexed(),
            VectorStoreField::data("title").full_text_indexed(),
            VectorStoreField::data("content").full_text_indexed(),
            VectorStoreField::data("chunk_index"),
            VectorStoreField::data("total_chunks"),
            VectorStoreField::data("source").indexed(),
            VectorStoreField::data("tags").indexed(),
            VectorStoreField::data("created_at"),
            VectorStoreField::vector("embedding", dimensions),
        ])?)
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentUploadResponse {
    pub document_id: String,
    pub title: String,
    pub chunks_created: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentMatch {
    pub document_id: String,
    pub title: String,
    pub content: String,
    pub score: f64,
    pub chunk_index: usize,
    pub source: String,
}

pub struct KnowledgeService {
    collection: QdrantCollection<DocumentChunk>,
    embedder: Arc<dyn EmbeddingGenerator>,
    bpe: CoreBPE,
}

impl KnowledgeService {
    pub fn new(
        store: &QdrantVectorStore,
        embedder: Arc<dyn EmbeddingGenerator>,
        collection_name: &str,
        dimensions: usize,
    ) -> Result<Self> {
        let collection = store
            .get_collection::<DocumentChunk>(collection_name, Some(DocumentChunk::definition(dimensions)?))?
            .with_embedding_generator(embedder.clone());
        let bpe = cl100k_base().context("Failed to load cl100k tokenizer")?;

        Ok(Self {
            collection,
            embedder,
            bpe,
        })
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    pub async fn ensure_collection(&self) -> Result<()> {
        self.collection.ensure_collection_exists().await?;
        Ok(())
    }

    /// Splits `text` into windows of at most `max_tokens`, overlapping by `CHUNK_OVERLAP`.
    pub fn chunk_text(&self, text: &str, max_tokens: usize) -> Result<Vec<String>> {
        let tokens = self.bpe.encode_with_special_tokens(text);
        let step = max_tokens.saturating_sub(CHUNK_OVERLAP).max(1);

        let mut chunks = Vec::new();
        let mut start = 0;
        while start < tokens.len() {
            let end = usize::min(start + max_tokens, tokens.len());
            let chunk = self
                .bpe
                .decode(tokens[start..end].to_vec())
                .context("Failed to decode token window")?;
            chunks.push(chunk);

            if end == tokens.len() {
                break;
            }
            start += step;
        }

        Ok(chunks)
    }

    pub async fn store_document(
        &self,
        title: String,
        content: String,
        source: String,
        tags: Vec<String>,
    ) -> Result<DocumentUploadResponse> {
        let document_id = Uuid::new_v4();
        let texts = self.chunk_text(&content, MAX_TOKENS_PER_CHUNK)?;
        let total_chunks = texts.len();
        info!("Storing document '{}' with {} chunks", title, total_chunks);

        let embeddings = self.embedder.generate_embeddings(&texts).await?;
        ensure_embedding_count(self.embedder.model_id(), total_chunks, &embeddings)?;
        let created_at = chrono::Utc::now();

        let chunks: Vec<DocumentChunk> = texts
            .into_iter()
            .zip(embeddings)
            .enumerate()
            .map(|(index, (text, embedding))| DocumentChunk {
                // Point ids must be UUIDs; derive them from the document id.
                id: Uuid::new_v5(&document_id, index.to_string().as_bytes()).to_string(),
                document_id: document_id.to_string(),
                title: title.clone(),
                content: text,
                chunk_index: index,
                total_chunks,
                source: source.clone(),
                tags: tags.clone(),
                created_at,
                embedding: Some(embedding),
            })
            .collect();

        self.collection.upsert_batch(&chunks).await?;
        info!("Successfully stored document '{}'", title);

        Ok(DocumentUploadResponse {
            document_id: document_id.to_string(),
            title,
            chunks_created: total_chunks,
        })
    }

    pub async fn search_documents(
        &self,
        query: &str,
        limit: usize,
        tag: Option<&str>,
    ) -> Result<Vec<DocumentMatch>> {
        debug!("Searching for: {}", query);

        let mut options = VectorSearchOptions::new().with_top(limit);
        if let Some(tag) = tag {
            options = options.with_filter(FilterExpr::any_tag_equal_to("tags", tag));
        }

        let results = self.collection.search(query, &options).await?;
        let documents: Vec<DocumentMatch> = results
            .results
            .into_iter()
            .map(|result| DocumentMatch {
                document_id: result.record.document_id,
                title: result.record.title,
                content: result.record.content,
                score: result.score.unwrap_or_default(),
                chunk_index: result.record.chunk_index,
                source: result.record.source,
            })
            .collect();

        info!("Found {} relevant documents", documents.len());
        Ok(documents)
    }
}
