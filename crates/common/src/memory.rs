//! Legacy memory-store abstraction: fixed-shape records with text metadata
//! and one embedding, grouped into collections.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecordMetadata {
    /// Whether the record points at external content instead of holding it.
    pub is_reference: bool,
    pub external_source_name: String,
    pub id: String,
    pub description: String,
    pub text: String,
    pub additional_metadata: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub metadata: MemoryRecordMetadata,
    pub embedding: Vec<f32>,
    /// Store-assigned key, set once the record has been saved.
    pub key: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl MemoryRecord {
    pub fn local_record(
        id: impl Into<String>,
        text: impl Into<String>,
        description: Option<String>,
        embedding: Vec<f32>,
        additional_metadata: Option<String>,
        key: Option<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            metadata: MemoryRecordMetadata {
                is_reference: false,
                external_source_name: String::new(),
                id: id.into(),
                description: description.unwrap_or_default(),
                text: text.into(),
                additional_metadata: additional_metadata.unwrap_or_default(),
            },
            embedding,
            key,
            timestamp,
        }
    }

    pub fn reference_record(
        external_id: impl Into<String>,
        source_name: impl Into<String>,
        description: Option<String>,
        embedding: Vec<f32>,
        additional_metadata: Option<String>,
        key: Option<String>,
        timestamp: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            metadata: MemoryRecordMetadata {
                is_reference: true,
                external_source_name: source_name.into(),
                id: external_id.into(),
                description: description.unwrap_or_default(),
                text: String::new(),
                additional_metadata: additional_metadata.unwrap_or_default(),
            },
            embedding,
            key,
            timestamp,
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    /// Same record without its embedding.
    pub fn without_embedding(mut self) -> Self {
        self.embedding = Vec::new();
        self
    }
}

#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn create_collection(&self, collection: &str) -> Result<()>;

    async fn get_collections(&self) -> Result<Vec<String>>;

    async fn does_collection_exist(&self, collection: &str) -> Result<bool>;

    async fn delete_collection(&self, collection: &str) -> Result<()>;

    /// Saves the record and returns the key it is stored under.
    async fn upsert(&self, collection: &str, record: MemoryRecord) -> Result<String>;

    async fn upsert_batch(&self, collection: &str, records: Vec<MemoryRecord>) -> Result<Vec<String>>;

    /// Fetches one record; without embeddings the returned embedding is empty.
    async fn get(&self, collection: &str, key: &str, with_embedding: bool) -> Result<Option<MemoryRecord>>;

    async fn get_batch(
        &self,
        collection: &str,
        keys: &[String],
        with_embeddings: bool,
    ) -> Result<Vec<MemoryRecord>>;

    async fn remove(&self, collection: &str, key: &str) -> Result<()>;

    async fn remove_batch(&self, collection: &str, keys: &[String]) -> Result<()>;

    async fn get_nearest_matches(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        min_relevance_score: f64,
        with_embeddings: bool,
    ) -> Result<Vec<(MemoryRecord, f64)>>;

    async fn get_nearest_match(
        &self,
        collection: &str,
        embedding: &[f32],
        min_relevance_score: f64,
        with_embedding: bool,
    ) -> Result<Option<(MemoryRecord, f64)>> {
        Ok(self
            .get_nearest_matches(collection, embedding, 1, min_relevance_score, with_embedding)
            .await?
            .into_iter()
            .next())
    }
}
