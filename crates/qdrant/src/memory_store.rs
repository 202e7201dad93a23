use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kernel_connectors_common::{
    run_store_operation, store_error, MemoryRecord, MemoryRecordMetadata, MemoryStore, Result,
};
use qdrant_client::qdrant::{
    CreateCollectionBuilder, DeletePointsBuilder, Distance, GetPointsBuilder, PointId, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
    VectorsOutput,
};
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::QdrantBackend;
use crate::mapper::{map_to_payload, payload_to_map, point_id_to_key, vectors_to_map};
use crate::settings::QdrantSettings;
use crate::STORE_NAME;

/// Memory store over Qdrant with one unnamed cosine vector per point.
///
/// Point ids are derived from the record id: UUIDs are used as-is, any other
/// id maps to a stable UUIDv5 so repeated upserts overwrite the same point.
pub struct QdrantMemoryStore {
    backend: Arc<dyn QdrantBackend>,
    vector_size: u64,
}

impl QdrantMemoryStore {
    pub fn new(backend: Arc<dyn QdrantBackend>, vector_size: u64) -> Self {
        Self { backend, vector_size }
    }

    pub fn from_settings(settings: &QdrantSettings, vector_size: u64) -> Result<Self> {
        Ok(Self::new(Arc::new(settings.build_client()?), vector_size))
    }

    pub fn point_key(id: &str) -> String {
        match Uuid::parse_str(id) {
            Ok(uuid) => uuid.to_string(),
            Err(_) => Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string(),
        }
    }

    async fn require_collection(&self, collection: &str, operation: &str) -> Result<()> {
        if self.does_collection_exist(collection).await? {
            Ok(())
        } else {
            Err(store_error(
                STORE_NAME,
                Some(collection),
                operation,
                format!("collection '{}' does not exist", collection),
            ))
        }
    }

    fn to_point(record: &MemoryRecord) -> (String, PointStruct) {
        let key = Self::point_key(record.id());
        let metadata = &record.metadata;
        let payload = json!({
            "id": metadata.id,
            "text": metadata.text,
            "description": metadata.description,
            "additional_metadata": metadata.additional_metadata,
            "external_source_name": metadata.external_source_name,
            "is_reference": metadata.is_reference,
            "timestamp": record.timestamp.map(|t| t.to_rfc3339()),
        });
        let data = match payload {
            Value::Object(map) => map,
            _ => Default::default(),
        };
        let point = PointStruct::new(key.clone(), record.embedding.clone(), map_to_payload(data));
        (key, point)
    }

    fn from_point(
        id: Option<PointId>,
        payload: HashMap<String, QdrantValue>,
        vectors: Option<VectorsOutput>,
        with_embedding: bool,
    ) -> Result<MemoryRecord> {
        let key = point_id_to_key(id)?.to_string();
        let data = payload_to_map(payload);
        let text = |name: &str| {
            data.get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        let embedding = if with_embedding {
            vectors_to_map(vectors).into_values().next().unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(MemoryRecord {
            metadata: MemoryRecordMetadata {
                is_reference: data.get("is_reference").and_then(Value::as_bool).unwrap_or(false),
                external_source_name: text("external_source_name"),
                id: text("id"),
                description: text("description"),
                text: text("text"),
                additional_metadata: text("additional_metadata"),
            },
            embedding,
            key: Some(key),
            timestamp: data
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|t| t.with_timezone(&Utc)),
        })
    }

    fn point_ids(keys: &[String]) -> Vec<PointId> {
        keys.iter().map(|k| PointId::from(Self::point_key(k))).collect()
    }
}

#[async_trait]
impl MemoryStore for QdrantMemoryStore {
    async fn create_collection(&self, collection: &str) -> Result<()> {
        let request = CreateCollectionBuilder::new(collection)
            .vectors_config(VectorParamsBuilder::new(self.vector_size, Distance::Cosine))
            .build();
        run_store_operation(
            STORE_NAME,
            Some(collection),
            "create_collection",
            self.backend.create_collection(request),
        )
        .await?;
        info!("Created memory collection: {}", collection);
        Ok(())
    }

    async fn get_collections(&self) -> Result<Vec<String>> {
        run_store_operation(STORE_NAME, None, "list_collections", self.backend.list_collections()).await
    }

    async fn does_collection_exist(&self, collection: &str) -> Result<bool> {
        run_store_operation(
            STORE_NAME,
            Some(collection),
            "collection_exists",
            self.backend.collection_exists(collection),
        )
        .await
    }

    async fn delete_collection(&self, collection: &str) -> Result<()> {
        run_store_operation(
            STORE_NAME,
            Some(collection),
            "delete_collection",
            self.backend.delete_collection(collection),
        )
        .await
    }

    async fn upsert(&self, collection: &str, record: MemoryRecord) -> Result<String> {
        let mut keys = self.upsert_batch(collection, vec![record]).await?;
        Ok(keys.pop().unwrap_or_default())
    }

    async fn upsert_batch(&self, collection: &str, records: Vec<MemoryRecord>) -> Result<Vec<String>> {
        self.require_collection(collection, "upsert").await?;
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let (keys, points): (Vec<String>, Vec<PointStruct>) = records.iter().map(Self::to_point).unzip();
        let request = UpsertPointsBuilder::new(collection, points).wait(true).build();
        run_store_operation(
            STORE_NAME,
            Some(collection),
            "upsert",
            self.backend.upsert_points(request),
        )
        .await?;

        debug!("Upserted {} memory records into {}", keys.len(), collection);
        Ok(keys)
    }

    async fn get(&self, collection: &str, key: &str, with_embedding: bool) -> Result<Option<MemoryRecord>> {
        Ok(self
            .get_batch(collection, &[key.to_string()], with_embedding)
            .await?
            .into_iter()
            .next())
    }

    async fn get_batch(
        &self,
        collection: &str,
        keys: &[String],
        with_embeddings: bool,
    ) -> Result<Vec<MemoryRecord>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let request = GetPointsBuilder::new(collection, Self::point_ids(keys))
            .with_payload(true)
            .with_vectors(with_embeddings)
            .build();
        let points = run_store_operation(
            STORE_NAME,
            Some(collection),
            "get",
            self.backend.get_points(request),
        )
        .await?;

        points
            .into_iter()
            .map(|p| Self::from_point(p.id, p.payload, p.vectors, with_embeddings))
            .collect()
    }

    async fn remove(&self, collection: &str, key: &str) -> Result<()> {
        self.remove_batch(collection, &[key.to_string()]).await
    }

    async fn remove_batch(&self, collection: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        let request = DeletePointsBuilder::new(collection)
            .points(Self::point_ids(keys))
            .wait(true)
            .build();
        run_store_operation(
            STORE_NAME,
            Some(collection),
            "delete",
            self.backend.delete_points(request),
        )
        .await
    }

    async fn get_nearest_matches(
        &self,
        collection: &str,
        embedding: &[f32],
        limit: usize,
        min_relevance_score: f64,
        with_embeddings: bool,
    ) -> Result<Vec<(MemoryRecord, f64)>> {
        let request = SearchPointsBuilder::new(collection, embedding.to_vec(), limit as u64)
            .score_threshold(min_relevance_score as f32)
            .with_payload(true)
            .with_vectors(with_embeddings)
            .build();
        let points = run_store_operation(
            STORE_NAME,
            Some(collection),
            "search",
            self.backend.search_points(request),
        )
        .await?;

        points
            .into_iter()
            .map(|p| {
                let score = p.score as f64;
                Ok((Self::from_point(p.id, p.payload, p.vectors, with_embeddings)?, score))
            })
            .collect()
    }
}
