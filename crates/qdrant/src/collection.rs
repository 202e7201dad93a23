use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use kernel_connectors_common::embedding::ensure_embedding_count;
use kernel_connectors_common::mapping::validate_dimensions;
use kernel_connectors_common::{
    deserialize_record, run_store_operation, serialize_record, store_error, ConnectorError,
    EmbeddingGenerator, GetRecordOptions, IndexKind, RecordDefinition, RecordKey, Result,
    StorageRecord, VectorSearch, VectorSearchOptions, VectorSearchResult, VectorSearchResults,
    VectorStoreCollection, VectorStoreRecord, VectorValue,
};
use qdrant_client::qdrant::{
    Condition, CreateCollection, CreateCollectionBuilder, DeletePointsBuilder, Filter, Fusion,
    GetPointsBuilder, PointId, PrefetchQueryBuilder, Query, QueryPointsBuilder, ScoredPoint,
    SearchPointsBuilder, UpsertPointsBuilder, VectorParamsBuilder, VectorsConfigBuilder,
};
use tracing::{debug, info};

use crate::backend::QdrantBackend;
use crate::filter::build_filter;
use crate::mapper::{distance_for, key_to_point_id, point_to_storage, storage_to_point};
use crate::STORE_NAME;

/// A Qdrant collection holding records of type `T`.
pub struct QdrantCollection<T> {
    backend: Arc<dyn QdrantBackend>,
    name: String,
    definition: RecordDefinition,
    named_vectors: bool,
    embedding_generator: Option<Arc<dyn EmbeddingGenerator>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: VectorStoreRecord> QdrantCollection<T> {
    /// Uses `definition` when given, else the record type's own definition.
    ///
    /// Without named vectors a point holds a single vector, so the definition
    /// may only have one vector field.
    pub fn new(
        backend: Arc<dyn QdrantBackend>,
        name: impl Into<String>,
        definition: Option<RecordDefinition>,
        named_vectors: bool,
    ) -> Result<Self> {
        let name = name.into();
        let definition = definition.or_else(T::record_definition).ok_or_else(|| {
            ConnectorError::VectorStoreModel(format!(
                "collection '{}' needs a record definition",
                name
            ))
        })?;

        if !named_vectors && definition.vector_fields().count() > 1 {
            return Err(ConnectorError::VectorStoreModel(
                "only one vector field is allowed when not using named vectors".to_string(),
            ));
        }

        Ok(Self {
            backend,
            name,
            definition,
            named_vectors,
            embedding_generator: None,
            _record: PhantomData,
        })
    }

    pub fn with_embedding_generator(mut self, generator: Arc<dyn EmbeddingGenerator>) -> Self {
        self.embedding_generator = Some(generator);
        self
    }

    pub fn definition(&self) -> &RecordDefinition {
        &self.definition
    }

    fn operation_error(&self, operation: &str, message: impl Into<String>) -> ConnectorError {
        store_error(STORE_NAME, Some(self.name.as_str()), operation, message.into())
    }

    fn create_request(&self) -> Result<CreateCollection> {
        const OPERATION: &str = "ensure_collection_exists";

        let mut params = Vec::new();
        for field in self.definition.vector_fields() {
            let index_kind = field.index_kind.unwrap_or_default();
            if !matches!(index_kind, IndexKind::Hnsw | IndexKind::Default) {
                return Err(self.operation_error(
                    OPERATION,
                    format!("index kind {:?} is not supported", index_kind),
                ));
            }
            let function = field.distance_function.unwrap_or_default();
            let distance = distance_for(function).ok_or_else(|| {
                self.operation_error(
                    OPERATION,
                    format!("distance function {:?} is not supported", function),
                )
            })?;
            let size = field.dimensions.unwrap_or_default() as u64;
            params.push((field.storage_name().to_string(), VectorParamsBuilder::new(size, distance)));
        }

        let builder = CreateCollectionBuilder::new(&self.name);
        let builder = if self.named_vectors {
            let mut config = VectorsConfigBuilder::default();
            for (name, vector_params) in params {
                config.add_named_vector_params(name, vector_params.build());
            }
            builder.vectors_config(config)
        } else {
            let (_, vector_params) = params.into_iter().next().ok_or_else(|| {
                self.operation_error(OPERATION, "record definition has no vector field")
            })?;
            builder.vectors_config(vector_params)
        };

        Ok(builder.build())
    }

    /// Replaces text vectors with embeddings from the generator, in one batch call.
    async fn embed_text_vectors(&self, records: &mut [StorageRecord]) -> Result<()> {
        let mut pending = Vec::new();
        for (index, record) in records.iter().enumerate() {
            for (name, vector) in &record.vectors {
                if let VectorValue::Text(text) = vector {
                    pending.push((index, name.clone(), text.clone()));
                }
            }
        }
        if pending.is_empty() {
            return Ok(());
        }

        let generator = self.embedding_generator.as_ref().ok_or_else(|| {
            ConnectorError::VectorStoreModel(
                "records contain text vectors but the collection has no embedding generator"
                    .to_string(),
            )
        })?;

        let texts: Vec<String> = pending.iter().map(|(_, _, text)| text.clone()).collect();
        debug!("Embedding {} text vectors with {}", texts.len(), generator.model_id());
        let embeddings = generator.generate_embeddings(&texts).await?;
        ensure_embedding_count(generator.model_id(), texts.len(), &embeddings)?;

        for ((index, name, _), embedding) in pending.into_iter().zip(embeddings) {
            if let Some(field) = self.definition.field_by_storage_name(&name) {
                validate_dimensions(field, &embedding)?;
            }
            records[index]
                .vectors
                .insert(name, VectorValue::Embedding(embedding));
        }
        Ok(())
    }

    fn results_from_points(
        &self,
        points: Vec<ScoredPoint>,
        options: &VectorSearchOptions,
    ) -> Result<VectorSearchResults<T>> {
        let results = points
            .into_iter()
            .map(|point| {
                let storage = point_to_storage(&self.definition, point.id, point.payload, point.vectors)?;
                Ok(VectorSearchResult {
                    record: deserialize_record(&self.definition, storage, options.include_vectors)?,
                    score: Some(point.score as f64),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let total_count = options.include_total_count.then_some(results.len());
        Ok(VectorSearchResults { results, total_count })
    }

    fn search_filter(&self, operation: &str, options: &VectorSearchOptions) -> Result<Option<Filter>> {
        options
            .filter
            .as_ref()
            .map(|expr| build_filter(&self.definition, expr).map_err(|e| self.operation_error(operation, e)))
            .transpose()
    }

    fn search_vector_field(&self, options: &VectorSearchOptions) -> Result<String> {
        self.definition
            .try_get_vector_field(options.vector_property_name.as_deref())?
            .map(|f| f.storage_name().to_string())
            .ok_or_else(|| {
                ConnectorError::VectorSearchExecution(
                    "record definition has no vector field to search".to_string(),
                )
            })
    }
}

#[async_trait]
impl<T: VectorStoreRecord> VectorStoreCollection<T> for QdrantCollection<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collection_exists(&self) -> Result<bool> {
        run_store_operation(
            STORE_NAME,
            Some(self.name.as_str()),
            "collection_exists",
            self.backend.collection_exists(&self.name),
        )
        .await
    }

    async fn ensure_collection_exists(&self) -> Result<()> {
        if self.collection_exists().await? {
            debug!("Collection {} already exists", self.name);
            return Ok(());
        }

        let request = self.create_request()?;
        run_store_operation(
            STORE_NAME,
            Some(self.name.as_str()),
            "create_collection",
            self.backend.create_collection(request),
        )
        .await?;

        info!("Created Qdrant collection: {}", self.name);
        Ok(())
    }

    async fn ensure_collection_deleted(&self) -> Result<()> {
        if !self.collection_exists().await? {
            return Ok(());
        }
        run_store_operation(
            STORE_NAME,
            Some(self.name.as_str()),
            "delete_collection",
            self.backend.delete_collection(&self.name),
        )
        .await?;

        info!("Deleted Qdrant collection: {}", self.name);
        Ok(())
    }

    async fn upsert_batch(&self, records: &[T]) -> Result<Vec<RecordKey>> {
        if records.is_empty() {
            return Ok(Vec::new());
        }

        let mut storage = records
            .iter()
            .map(|record| serialize_record(&self.definition, record))
            .collect::<Result<Vec<_>>>()?;
        self.embed_text_vectors(&mut storage).await?;

        let keys: Vec<RecordKey> = storage.iter().map(|r| r.key.clone()).collect();
        let points = storage
            .into_iter()
            .map(|record| storage_to_point(&self.definition, record, self.named_vectors))
            .collect::<Result<Vec<_>>>()?;

        debug!("Upserting {} points into {}", points.len(), self.name);
        let request = UpsertPointsBuilder::new(&self.name, points).wait(true).build();
        run_store_operation(
            STORE_NAME,
            Some(self.name.as_str()),
            "upsert",
            self.backend.upsert_points(request),
        )
        .await?;

        info!("Upserted {} records into {}", keys.len(), self.name);
        Ok(keys)
    }

    async fn get_batch(&self, keys: &[RecordKey], options: GetRecordOptions) -> Result<Vec<T>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let ids = keys.iter().map(key_to_point_id).collect::<Result<Vec<PointId>>>()?;
        let request = GetPointsBuilder::new(&self.name, ids)
            .with_payload(true)
            .with_vectors(options.include_vectors)
            .build();

        let points = run_store_operation(
            STORE_NAME,
            Some(self.name.as_str()),
            "get",
            self.backend.get_points(request),
        )
        .await?;

        points
            .into_iter()
            .map(|point| {
                let storage = point_to_storage(&self.definition, point.id, point.payload, point.vectors)?;
                deserialize_record(&self.definition, storage, options.include_vectors)
            })
            .collect()
    }

    async fn delete_batch(&self, keys: &[RecordKey]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let ids = keys.iter().map(key_to_point_id).collect::<Result<Vec<PointId>>>()?;
        let request = DeletePointsBuilder::new(&self.name).points(ids).wait(true).build();
        run_store_operation(
            STORE_NAME,
            Some(self.name.as_str()),
            "delete",
            self.backend.delete_points(request),
        )
        .await?;

        debug!("Deleted {} points from {}", keys.len(), self.name);
        Ok(())
    }
}

#[async_trait]
impl<T: VectorStoreRecord> VectorSearch<T> for QdrantCollection<T> {
    async fn search_vector(
        &self,
        vector: &[f32],
        options: &VectorSearchOptions,
    ) -> Result<VectorSearchResults<T>> {
        options.validate()?;
        if vector.is_empty() {
            return Err(ConnectorError::VectorSearchExecution(
                "search requires a vector".to_string(),
            ));
        }

        let vector_name = self.search_vector_field(options)?;
        let mut builder = SearchPointsBuilder::new(&self.name, vector.to_vec(), options.top as u64)
            .offset(options.skip as u64)
            .with_payload(true)
            .with_vectors(options.include_vectors);
        if self.named_vectors {
            builder = builder.vector_name(vector_name);
        }
        if let Some(filter) = self.search_filter("search", options)? {
            builder = builder.filter(filter);
        }

        let points = run_store_operation(
            STORE_NAME,
            Some(self.name.as_str()),
            "search",
            self.backend.search_points(builder.build()),
        )
        .await?;

        debug!("Search on {} returned {} points", self.name, points.len());
        self.results_from_points(points, options)
    }

    async fn search(&self, text: &str, options: &VectorSearchOptions) -> Result<VectorSearchResults<T>> {
        let generator = self.embedding_generator.as_ref().ok_or_else(|| {
            ConnectorError::VectorSearchExecution(
                "text search requires an embedding generator".to_string(),
            )
        })?;
        let vector = generator.generate_embedding(text).await?;
        self.search_vector(&vector, options).await
    }

    async fn hybrid_search(
        &self,
        vector: &[f32],
        keywords: &[String],
        options: &VectorSearchOptions,
    ) -> Result<VectorSearchResults<T>> {
        options.validate()?;
        if vector.is_empty() {
            return Err(ConnectorError::VectorSearchExecution(
                "hybrid search requires a vector".to_string(),
            ));
        }
        if keywords.is_empty() {
            return Err(ConnectorError::VectorSearchExecution(
                "hybrid search requires non-empty keywords".to_string(),
            ));
        }
        let keyword_property = options.additional_property_name.as_deref().ok_or_else(|| {
            ConnectorError::VectorSearchExecution(
                "hybrid search requires a keyword field name".to_string(),
            )
        })?;
        let text_field = self
            .definition
            .data_fields()
            .find(|f| f.name == keyword_property || f.storage_name() == keyword_property)
            .ok_or_else(|| {
                self.operation_error(
                    "hybrid_search",
                    format!("keyword field '{}' is not a data field", keyword_property),
                )
            })?;

        let vector_name = self.search_vector_field(options)?;
        let filter = self.search_filter("hybrid_search", options)?;

        let mut keyword_filter = filter.clone().unwrap_or_default();
        keyword_filter.must.push(
            Filter::should(
                keywords
                    .iter()
                    .map(|kw| Condition::matches(text_field.storage_name(), vec![kw.clone()])),
            )
            .into(),
        );

        let mut vector_prefetch = PrefetchQueryBuilder::default()
            .query(Query::new_nearest(vector.to_vec()))
            .limit(options.top as u64);
        if self.named_vectors {
            vector_prefetch = vector_prefetch.using(vector_name);
        }
        if let Some(filter) = filter {
            vector_prefetch = vector_prefetch.filter(filter);
        }

        let request = QueryPointsBuilder::new(&self.name)
            .add_prefetch(vector_prefetch)
            .add_prefetch(PrefetchQueryBuilder::default().filter(keyword_filter))
            .query(Query::new_fusion(Fusion::Rrf))
            .limit(options.top as u64)
            .offset(options.skip as u64)
            .with_payload(true)
            .with_vectors(options.include_vectors)
            .build();

        let points = run_store_operation(
            STORE_NAME,
            Some(self.name.as_str()),
            "hybrid_search",
            self.backend.query_points(request),
        )
        .await?;

        debug!("Hybrid search on {} returned {} points", self.name, points.len());
        self.results_from_points(points, options)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::backend::MockQdrantBackend;
    use crate::mapper::json_to_qdrant;
    use kernel_connectors_common::{
        DistanceFunction, DynamicRecord, FilterExpr, VectorStoreField,
    };
    use qdrant_client::qdrant::{
        vectors::VectorsOptions as InputOptions, vectors_config::Config, vectors_output::VectorsOptions,
        Distance, NamedVectorsOutput, RetrievedPoint, VectorOutput, VectorsOutput,
    };
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    const NOTE_ID: &str = "5f7a0d5e-0d0c-4c3a-9d44-3f3c4b1f2a10";

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        title: String,
        category: String,
        #[serde(default)]
        embedding: Option<Vec<f32>>,
    }

    impl VectorStoreRecord for Note {
        fn record_definition() -> Option<RecordDefinition> {
            RecordDefinition::new(vec![
                VectorStoreField::key("id"),
                VectorStoreField::data("title").full_text_indexed(),
                VectorStoreField::data("category").indexed(),
                VectorStoreField::vector("embedding", 3),
            ])
            .ok()
        }
    }

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingGenerator for FixedEmbedder {
        fn model_id(&self) -> &str {
            "fixed"
        }

        async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0, 0.0]).collect())
        }
    }

    fn note() -> Note {
        Note {
            id: NOTE_ID.to_string(),
            title: "Rust ownership".to_string(),
            category: "lang".to_string(),
            embedding: Some(vec![0.1, 0.2, 0.3]),
        }
    }

    fn collection(backend: MockQdrantBackend) -> QdrantCollection<Note> {
        QdrantCollection::new(Arc::new(backend), "notes", None, true).unwrap()
    }

    #[allow(deprecated)]
    fn named_output(name: &str, data: Vec<f32>) -> Option<VectorsOutput> {
        Some(VectorsOutput {
            vectors_options: Some(VectorsOptions::Vectors(NamedVectorsOutput {
                vectors: HashMap::from([(
                    name.to_string(),
                    VectorOutput {
                        data,
                        ..Default::default()
                    },
                )]),
            })),
        })
    }

    fn scored_note(score: f32) -> ScoredPoint {
        ScoredPoint {
            id: Some(PointId::from(NOTE_ID.to_string())),
            payload: HashMap::from([
                ("title".to_string(), json_to_qdrant(json!("Rust ownership"))),
                ("category".to_string(), json_to_qdrant(json!("lang"))),
            ]),
            score,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_ensure_collection_exists_creates_named_vectors() {
        let mut backend = MockQdrantBackend::new();
        backend.expect_collection_exists().returning(|_| Ok(false));
        backend
            .expect_create_collection()
            .withf(|request| {
                let Some(Config::ParamsMap(params)) =
                    request.vectors_config.as_ref().and_then(|c| c.config.clone())
                else {
                    return false;
                };
                let embedding = &params.map["embedding"];
                request.collection_name == "notes"
                    && embedding.size == 3
                    && embedding.distance == Distance::Cosine as i32
            })
            .times(1)
            .returning(|_| Ok(()));

        collection(backend).ensure_collection_exists().await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_collection_exists_skips_existing() {
        let mut backend = MockQdrantBackend::new();
        backend.expect_collection_exists().returning(|_| Ok(true));
        backend.expect_create_collection().never();

        collection(backend).ensure_collection_exists().await.unwrap();
    }

    #[tokio::test]
    async fn test_unsupported_distance_is_an_operation_error() {
        let definition = RecordDefinition::new(vec![
            VectorStoreField::key("id"),
            VectorStoreField::vector("embedding", 3).with_distance_function(DistanceFunction::Hamming),
        ])
        .unwrap();
        let mut backend = MockQdrantBackend::new();
        backend.expect_collection_exists().returning(|_| Ok(false));
        backend.expect_create_collection().never();

        let collection =
            QdrantCollection::<DynamicRecord>::new(Arc::new(backend), "bits", Some(definition), true).unwrap();
        let err = collection.ensure_collection_exists().await.unwrap_err();
        assert!(matches!(err, ConnectorError::VectorStoreOperation { .. }));
        assert!(err.to_string().contains("Hamming"));
    }

    #[test]
    fn test_unnamed_vectors_allow_one_field() {
        let definition = RecordDefinition::new(vec![
            VectorStoreField::key("id"),
            VectorStoreField::vector("a", 2),
            VectorStoreField::vector("b", 2),
        ])
        .unwrap();
        let result =
            QdrantCollection::<DynamicRecord>::new(Arc::new(MockQdrantBackend::new()), "x", Some(definition), false);
        assert!(matches!(result, Err(ConnectorError::VectorStoreModel(_))));
    }

    #[tokio::test]
    async fn test_upsert_sends_points_and_waits() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_upsert_points()
            .withf(|request| {
                let point = &request.points[0];
                request.collection_name == "notes"
                    && request.wait == Some(true)
                    && point.payload.get("title") == Some(&json_to_qdrant(json!("Rust ownership")))
                    && !point.payload.contains_key("embedding")
                    && matches!(
                        point.vectors.as_ref().and_then(|v| v.vectors_options.as_ref()),
                        Some(InputOptions::Vectors(named)) if named.vectors.contains_key("embedding")
                    )
            })
            .returning(|_| Ok(()));

        let key = collection(backend).upsert(&note()).await.unwrap();
        assert_eq!(key, RecordKey::from(NOTE_ID));
    }

    #[tokio::test]
    async fn test_upsert_rejects_non_uuid_string_keys() {
        let mut backend = MockQdrantBackend::new();
        backend.expect_upsert_points().never();

        let mut bad = note();
        bad.id = "note-1".to_string();
        let err = collection(backend).upsert(&bad).await.unwrap_err();
        assert!(matches!(err, ConnectorError::VectorStoreModel(_)));
    }

    #[tokio::test]
    async fn test_text_vectors_are_embedded_before_upsert() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_upsert_points()
            .withf(|request| {
                matches!(
                    request.points[0].vectors.as_ref().and_then(|v| v.vectors_options.as_ref()),
                    Some(InputOptions::Vectors(named)) if named.vectors.contains_key("embedding")
                )
            })
            .returning(|_| Ok(()));

        let collection = QdrantCollection::<DynamicRecord>::new(
            Arc::new(backend),
            "notes",
            Note::record_definition(),
            true,
        )
        .unwrap()
        .with_embedding_generator(Arc::new(FixedEmbedder));

        let record = DynamicRecord::new()
            .with("id", 7)
            .with("title", "t")
            .with("embedding", "embed this text");
        assert_eq!(collection.upsert(&record).await.unwrap(), RecordKey::Number(7));
    }

    #[tokio::test]
    async fn test_text_vectors_without_generator_fail() {
        let mut backend = MockQdrantBackend::new();
        backend.expect_upsert_points().never();
        let collection =
            QdrantCollection::<DynamicRecord>::new(Arc::new(backend), "notes", Note::record_definition(), true)
                .unwrap();

        let record = DynamicRecord::new().with("id", 7).with("embedding", "text");
        assert!(matches!(
            collection.upsert(&record).await,
            Err(ConnectorError::VectorStoreModel(_))
        ));
    }

    #[tokio::test]
    async fn test_get_restores_record_with_vectors() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_get_points()
            .withf(|request| request.collection_name == "notes" && request.ids.len() == 1)
            .returning(|_| {
                let scored = scored_note(0.0);
                Ok(vec![RetrievedPoint {
                    id: scored.id,
                    payload: scored.payload,
                    vectors: named_output("embedding", vec![0.1, 0.2, 0.3]),
                    ..Default::default()
                }])
            });

        let found = collection(backend)
            .get(&RecordKey::from(NOTE_ID), GetRecordOptions::with_vectors())
            .await
            .unwrap();
        assert_eq!(found, Some(note()));
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let mut backend = MockQdrantBackend::new();
        backend.expect_get_points().returning(|_| Ok(Vec::new()));

        let found = collection(backend)
            .get(&RecordKey::from(NOTE_ID), GetRecordOptions::default())
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_delete_by_key() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_delete_points()
            .withf(|request| request.collection_name == "notes" && request.wait == Some(true))
            .times(1)
            .returning(|_| Ok(()));

        collection(backend).delete(&RecordKey::from(NOTE_ID)).await.unwrap();
    }

    #[tokio::test]
    async fn test_search_vector_request_and_results() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_search_points()
            .withf(|request| {
                request.collection_name == "notes"
                    && request.vector == vec![0.1, 0.2, 0.3]
                    && request.vector_name.as_deref() == Some("embedding")
                    && request.limit == 5
                    && request.offset == Some(2)
                    && request.filter.as_ref().map(|f| f.must.len()) == Some(1)
            })
            .returning(|_| Ok(vec![scored_note(0.87)]));

        let options = VectorSearchOptions::new()
            .with_top(5)
            .with_skip(2)
            .with_filter(FilterExpr::eq("category", "lang"))
            .include_total_count(true);
        let results = collection(backend)
            .search_vector(&[0.1, 0.2, 0.3], &options)
            .await
            .unwrap();

        assert_eq!(results.total_count, Some(1));
        let first = &results.results[0];
        assert_eq!(first.record.title, "Rust ownership");
        assert_eq!(first.record.embedding, None);
        assert!((first.score.unwrap() - 0.87).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_search_vector_validation() {
        let mut backend = MockQdrantBackend::new();
        backend.expect_search_points().never();
        let collection = collection(backend);

        let err = collection
            .search_vector(&[], &VectorSearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::VectorSearchExecution(_)));

        let err = collection
            .search_vector(&[1.0, 0.0, 0.0], &VectorSearchOptions::new().with_top(0))
            .await
            .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidRequest(_)));

        let options = VectorSearchOptions::new().with_filter(FilterExpr::eq("author", "x"));
        let err = collection.search_vector(&[1.0, 0.0, 0.0], &options).await.unwrap_err();
        assert!(matches!(err, ConnectorError::VectorStoreOperation { .. }));
    }

    #[tokio::test]
    async fn test_text_search_embeds_query() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_search_points()
            .withf(|request| request.vector == vec![1.0, 0.0, 0.0])
            .returning(|_| Ok(vec![]));

        let results = collection(backend)
            .with_embedding_generator(Arc::new(FixedEmbedder))
            .search("ownership", &VectorSearchOptions::default())
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(results.total_count, None);
    }

    #[tokio::test]
    async fn test_unnamed_search_omits_vector_name() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_search_points()
            .withf(|request| request.vector_name.is_none())
            .returning(|_| Ok(vec![]));

        let collection = QdrantCollection::<Note>::new(Arc::new(backend), "notes", None, false).unwrap();
        collection
            .search_vector(&[0.0, 1.0, 0.0], &VectorSearchOptions::default())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_hybrid_search_fuses_vector_and_keyword_prefetch() {
        let mut backend = MockQdrantBackend::new();
        backend
            .expect_query_points()
            .withf(|request| {
                request.collection_name == "notes"
                    && request.prefetch.len() == 2
                    && request.prefetch[0].using.as_deref() == Some("embedding")
                    && request.prefetch[0].limit == Some(3)
                    && request.prefetch[1].filter.as_ref().map(|f| f.must.len()) == Some(1)
                    && request.query == Some(Query::new_fusion(Fusion::Rrf))
                    && request.limit == Some(3)
            })
            .returning(|_| Ok(vec![scored_note(0.5)]));

        let options = VectorSearchOptions::new().with_additional_property("title");
        let results = collection(backend)
            .hybrid_search(&[0.1, 0.2, 0.3], &["ownership".to_string()], &options)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_hybrid_search_requires_keywords_and_text_field() {
        let mut backend = MockQdrantBackend::new();
        backend.expect_query_points().never();
        let collection = collection(backend);

        let options = VectorSearchOptions::new().with_additional_property("title");
        assert!(matches!(
            collection.hybrid_search(&[0.1, 0.2, 0.3], &[], &options).await,
            Err(ConnectorError::VectorSearchExecution(_))
        ));

        let keywords = vec!["rust".to_string()];
        assert!(matches!(
            collection
                .hybrid_search(&[0.1, 0.2, 0.3], &keywords, &VectorSearchOptions::default())
                .await,
            Err(ConnectorError::VectorSearchExecution(_))
        ));

        let options = VectorSearchOptions::new().with_additional_property("embedding");
        assert!(matches!(
            collection.hybrid_search(&[0.1, 0.2, 0.3], &keywords, &options).await,
            Err(ConnectorError::VectorStoreOperation { .. })
        ));
    }
}
