use async_trait::async_trait;
use kernel_connectors_common::BoxError;
use qdrant_client::qdrant::{
    CreateCollection, DeletePoints, GetPoints, QueryPoints, RetrievedPoint, ScoredPoint,
    SearchPoints, UpsertPoints,
};
use qdrant_client::Qdrant;

/// The subset of the Qdrant API the connectors call.
///
/// Requests are the SDK's own message types so that tests can assert on the
/// exact request a connector sends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QdrantBackend: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool, BoxError>;

    async fn create_collection(&self, request: CreateCollection) -> Result<(), BoxError>;

    async fn delete_collection(&self, collection: &str) -> Result<(), BoxError>;

    async fn list_collections(&self) -> Result<Vec<String>, BoxError>;

    async fn upsert_points(&self, request: UpsertPoints) -> Result<(), BoxError>;

    async fn get_points(&self, request: GetPoints) -> Result<Vec<RetrievedPoint>, BoxError>;

    async fn delete_points(&self, request: DeletePoints) -> Result<(), BoxError>;

    async fn search_points(&self, request: SearchPoints) -> Result<Vec<ScoredPoint>, BoxError>;

    async fn query_points(&self, request: QueryPoints) -> Result<Vec<ScoredPoint>, BoxError>;
}

#[async_trait]
impl QdrantBackend for Qdrant {
    async fn collection_exists(&self, collection: &str) -> Result<bool, BoxError> {
        Ok(Qdrant::collection_exists(self, collection).await?)
    }

    async fn create_collection(&self, request: CreateCollection) -> Result<(), BoxError> {
        Qdrant::create_collection(self, request).await?;
        Ok(())
    }

    async fn delete_collection(&self, collection: &str) -> Result<(), BoxError> {
        Qdrant::delete_collection(self, collection).await?;
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>, BoxError> {
        let response = Qdrant::list_collections(self).await?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn upsert_points(&self, request: UpsertPoints) -> Result<(), BoxError> {
        Qdrant::upsert_points(self, request).await?;
        Ok(())
    }

    async fn get_points(&self, request: GetPoints) -> Result<Vec<RetrievedPoint>, BoxError> {
        Ok(Qdrant::get_points(self, request).await?.result)
    }

    async fn delete_points(&self, request: DeletePoints) -> Result<(), BoxError> {
        Qdrant::delete_points(self, request).await?;
        Ok(())
    }

    async fn search_points(&self, request: SearchPoints) -> Result<Vec<ScoredPoint>, BoxError> {
        Ok(Qdrant::search_points(self, request).await?.result)
    }

    async fn query_points(&self, request: QueryPoints) -> Result<Vec<ScoredPoint>, BoxError> {
        Ok(Qdrant::query(self, request).await?.result)
    }
}
