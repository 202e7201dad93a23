use async_trait::async_trait;
use kernel_connectors_common::embedding::ensure_embedding_count;
use kernel_connectors_common::{EmbeddingGenerator, Result};
use tracing::debug;

use crate::client::OllamaClient;
use crate::models::EmbedRequest;
use crate::settings::OllamaSettings;
use crate::SERVICE_NAME;

/// Batch embeddings from `/api/embed`.
#[derive(Debug, Clone)]
pub struct OllamaEmbeddingGenerator {
    client: OllamaClient,
    model_id: String,
    dimensions: Option<usize>,
}

impl OllamaEmbeddingGenerator {
    pub fn new(client: OllamaClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            dimensions: None,
        }
    }

    pub fn from_settings(settings: &OllamaSettings) -> Result<Self> {
        let model_id = OllamaSettings::require_model(&settings.embedding_model_id, "embedding")?;
        Ok(Self::new(settings.build_client()?, model_id))
    }

    /// Declares the model's output size, e.g. 768 for `nomic-embed-text`.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

#[async_trait]
impl EmbeddingGenerator for OllamaEmbeddingGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: self.model_id.clone(),
            input: texts.to_vec(),
            truncate: None,
            keep_alive: None,
        };
        debug!("Embedding {} inputs with {}", texts.len(), self.model_id);

        let response = self.client.embed(&request).await?;
        ensure_embedding_count(SERVICE_NAME, texts.len(), &response.embeddings)?;
        Ok(response.embeddings)
    }
}
