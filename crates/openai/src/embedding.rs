use async_openai::config::OpenAIConfig;
use async_openai::types::CreateEmbeddingRequestArgs;
use async_openai::Client;
use async_trait::async_trait;
use kernel_connectors_common::embedding::ensure_embedding_count;
use kernel_connectors_common::{EmbeddingGenerator, Result};
use tracing::debug;

use crate::error::map_openai_error;
use crate::settings::OpenAISettings;
use crate::SERVICE_NAME;

/// Batch embeddings through the OpenAI embeddings API.
#[derive(Debug, Clone)]
pub struct OpenAIEmbeddingGenerator {
    client: Client<OpenAIConfig>,
    model_id: String,
    dimensions: Option<u32>,
}

impl OpenAIEmbeddingGenerator {
    pub fn new(client: Client<OpenAIConfig>, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
            dimensions: None,
        }
    }

    pub fn from_settings(settings: &OpenAISettings) -> Result<Self> {
        let model_id = OpenAISettings::require_model(&settings.embedding_model_id, "embedding")?;
        let generator = Self::new(settings.build_client()?, model_id);
        Ok(match settings.embedding_dimensions {
            Some(dimensions) => generator.with_dimensions(dimensions),
            None => generator,
        })
    }

    /// Requests shortened embeddings (text-embedding-3 models only).
    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }
}

#[async_trait]
impl EmbeddingGenerator for OpenAIEmbeddingGenerator {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions.map(|d| d as usize)
    }

    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = CreateEmbeddingRequestArgs::default();
        args.model(&self.model_id).input(texts.to_vec());
        if let Some(dimensions) = self.dimensions {
            args.dimensions(dimensions);
        }
        let request = args.build().map_err(|e| map_openai_error("embed", e))?;

        debug!("Embedding {} inputs with {}", texts.len(), self.model_id);
        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| map_openai_error("embed", e))?;

        let mut data = response.data;
        data.sort_by_key(|embedding| embedding.index);
        let embeddings: Vec<Vec<f32>> = data.into_iter().map(|embedding| embedding.embedding).collect();
        ensure_embedding_count(SERVICE_NAME, texts.len(), &embeddings)?;
        Ok(embeddings)
    }
}
