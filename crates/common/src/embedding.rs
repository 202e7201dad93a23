use async_trait::async_trait;

use crate::error::{ConnectorError, Result};

#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    fn model_id(&self) -> &str;

    /// Output dimensionality when the model is known to produce a fixed size.
    fn dimensions(&self) -> Option<usize> {
        None
    }

    /// One embedding per input, in input order.
    async fn generate_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.generate_embeddings(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| ConnectorError::invalid_response(self.model_id(), "no embedding returned"))
    }
}

/// Fails with [`ConnectorError::InvalidResponse`] unless one embedding came back per input.
pub fn ensure_embedding_count(service: &str, expected: usize, embeddings: &[Vec<f32>]) -> Result<()> {
    if embeddings.len() != expected {
        return Err(ConnectorError::invalid_response(
            service,
            format!(
                "expected {} embeddings, received {}",
                expected,
                embeddings.len()
            ),
        ));
    }
    Ok(())
}
