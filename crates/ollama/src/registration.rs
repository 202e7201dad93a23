use std::sync::Arc;

use kernel_connectors_common::{ChatCompletionService, EmbeddingGenerator, TextGenerationService};
use kernel_connectors_core::KernelBuilder;

use crate::chat_completion::OllamaChatCompletion;
use crate::embedding::OllamaEmbeddingGenerator;
use crate::text_generation::OllamaTextGeneration;

/// Registers Ollama services on a [`KernelBuilder`] under their common traits.
pub trait OllamaKernelBuilderExt {
    fn add_ollama_chat_completion(self, service: OllamaChatCompletion, service_id: Option<&str>) -> Self;

    fn add_ollama_text_generation(self, service: OllamaTextGeneration, service_id: Option<&str>) -> Self;

    fn add_ollama_embedding_generator(
        self,
        generator: OllamaEmbeddingGenerator,
        service_id: Option<&str>,
    ) -> Self;
}

impl OllamaKernelBuilderExt for KernelBuilder {
    fn add_ollama_chat_completion(self, service: OllamaChatCompletion, service_id: Option<&str>) -> Self {
        self.add_service::<dyn ChatCompletionService>(Arc::new(service), service_id)
    }

    fn add_ollama_text_generation(self, service: OllamaTextGeneration, service_id: Option<&str>) -> Self {
        self.add_service::<dyn TextGenerationService>(Arc::new(service), service_id)
    }

    fn add_ollama_embedding_generator(
        self,
        generator: OllamaEmbeddingGenerator,
        service_id: Option<&str>,
    ) -> Self {
        self.add_service::<dyn EmbeddingGenerator>(Arc::new(generator), service_id)
    }
}
