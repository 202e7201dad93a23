use std::sync::Arc;

use kernel_connectors_common::{ChatCompletionService, EmbeddingGenerator};
use kernel_connectors_core::KernelBuilder;

use crate::chat_completion::OpenAIChatCompletion;
use crate::embedding::OpenAIEmbeddingGenerator;

/// Registers OpenAI services on a [`KernelBuilder`] under their common traits.
pub trait OpenAIKernelBuilderExt {
    fn add_openai_chat_completion(self, service: OpenAIChatCompletion, service_id: Option<&str>) -> Self;

    fn add_openai_embedding_generator(
        self,
        generator: OpenAIEmbeddingGenerator,
        service_id: Option<&str>,
    ) -> Self;
}

impl OpenAIKernelBuilderExt for KernelBuilder {
    fn add_openai_chat_completion(self, service: OpenAIChatCompletion, service_id: Option<&str>) -> Self {
        self.add_service::<dyn ChatCompletionService>(Arc::new(service), service_id)
    }

    fn add_openai_embedding_generator(
        self,
        generator: OpenAIEmbeddingGenerator,
        service_id: Option<&str>,
    ) -> Self {
        self.add_service::<dyn EmbeddingGenerator>(Arc::new(generator), service_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::OpenAISettings;
    use kernel_connectors_core::Kernel;

    #[test]
    fn test_services_resolve_by_id() {
        let settings = OpenAISettings::new("sk-test")
            .with_chat_model("gpt-4o-mini")
            .with_embedding_model("text-embedding-3-small");

        let kernel = Kernel::builder()
            .add_openai_chat_completion(OpenAIChatCompletion::from_settings(&settings).unwrap(), Some("openai"))
            .add_openai_embedding_generator(OpenAIEmbeddingGenerator::from_settings(&settings).unwrap(), None)
            .build();

        let chat = kernel
            .get_required_service::<dyn ChatCompletionService>(Some("openai"))
            .unwrap();
        assert_eq!(chat.service_name(), "OpenAI");
        assert!(kernel.get_required_service::<dyn ChatCompletionService>(Some("azure")).is_err());
        assert_eq!(
            kernel.get_service::<dyn EmbeddingGenerator>(None).unwrap().model_id(),
            "text-embedding-3-small"
        );
    }
}
