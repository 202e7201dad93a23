use std::sync::Arc;

use kernel_connectors_common::{ConnectorError, Result};
use tracing::info;

use crate::registry::ServiceRegistry;

/// Collects services before the kernel is built.
///
/// Connector crates add `add_*` helpers to this type through extension traits.
#[derive(Default)]
pub struct KernelBuilder {
    services: ServiceRegistry,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_service<S>(mut self, service: Arc<S>, service_id: Option<&str>) -> Self
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.register(service, service_id);
        self
    }

    pub fn build(self) -> Kernel {
        info!("Kernel built with {} services", self.services.len());
        Kernel {
            services: Arc::new(self.services),
        }
    }
}

/// Read-only service container handed to application code.
#[derive(Clone)]
pub struct Kernel {
    services: Arc<ServiceRegistry>,
}

impl Kernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    pub fn get_service<S>(&self, service_id: Option<&str>) -> Option<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.get::<S>(service_id)
    }

    pub fn get_required_service<S>(&self, service_id: Option<&str>) -> Result<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.get_service::<S>(service_id).ok_or_else(|| {
            let name = std::any::type_name::<S>();
            ConnectorError::ServiceNotFound(match service_id {
                Some(id) => format!("{} with id '{}'", name, id),
                None => name.to_string(),
            })
        })
    }

    pub fn get_services<S>(&self) -> Vec<Arc<S>>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.get_all::<S>()
    }

    pub fn service_ids<S>(&self) -> Vec<String>
    where
        S: ?Sized + Send + Sync + 'static,
    {
        self.services.ids::<S>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream;
    use kernel_connectors_common::{
        AuthorRole, ChatCompletionService, ChatHistory, ChatMessageContent, ChatMessageStream,
        PromptExecutionSettings,
    };

    struct CannedChat {
        model: String,
    }

    #[async_trait]
    impl ChatCompletionService for CannedChat {
        fn model_id(&self) -> &str {
            &self.model
        }

        fn service_name(&self) -> &str {
            "Canned"
        }

        async fn get_chat_message_contents(
            &self,
            _history: &ChatHistory,
            _settings: &PromptExecutionSettings,
        ) -> Result<Vec<ChatMessageContent>> {
            Ok(vec![ChatMessageContent::new(AuthorRole::Assistant, self.model.clone())])
        }

        async fn get_streaming_chat_message_contents(
            &self,
            _history: &ChatHistory,
            _settings: &PromptExecutionSettings,
        ) -> Result<ChatMessageStream> {
            Ok(Box::pin(stream::empty()))
        }
    }

    fn chat(model: &str) -> Arc<dyn ChatCompletionService> {
        Arc::new(CannedChat {
            model: model.to_string(),
        })
    }

    #[tokio::test]
    async fn test_kernel_resolves_trait_objects() {
        let kernel = Kernel::builder()
            .add_service(chat("llama3"), Some("local"))
            .add_service(chat("gpt-4o"), Some("hosted"))
            .build();

        let local = kernel
            .get_required_service::<dyn ChatCompletionService>(Some("local"))
            .unwrap();
        assert_eq!(local.model_id(), "llama3");

        let default = kernel.get_service::<dyn ChatCompletionService>(None).unwrap();
        let reply = default
            .get_chat_message_content(&ChatHistory::new(), &PromptExecutionSettings::default())
            .await
            .unwrap();
        assert_eq!(reply.text(), "gpt-4o");

        assert_eq!(kernel.get_services::<dyn ChatCompletionService>().len(), 2);
        assert_eq!(
            kernel.service_ids::<dyn ChatCompletionService>(),
            vec!["local", "hosted"]
        );
    }

    #[test]
    fn test_missing_service_is_an_error() {
        let kernel = Kernel::builder().build();
        let err = kernel
            .get_required_service::<dyn ChatCompletionService>(Some("missing"))
            .err()
            .unwrap();
        assert!(matches!(err, ConnectorError::ServiceNotFound(ref m) if m.contains("missing")));
    }
}
