use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use kernel_connectors_common::{PromptExecutionSettings, Result, TextContent, TextGenerationService, TextStream};
use serde_json::Value;
use tracing::debug;

use crate::chat_completion::model_options;
use crate::client::OllamaClient;
use crate::models::{GenerateRequest, GenerateResponse};
use crate::settings::OllamaSettings;

/// Raw prompt completion against `/api/generate`.
#[derive(Debug, Clone)]
pub struct OllamaTextGeneration {
    client: OllamaClient,
    model_id: String,
}

impl OllamaTextGeneration {
    pub fn new(client: OllamaClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    pub fn from_settings(settings: &OllamaSettings) -> Result<Self> {
        let model_id = OllamaSettings::require_model(&settings.text_model_id, "text")?;
        Ok(Self::new(settings.build_client()?, model_id))
    }

    fn build_request(&self, prompt: &str, settings: &PromptExecutionSettings, stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: settings.resolve_model(&self.model_id).to_string(),
            prompt: prompt.to_string(),
            system: settings.extension_str("system").map(str::to_string),
            stream,
            options: model_options(settings),
            format: settings.extension_data.get("format").cloned(),
            keep_alive: settings.extension_str("keep_alive").map(str::to_string),
        }
    }
}

fn to_text_content(response: GenerateResponse) -> TextContent {
    let mut metadata = HashMap::new();
    if response.done {
        if let Some(count) = response.eval_count {
            metadata.insert("eval_count".to_string(), Value::from(count));
        }
        if let Some(count) = response.prompt_eval_count {
            metadata.insert("prompt_eval_count".to_string(), Value::from(count));
        }
        if let Some(duration) = response.total_duration {
            metadata.insert("total_duration".to_string(), Value::from(duration));
        }
        if let Some(reason) = response.done_reason {
            metadata.insert("done_reason".to_string(), Value::from(reason));
        }
    }

    TextContent {
        text: response.response,
        model_id: Some(response.model),
        metadata,
    }
}

#[async_trait]
impl TextGenerationService for OllamaTextGeneration {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn get_text_contents(
        &self,
        prompt: &str,
        settings: &PromptExecutionSettings,
    ) -> Result<Vec<TextContent>> {
        let request = self.build_request(prompt, settings, false);
        debug!("Ollama generate on {}", request.model);
        let response = self.client.generate(&request).await?;
        Ok(vec![to_text_content(response)])
    }

    async fn get_streaming_text_contents(
        &self,
        prompt: &str,
        settings: &PromptExecutionSettings,
    ) -> Result<TextStream> {
        let request = self.build_request(prompt, settings, true);
        debug!("Ollama streaming generate on {}", request.model);
        let stream = self.client.generate_stream(&request).await?;
        Ok(stream.map(|chunk| chunk.map(to_text_content)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> OllamaTextGeneration {
        let client = OllamaClient::new(&server.uri(), Duration::from_secs(5), 0).unwrap();
        OllamaTextGeneration::new(client, "llama3.2")
    }

    #[tokio::test]
    async fn test_generate_request_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_json(json!({
                "model": "llama3.2",
                "prompt": "Why is the sky blue?",
                "system": "Answer in one line.",
                "stream": false,
                "options": {"stop": ["\n"], "seed": 42}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "response": "Rayleigh scattering.",
                "done": true,
                "done_reason": "stop",
                "eval_count": 4
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut settings = PromptExecutionSettings::new().with_extension("system", "Answer in one line.");
        settings.stop = vec!["\n".into()];
        settings.seed = Some(42);

        let contents = service(&server)
            .get_text_contents("Why is the sky blue?", &settings)
            .await
            .unwrap();

        assert_eq!(contents.len(), 1);
        assert_eq!(contents[0].text, "Rayleigh scattering.");
        assert_eq!(contents[0].metadata["done_reason"], json!("stop"));
        assert_eq!(contents[0].metadata["eval_count"], json!(4));
    }

    #[tokio::test]
    async fn test_streaming_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "{\"model\":\"llama3.2\",\"response\":\"Ray\",\"done\":false}\n{\"model\":\"llama3.2\",\"response\":\"leigh\",\"done\":true}\n",
                "application/x-ndjson",
            ))
            .mount(&server)
            .await;

        let chunks: Vec<TextContent> = service(&server)
            .get_streaming_text_contents("sky?", &PromptExecutionSettings::default())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let text: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(text, "Rayleigh");
        assert!(chunks[0].metadata.is_empty());
    }
}
