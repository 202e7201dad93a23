use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use kernel_connectors_common::{
    AuthorRole, ChatCompletionService, ChatHistory, ChatMessageContent, ChatMessageStream,
    FunctionCallContent, PromptExecutionSettings, Result, StreamingChatMessageContent, ToolChoice,
};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::OllamaClient;
use crate::models::{ChatRequest, ChatResponse, Message, ModelOptions, Tool, ToolCall, ToolCallFunction, ToolFunction};
use crate::settings::OllamaSettings;
use crate::SERVICE_NAME;

/// Chat completion against `/api/chat`.
#[derive(Debug, Clone)]
pub struct OllamaChatCompletion {
    client: OllamaClient,
    model_id: String,
}

impl OllamaChatCompletion {
    pub fn new(client: OllamaClient, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    pub fn from_settings(settings: &OllamaSettings) -> Result<Self> {
        let model_id = OllamaSettings::require_model(&settings.chat_model_id, "chat")?;
        Ok(Self::new(settings.build_client()?, model_id))
    }

    fn build_request(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
        stream: bool,
    ) -> ChatRequest {
        ChatRequest {
            model: settings.resolve_model(&self.model_id).to_string(),
            messages: to_messages(history),
            tools: to_tools(settings),
            stream,
            options: model_options(settings),
            format: settings.extension_data.get("format").cloned(),
            keep_alive: settings.extension_str("keep_alive").map(str::to_string),
        }
    }
}

/// Sampling options shared by chat and text generation; `None` when nothing is set.
pub(crate) fn model_options(settings: &PromptExecutionSettings) -> Option<ModelOptions> {
    let options = ModelOptions {
        temperature: settings.temperature,
        top_p: settings.top_p,
        num_predict: settings.max_tokens,
        stop: settings.stop.clone(),
        seed: settings.seed,
        presence_penalty: settings.presence_penalty,
        frequency_penalty: settings.frequency_penalty,
    };
    (!options.is_empty()).then_some(options)
}

fn to_messages(history: &ChatHistory) -> Vec<Message> {
    // Ollama names tool results by function, not by call id.
    let mut call_names: HashMap<&str, &str> = HashMap::new();

    history
        .iter()
        .map(|message| {
            for call in &message.tool_calls {
                call_names.insert(call.id.as_str(), call.name.as_str());
            }

            Message {
                role: message.role.as_str().to_string(),
                content: message.content.clone().unwrap_or_default(),
                images: Vec::new(),
                tool_calls: message
                    .tool_calls
                    .iter()
                    .map(|call| ToolCall {
                        id: None,
                        function: ToolCallFunction {
                            name: call.name.clone(),
                            arguments: arguments_to_object(&call.arguments),
                        },
                    })
                    .collect(),
                tool_name: match (message.role, &message.tool_call_id) {
                    (AuthorRole::Tool, Some(id)) => call_names.get(id.as_str()).map(|name| name.to_string()),
                    _ => None,
                },
            }
        })
        .collect()
}

fn to_tools(settings: &PromptExecutionSettings) -> Vec<Tool> {
    let only: Option<&str> = match &settings.tool_choice {
        Some(ToolChoice::None) => return Vec::new(),
        Some(ToolChoice::Function(name)) => Some(name.as_str()),
        _ => None,
    };

    settings
        .tools
        .iter()
        .filter(|tool| only.map_or(true, |name| tool.name == name))
        .map(|tool| Tool {
            kind: "function".to_string(),
            function: ToolFunction {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
        })
        .collect()
}

fn arguments_to_object(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()))
}

fn arguments_to_string(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        Value::Null => "{}".to_string(),
        other => other.to_string(),
    }
}

fn to_function_calls(tool_calls: &[ToolCall]) -> Vec<FunctionCallContent> {
    tool_calls
        .iter()
        .map(|call| FunctionCallContent {
            id: call
                .id
                .clone()
                .unwrap_or_else(|| format!("call_{}", Uuid::new_v4().simple())),
            name: call.function.name.clone(),
            arguments: arguments_to_string(&call.function.arguments),
        })
        .collect()
}

fn response_metadata(response: &ChatResponse) -> HashMap<String, Value> {
    let mut metadata = HashMap::new();
    if let Some(count) = response.eval_count {
        metadata.insert("eval_count".to_string(), Value::from(count));
    }
    if let Some(count) = response.prompt_eval_count {
        metadata.insert("prompt_eval_count".to_string(), Value::from(count));
    }
    if let Some(duration) = response.total_duration {
        metadata.insert("total_duration".to_string(), Value::from(duration));
    }
    if let Some(reason) = &response.done_reason {
        metadata.insert("done_reason".to_string(), Value::from(reason.clone()));
    }
    metadata
}

fn to_chat_message(response: ChatResponse) -> ChatMessageContent {
    let metadata = response_metadata(&response);
    let message = response.message.unwrap_or_default();
    let tool_calls = to_function_calls(&message.tool_calls);

    ChatMessageContent {
        role: AuthorRole::parse(&message.role).unwrap_or(AuthorRole::Assistant),
        content: (!message.content.is_empty() || tool_calls.is_empty()).then_some(message.content),
        tool_calls,
        tool_call_id: None,
        model_id: Some(response.model),
        finish_reason: response.done_reason,
        metadata,
    }
}

fn to_streaming_chunk(response: ChatResponse) -> StreamingChatMessageContent {
    let metadata = if response.done {
        response_metadata(&response)
    } else {
        HashMap::new()
    };
    let message = response.message.unwrap_or_default();

    StreamingChatMessageContent {
        role: Some(AuthorRole::parse(&message.role).unwrap_or(AuthorRole::Assistant)),
        content: (!message.content.is_empty()).then_some(message.content),
        tool_calls: to_function_calls(&message.tool_calls),
        model_id: Some(response.model),
        finish_reason: if response.done { response.done_reason } else { None },
        metadata,
    }
}

#[async_trait]
impl ChatCompletionService for OllamaChatCompletion {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn service_name(&self) -> &str {
        SERVICE_NAME
    }

    async fn get_chat_message_contents(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<Vec<ChatMessageContent>> {
        let request = self.build_request(history, settings, false);
        debug!("Ollama chat with {} messages on {}", request.messages.len(), request.model);

        let response = self.client.chat(&request).await?;
        info!(
            eval_count = response.eval_count,
            "Ollama chat completed on {}",
            response.model
        );
        Ok(vec![to_chat_message(response)])
    }

    async fn get_streaming_chat_message_contents(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<ChatMessageStream> {
        let request = self.build_request(history, settings, true);
        debug!("Ollama streaming chat with {} messages on {}", request.messages.len(), request.model);

        let stream = self.client.chat_stream(&request).await?;
        Ok(stream.map(|chunk| chunk.map(to_streaming_chunk)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use kernel_connectors_common::FunctionDefinition;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(server: &MockServer) -> OllamaChatCompletion {
        let client = OllamaClient::new(&server.uri(), Duration::from_secs(5), 0).unwrap();
        OllamaChatCompletion::new(client, "llama3.2")
    }

    fn weather_tool() -> FunctionDefinition {
        FunctionDefinition {
            name: "get_weather".into(),
            description: Some("Current weather".into()),
            parameters: json!({"type": "object", "properties": {"city": {"type": "string"}}}),
        }
    }

    #[tokio::test]
    async fn test_request_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_json(json!({
                "model": "llama3.2",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Weather in Paris?"},
                    {"role": "assistant", "content": "", "tool_calls": [
                        {"function": {"name": "get_weather", "arguments": {"city": "Paris"}}}
                    ]},
                    {"role": "tool", "content": "18C", "tool_name": "get_weather"}
                ],
                "tools": [{"type": "function", "function": {
                    "name": "get_weather",
                    "description": "Current weather",
                    "parameters": {"type": "object", "properties": {"city": {"type": "string"}}}
                }}],
                "stream": false,
                "options": {"temperature": 0.25, "num_predict": 100}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": {"role": "assistant", "content": "18C and sunny."},
                "done": true,
                "done_reason": "stop",
                "eval_count": 7,
                "prompt_eval_count": 40,
                "total_duration": 123456
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut history = ChatHistory::with_system_message("Be brief.");
        history.add_user_message("Weather in Paris?");
        history.add_message(ChatMessageContent::assistant_tool_calls(vec![FunctionCallContent {
            id: "call_1".into(),
            name: "get_weather".into(),
            arguments: "{\"city\":\"Paris\"}".into(),
        }]));
        history.add_tool_message("call_1", "18C");

        let settings = PromptExecutionSettings::new()
            .with_temperature(0.25)
            .with_max_tokens(100)
            .with_tools(vec![weather_tool()], ToolChoice::Auto);

        let reply = service(&server)
            .get_chat_message_content(&history, &settings)
            .await
            .unwrap();

        assert_eq!(reply.role, AuthorRole::Assistant);
        assert_eq!(reply.text(), "18C and sunny.");
        assert_eq!(reply.model_id.as_deref(), Some("llama3.2"));
        assert_eq!(reply.finish_reason.as_deref(), Some("stop"));
        assert_eq!(reply.metadata["eval_count"], json!(7));
        assert_eq!(reply.metadata["prompt_eval_count"], json!(40));
        assert_eq!(reply.metadata["total_duration"], json!(123456));
        assert_eq!(reply.metadata["done_reason"], json!("stop"));
    }

    #[tokio::test]
    async fn test_tool_calls_get_ids_and_string_arguments() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2",
                "message": {
                    "role": "assistant",
                    "content": "",
                    "tool_calls": [{"function": {"name": "get_weather", "arguments": {"city": "Oslo"}}}]
                },
                "done": true
            })))
            .mount(&server)
            .await;

        let reply = service(&server)
            .get_chat_message_content(&ChatHistory::new(), &PromptExecutionSettings::default())
            .await
            .unwrap();

        assert!(reply.content.is_none());
        let call = &reply.tool_calls[0];
        assert!(call.id.starts_with("call_"));
        assert_eq!(call.name, "get_weather");
        let arguments: Value = serde_json::from_str(&call.arguments).unwrap();
        assert_eq!(arguments, json!({"city": "Oslo"}));
    }

    #[tokio::test]
    async fn test_model_override_and_tool_choice_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .and(body_partial_json(json!({"model": "qwen2.5", "keep_alive": "5m"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "qwen2.5",
                "message": {"role": "assistant", "content": "ok"},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let settings = PromptExecutionSettings::new()
            .with_model("qwen2.5")
            .with_extension("keep_alive", "5m")
            .with_tools(vec![weather_tool()], ToolChoice::None);

        let service = service(&server);
        assert!(service.build_request(&ChatHistory::new(), &settings, false).tools.is_empty());
        let reply = service
            .get_chat_message_content(&ChatHistory::new(), &settings)
            .await
            .unwrap();
        assert_eq!(reply.text(), "ok");
    }

    #[tokio::test]
    async fn test_streaming_chunks() {
        let server = MockServer::start().await;
        let body = concat!(
            "{\"model\":\"llama3.2\",\"message\":{\"role\":\"assistant\",\"content\":\"Bon\"},\"done\":false}\n",
            "{\"model\":\"llama3.2\",\"message\":{\"role\":\"assistant\",\"content\":\"jour\"},\"done\":false}\n",
            "{\"model\":\"llama3.2\",\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true,\"done_reason\":\"stop\",\"eval_count\":2}\n"
        );
        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/x-ndjson"))
            .mount(&server)
            .await;

        let chunks: Vec<StreamingChatMessageContent> = service(&server)
            .get_streaming_chat_message_contents(&ChatHistory::new(), &PromptExecutionSettings::default())
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        let text: String = chunks.iter().filter_map(|c| c.content.as_deref()).collect();
        assert_eq!(text, "Bonjour");
        assert!(chunks[0].finish_reason.is_none());
        assert!(chunks[0].metadata.is_empty());
        assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));
        assert_eq!(chunks[2].metadata["eval_count"], json!(2));
    }

    #[test]
    fn test_argument_conversion() {
        assert_eq!(arguments_to_object(""), json!({}));
        assert_eq!(arguments_to_object("{\"a\":1}"), json!({"a": 1}));
        assert_eq!(arguments_to_object("not json"), json!("not json"));
        assert_eq!(arguments_to_string(&json!({"a": 1})), "{\"a\":1}");
        assert_eq!(arguments_to_string(&json!("raw")), "raw");
        assert_eq!(arguments_to_string(&Value::Null), "{}");
    }

    #[test]
    fn test_function_tool_choice_filters_tools() {
        let mut other = weather_tool();
        other.name = "get_time".into();
        let settings = PromptExecutionSettings::new().with_tools(
            vec![weather_tool(), other],
            ToolChoice::Function("get_time".into()),
        );

        let tools = to_tools(&settings);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].function.name, "get_time");
    }
}
