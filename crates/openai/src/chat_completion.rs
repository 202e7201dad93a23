use std::collections::HashMap;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatChoice, ChatChoiceStream, ChatCompletionMessageToolCall, ChatCompletionNamedToolChoice,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionToolChoiceOption,
    ChatCompletionToolArgs, ChatCompletionToolType, CompletionUsage, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FinishReason, FunctionCall, FunctionName, FunctionObjectArgs, Role,
    Stop,
};
use async_openai::error::OpenAIError;
use async_openai::Client;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use kernel_connectors_common::{
    AuthorRole, ChatCompletionService, ChatHistory, ChatMessageContent, ChatMessageStream, ConnectorError,
    FunctionCallContent, PromptExecutionSettings, Result, StreamingChatMessageContent, ToolChoice,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::map_openai_error;
use crate::settings::OpenAISettings;
use crate::SERVICE_NAME;

/// Chat completion through the OpenAI chat API.
#[derive(Debug, Clone)]
pub struct OpenAIChatCompletion {
    client: Client<OpenAIConfig>,
    model_id: String,
}

impl OpenAIChatCompletion {
    pub fn new(client: Client<OpenAIConfig>, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    pub fn from_settings(settings: &OpenAISettings) -> Result<Self> {
        let model_id = OpenAISettings::require_model(&settings.chat_model_id, "chat")?;
        Ok(Self::new(settings.build_client()?, model_id))
    }

    fn build_request(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<CreateChatCompletionRequest> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(settings.resolve_model(&self.model_id))
            .messages(to_request_messages(history)?);

        if let Some(temperature) = settings.temperature {
            args.temperature(temperature);
        }
        if let Some(top_p) = settings.top_p {
            args.top_p(top_p);
        }
        if let Some(max_tokens) = settings.max_tokens {
            args.max_tokens(max_tokens);
        }
        if !settings.stop.is_empty() {
            args.stop(Stop::StringArray(settings.stop.clone()));
        }
        if let Some(seed) = settings.seed {
            args.seed(seed);
        }
        if let Some(penalty) = settings.presence_penalty {
            args.presence_penalty(penalty);
        }
        if let Some(penalty) = settings.frequency_penalty {
            args.frequency_penalty(penalty);
        }
        if !settings.tools.is_empty() {
            args.tools(to_tools(settings)?);
            if let Some(choice) = &settings.tool_choice {
                args.tool_choice(to_tool_choice(choice));
            }
        }
        if let Some(user) = settings.extension_str("user") {
            args.user(user);
        }

        args.build().map_err(|e| map_openai_error("chat", e))
    }
}

fn to_request_messages(history: &ChatHistory) -> Result<Vec<ChatCompletionRequestMessage>> {
    history.iter().map(to_request_message).collect()
}

fn to_request_message(message: &ChatMessageContent) -> Result<ChatCompletionRequestMessage> {
    let text = message.content.clone().unwrap_or_default();
    let built = match message.role {
        AuthorRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(text)
            .build()
            .map(ChatCompletionRequestMessage::System),
        AuthorRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(text)
            .build()
            .map(ChatCompletionRequestMessage::User),
        AuthorRole::Assistant => {
            let mut args = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(content) = &message.content {
                args.content(content.clone());
            }
            if !message.tool_calls.is_empty() {
                args.tool_calls(message.tool_calls.iter().map(to_tool_call).collect::<Vec<_>>());
            }
            args.build().map(ChatCompletionRequestMessage::Assistant)
        }
        AuthorRole::Tool => {
            let tool_call_id = message.tool_call_id.clone().ok_or_else(|| {
                ConnectorError::InvalidRequest("tool message without a tool call id".to_string())
            })?;
            ChatCompletionRequestToolMessageArgs::default()
                .content(text)
                .tool_call_id(tool_call_id)
                .build()
                .map(ChatCompletionRequestMessage::Tool)
        }
    };
    built.map_err(|e| map_openai_error("chat", e))
}

fn to_tool_call(call: &FunctionCallContent) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

fn to_tools(settings: &PromptExecutionSettings) -> Result<Vec<ChatCompletionTool>> {
    settings
        .tools
        .iter()
        .map(|tool| {
            let mut function = FunctionObjectArgs::default();
            function.name(tool.name.clone()).parameters(tool.parameters.clone());
            if let Some(description) = &tool.description {
                function.description(description.clone());
            }
            ChatCompletionToolArgs::default()
                .r#type(ChatCompletionToolType::Function)
                .function(function.build()?)
                .build()
        })
        .collect::<std::result::Result<Vec<_>, OpenAIError>>()
        .map_err(|e| map_openai_error("chat", e))
}

fn to_tool_choice(choice: &ToolChoice) -> ChatCompletionToolChoiceOption {
    match choice {
        ToolChoice::Auto => ChatCompletionToolChoiceOption::Auto,
        ToolChoice::None => ChatCompletionToolChoiceOption::None,
        ToolChoice::Required => ChatCompletionToolChoiceOption::Required,
        ToolChoice::Function(name) => ChatCompletionToolChoiceOption::Named(ChatCompletionNamedToolChoice {
            r#type: ChatCompletionToolType::Function,
            function: FunctionName { name: name.clone() },
        }),
    }
}

fn finish_reason_str(reason: FinishReason) -> String {
    match reason {
        FinishReason::Stop => "stop",
        FinishReason::Length => "length",
        FinishReason::ToolCalls => "tool_calls",
        FinishReason::ContentFilter => "content_filter",
        FinishReason::FunctionCall => "function_call",
    }
    .to_string()
}

fn role_from(role: Role) -> AuthorRole {
    match role {
        Role::System => AuthorRole::System,
        Role::User => AuthorRole::User,
        Role::Tool | Role::Function => AuthorRole::Tool,
        Role::Assistant => AuthorRole::Assistant,
    }
}

fn usage_metadata(usage: Option<&CompletionUsage>) -> HashMap<String, Value> {
    let mut metadata = HashMap::new();
    if let Some(usage) = usage {
        metadata.insert("prompt_tokens".to_string(), Value::from(usage.prompt_tokens));
        metadata.insert("completion_tokens".to_string(), Value::from(usage.completion_tokens));
        metadata.insert("total_tokens".to_string(), Value::from(usage.total_tokens));
    }
    metadata
}

fn to_chat_message(choice: ChatChoice, model: &str, metadata: HashMap<String, Value>) -> ChatMessageContent {
    ChatMessageContent {
        role: role_from(choice.message.role),
        content: choice.message.content,
        tool_calls: choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| FunctionCallContent {
                id: call.id,
                name: call.function.name,
                arguments: call.function.arguments,
            })
            .collect(),
        tool_call_id: None,
        model_id: Some(model.to_string()),
        finish_reason: choice.finish_reason.map(finish_reason_str),
        metadata,
    }
}

fn to_streaming_chunk(choice: ChatChoiceStream, model: &str) -> StreamingChatMessageContent {
    let mut metadata = HashMap::new();
    metadata.insert("choice_index".to_string(), Value::from(choice.index));

    StreamingChatMessageContent {
        role: choice.delta.role.map(role_from),
        content: choice.delta.content,
        // Continuation chunks carry argument fragments without id or name.
        tool_calls: choice
            .delta
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|chunk| {
                let (name, arguments) = chunk.function.map(|f| (f.name, f.arguments)).unwrap_or_default();
                FunctionCallContent {
                    id: chunk.id.unwrap_or_default(),
                    name: name.unwrap_or_default(),
                    arguments: arguments.unwrap_or_default(),
                }
            })
            .collect(),
        model_id: Some(model.to_string()),
        finish_reason: choice.finish_reason.map(finish_reason_str),
        metadata,
    }
}

#[async_trait]
impl ChatCompletionService for OpenAIChatCompletion {
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
        let request = self.build_request(history, settings)?;
        debug!("OpenAI chat with {} messages on {}", request.messages.len(), request.model);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| map_openai_error("chat", e))?;

        let metadata = usage_metadata(response.usage.as_ref());
        info!(
            choices = response.choices.len(),
            "OpenAI chat completed on {}",
            response.model
        );
        Ok(response
            .choices
            .into_iter()
            .map(|choice| to_chat_message(choice, &response.model, metadata.clone()))
            .collect())
    }

    async fn get_streaming_chat_message_contents(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<ChatMessageStream> {
        let mut request = self.build_request(history, settings)?;
        request.stream = Some(true);
        debug!("OpenAI streaming chat on {}", request.model);

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| map_openai_error("chat_stream", e))?;

        Ok(stream
            .flat_map(|item| {
                let items: Vec<Result<StreamingChatMessageContent>> = match item {
                    Ok(chunk) => chunk
                        .choices
                        .into_iter()
                        .map(|choice| Ok(to_streaming_chunk(choice, &chunk.model)))
                        .collect(),
                    Err(e) => vec![Err(map_openai_error("chat_stream", e))],
                };
                stream::iter(items)
            })
            .boxed())
    }
}
