use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConnectorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorRole {
    System,
    User,
    Assistant,
    Tool,
}

impl AuthorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorRole::System => "system",
            AuthorRole::User => "user",
            AuthorRole::Assistant => "assistant",
            AuthorRole::Tool => "tool",
        }
    }

    pub fn parse(role: &str) -> Option<Self> {
        match role {
            "system" => Some(AuthorRole::System),
            "user" => Some(AuthorRole::User),
            "assistant" => Some(AuthorRole::Assistant),
            "tool" => Some(AuthorRole::Tool),
            _ => None,
        }
    }
}

/// A tool call requested by the model. `arguments` is a JSON document as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallContent {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageContent {
    pub role: AuthorRole,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<FunctionCallContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl ChatMessageContent {
    pub fn new(role: AuthorRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            model_id: None,
            finish_reason: None,
            metadata: HashMap::new(),
        }
    }

    pub fn assistant_tool_calls(tool_calls: Vec<FunctionCallContent>) -> Self {
        Self {
            content: None,
            tool_calls,
            ..Self::new(AuthorRole::Assistant, "")
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::new(AuthorRole::Tool, content)
        }
    }

    /// Message text, empty when the model only returned tool calls.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}

/// One chunk of a streamed chat response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamingChatMessageContent {
    pub role: Option<AuthorRole>,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<FunctionCallContent>,
    pub model_id: Option<String>,
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatHistory {
    messages: Vec<ChatMessageContent>,
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system_message(content: impl Into<String>) -> Self {
        let mut history = Self::new();
        history.add_system_message(content);
        history
    }

    pub fn add_message(&mut self, message: ChatMessageContent) {
        self.messages.push(message);
    }

    pub fn add_system_message(&mut self, content: impl Into<String>) {
        self.add_message(ChatMessageContent::new(AuthorRole::System, content));
    }

    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.add_message(ChatMessageContent::new(AuthorRole::User, content));
    }

    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.add_message(ChatMessageContent::new(AuthorRole::Assistant, content));
    }

    pub fn add_tool_message(&mut self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.add_message(ChatMessageContent::tool_result(tool_call_id, content));
    }

    pub fn messages(&self) -> &[ChatMessageContent] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChatMessageContent> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessageContent> {
        self.messages.last()
    }

    /// Keeps system messages and at most `keep` of the most recent others.
    ///
    /// The kept window starts at a user message, so an assistant reply or a
    /// tool result is never separated from the turn that produced it.
    pub fn truncate_to(&mut self, keep: usize) {
        let others: Vec<usize> = self
            .messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role != AuthorRole::System)
            .map(|(index, _)| index)
            .collect();

        let mut first = others.len().saturating_sub(keep);
        if first == 0 {
            return;
        }
        while first < others.len() && self.messages[others[first]].role != AuthorRole::User {
            first += 1;
        }
        let boundary = others.get(first).copied().unwrap_or(self.messages.len());

        let mut index = 0;
        self.messages.retain(|m| {
            let kept = m.role == AuthorRole::System || index >= boundary;
            index += 1;
            kept
        });
    }
}

impl<'a> IntoIterator for &'a ChatHistory {
    type Item = &'a ChatMessageContent;
    type IntoIter = std::slice::Iter<'a, ChatMessageContent>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    Function(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptExecutionSettings {
    pub service_id: Option<String>,
    pub model_id: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
    pub seed: Option<i64>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<FunctionDefinition>,
    pub tool_choice: Option<ToolChoice>,
    /// Vendor specific options passed through untouched.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extension_data: HashMap<String, Value>,
}

impl PromptExecutionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<FunctionDefinition>, tool_choice: ToolChoice) -> Self {
        self.tools = tools;
        self.tool_choice = Some(tool_choice);
        self
    }

    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extension_data.insert(key.into(), value.into());
        self
    }

    pub fn extension_str(&self, key: &str) -> Option<&str> {
        self.extension_data.get(key).and_then(Value::as_str)
    }

    /// Model to call: the per-request override, else the service default.
    pub fn resolve_model<'a>(&'a self, default_model: &'a str) -> &'a str {
        self.model_id.as_deref().unwrap_or(default_model)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

pub type ChatMessageStream = BoxStream<'static, Result<StreamingChatMessageContent>>;
pub type TextStream = BoxStream<'static, Result<TextContent>>;

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    fn model_id(&self) -> &str;

    fn service_name(&self) -> &str;

    async fn get_chat_message_contents(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<Vec<ChatMessageContent>>;

    async fn get_streaming_chat_message_contents(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<ChatMessageStream>;

    async fn get_chat_message_content(
        &self,
        history: &ChatHistory,
        settings: &PromptExecutionSettings,
    ) -> Result<ChatMessageContent> {
        self.get_chat_message_contents(history, settings)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ConnectorError::invalid_response(self.service_name(), "no choices returned"))
    }
}

#[async_trait]
pub trait TextGenerationService: Send + Sync {
    fn model_id(&self) -> &str;

    async fn get_text_contents(
        &self,
        prompt: &str,
        settings: &PromptExecutionSettings,
    ) -> Result<Vec<TextContent>>;

    async fn get_streaming_text_contents(
        &self,
        prompt: &str,
        settings: &PromptExecutionSettings,
    ) -> Result<TextStream>;
}
