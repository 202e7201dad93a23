use std::path::Path;
use std::time::Duration;

use kernel_connectors_common::{load_settings, ConnectorError, Result};
use serde::Deserialize;

use crate::client::OllamaClient;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_RETRIES: u32 = 2;

/// Ollama settings, read from `OLLAMA_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaSettings {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub chat_model_id: Option<String>,
    #[serde(default)]
    pub text_model_id: Option<String>,
    #[serde(default)]
    pub embedding_model_id: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            chat_model_id: None,
            text_model_id: None,
            embedding_model_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl OllamaSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_chat_model(mut self, model_id: impl Into<String>) -> Self {
        self.chat_model_id = Some(model_id.into());
        self
    }

    pub fn with_text_model(mut self, model_id: impl Into<String>) -> Self {
        self.text_model_id = Some(model_id.into());
        self
    }

    pub fn with_embedding_model(mut self, model_id: impl Into<String>) -> Self {
        self.embedding_model_id = Some(model_id.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn from_env() -> Result<Self> {
        load_settings("OLLAMA", None)
    }

    pub fn from_env_file(path: &Path) -> Result<Self> {
        load_settings("OLLAMA", Some(path))
    }

    pub fn build_client(&self) -> Result<OllamaClient> {
        OllamaClient::new(
            &self.endpoint,
            Duration::from_secs(self.timeout_secs),
            self.max_retries,
        )
    }

    /// The configured model for `kind`, or a configuration error naming the variable to set.
    pub(crate) fn require_model(model_id: &Option<String>, kind: &str) -> Result<String> {
        model_id.clone().ok_or_else(|| {
            ConnectorError::Configuration(format!(
                "Ollama {} model is not set (OLLAMA_{}_MODEL_ID)",
                kind,
                kind.to_uppercase()
            ))
        })
    }
}
