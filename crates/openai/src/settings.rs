use std::path::Path;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::Client;
use backoff::ExponentialBackoff;
use kernel_connectors_common::settings::deserialize_secret;
use kernel_connectors_common::{load_settings, ConnectorError, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::info;

/// OpenAI settings, read from `OPENAI_*` variables.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAISettings {
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub org_id: Option<String>,
    /// Overrides `https://api.openai.com/v1`, e.g. for a proxy.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub chat_model_id: Option<String>,
    #[serde(default)]
    pub embedding_model_id: Option<String>,
    #[serde(default)]
    pub embedding_dimensions: Option<u32>,
}

impl OpenAISettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(SecretString::from(api_key.into())),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_chat_model(mut self, model_id: impl Into<String>) -> Self {
        self.chat_model_id = Some(model_id.into());
        self
    }

    pub fn with_embedding_model(mut self, model_id: impl Into<String>) -> Self {
        self.embedding_model_id = Some(model_id.into());
        self
    }

    pub fn with_embedding_dimensions(mut self, dimensions: u32) -> Self {
        self.embedding_dimensions = Some(dimensions);
        self
    }

    pub fn from_env() -> Result<Self> {
        load_settings("OPENAI", None)
    }

    pub fn from_env_file(path: &Path) -> Result<Self> {
        load_settings("OPENAI", Some(path))
    }

    pub fn build_client(&self) -> Result<Client<OpenAIConfig>> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| ConnectorError::Configuration("OPENAI_API_KEY is not set".to_string()))?;

        let mut config = OpenAIConfig::new().with_api_key(api_key.expose_secret());
        if let Some(org_id) = &self.org_id {
            config = config.with_org_id(org_id);
        }
        if let Some(base_url) = &self.base_url {
            config = config.with_api_base(base_url.trim_end_matches('/'));
        }

        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };

        info!(
            "OpenAI client configured for {}",
            self.base_url.as_deref().unwrap_or("api.openai.com")
        );
        Ok(Client::with_config(config).with_backoff(backoff))
    }

    pub(crate) fn require_model(model_id: &Option<String>, kind: &str) -> Result<String> {
        model_id.clone().ok_or_else(|| {
            ConnectorError::Configuration(format!(
                "OpenAI {} model is not set (OPENAI_{}_MODEL_ID)",
                kind,
                kind.to_uppercase()
            ))
        })
    }
}
