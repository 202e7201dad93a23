use std::path::Path;
use std::time::Duration;

use kernel_connectors_common::settings::{deserialize_secret, load_settings};
use kernel_connectors_common::{ConnectorError, Result};
use qdrant_client::Qdrant;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::info;

use crate::STORE_NAME;

pub const DEFAULT_GRPC_PORT: u16 = 6334;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Qdrant connection settings, read from `QDRANT_*` variables.
#[derive(Debug, Clone, Deserialize)]
pub struct QdrantSettings {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "deserialize_secret")]
    pub api_key: Option<SecretString>,
    #[serde(default)]
    pub host: Option<String>,
    /// REST port; the client itself talks gRPC.
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_grpc_port() -> u16 {
    DEFAULT_GRPC_PORT
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            host: None,
            port: None,
            grpc_port: DEFAULT_GRPC_PORT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl QdrantSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(api_key.into()));
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn from_env() -> Result<Self> {
        load_settings("QDRANT", None)
    }

    pub fn from_env_file(path: &Path) -> Result<Self> {
        load_settings("QDRANT", Some(path))
    }

    pub fn resolved_url(&self) -> String {
        match (&self.url, &self.host) {
            (Some(url), _) => url.clone(),
            (None, Some(host)) => format!("http://{}:{}", host, self.grpc_port),
            (None, None) => format!("http://localhost:{}", DEFAULT_GRPC_PORT),
        }
    }

    pub fn build_client(&self) -> Result<Qdrant> {
        let url = self.resolved_url();
        let mut builder = Qdrant::from_url(&url).timeout(Duration::from_secs(self.timeout_secs));

        if let Some(api_key) = &self.api_key {
            builder = builder.api_key(api_key.expose_secret().to_string());
        }

        let client = builder.build().map_err(|e| ConnectorError::VectorStoreInitialization {
            store: STORE_NAME.to_string(),
            message: format!("failed to build client for {}: {}", url, e),
        })?;

        info!("Qdrant client configured for {}", url);
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_resolution() {
        assert_eq!(QdrantSettings::default().resolved_url(), "http://localhost:6334");

        let settings = QdrantSettings {
            host: Some("qdrant.internal".into()),
            grpc_port: 7000,
            ..QdrantSettings::default()
        };
        assert_eq!(settings.resolved_url(), "http://qdrant.internal:7000");

        let settings = QdrantSettings {
            host: Some("ignored".into()),
            ..QdrantSettings::new("https://cloud.qdrant.io:6334")
        };
        assert_eq!(settings.resolved_url(), "https://cloud.qdrant.io:6334");
    }

    #[test]
    fn test_from_env() {
        std::env::set_var("QDRANT_HOST", "vector-db");
        std::env::set_var("QDRANT_GRPC_PORT", "6400");
        std::env::set_var("QDRANT_TIMEOUT_SECS", "5");

        let settings = QdrantSettings::from_env().unwrap();
        assert_eq!(settings.host.as_deref(), Some("vector-db"));
        assert_eq!(settings.grpc_port, 6400);
        assert_eq!(settings.timeout_secs, 5);
        assert!(settings.api_key.is_none());
    }
}
