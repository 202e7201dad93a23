use std::path::Path;

use config::{Config, Environment};
use secrecy::SecretString;
use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use tracing::debug;

use crate::error::{ConnectorError, Result};

/// Loads connector settings from `<PREFIX>_*` environment variables.
///
/// `env_file` is read first when given; otherwise a `.env` in the working
/// directory is picked up if present. Variables already set win over the file.
pub fn load_settings<T: DeserializeOwned>(prefix: &str, env_file: Option<&Path>) -> Result<T> {
    match env_file {
        Some(path) => {
            dotenv::from_path(path).map_err(|e| {
                ConnectorError::Configuration(format!("failed to read {}: {}", path.display(), e))
            })?;
        }
        None => {
            dotenv::dotenv().ok();
        }
    }

    debug!("Loading settings with prefix {}", prefix);

    Config::builder()
        .add_source(Environment::with_prefix(prefix).try_parsing(true))
        .build()
        .and_then(|config| config.try_deserialize::<T>())
        .map_err(|e| ConnectorError::Configuration(format!("invalid {} settings: {}", prefix, e)))
}

/// Serde helper for optional secrets read from plain strings.
pub fn deserialize_secret<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()).map(SecretString::from))
}
