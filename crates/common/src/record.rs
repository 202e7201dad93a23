use std::fmt;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::definition::RecordDefinition;
use crate::error::{ConnectorError, Result};

/// Key of a vector record. Stores accept unsigned integers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Number(u64),
    String(String),
}

impl RecordKey {
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(s) => Ok(RecordKey::String(s.clone())),
            Value::Number(n) => n.as_u64().map(RecordKey::Number).ok_or_else(|| {
                ConnectorError::VectorStoreModel(format!(
                    "numeric keys must be unsigned integers, got {}",
                    n
                ))
            }),
            Value::Null => Err(ConnectorError::VectorStoreModel(
                "record key must not be null".to_string(),
            )),
            other => Err(ConnectorError::VectorStoreModel(format!(
                "unsupported key type: {}",
                other
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RecordKey::Number(n) => Value::from(*n),
            RecordKey::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Number(n) => write!(f, "{}", n),
            RecordKey::String(s) => f.write_str(s),
        }
    }
}

impl From<u64> for RecordKey {
    fn from(value: u64) -> Self {
        RecordKey::Number(value)
    }
}

impl From<String> for RecordKey {
    fn from(value: String) -> Self {
        RecordKey::String(value)
    }
}

impl From<&str> for RecordKey {
    fn from(value: &str) -> Self {
        RecordKey::String(value.to_string())
    }
}

impl From<Uuid> for RecordKey {
    fn from(value: Uuid) -> Self {
        RecordKey::String(value.to_string())
    }
}

/// A type that can be stored in a vector store collection.
///
/// Types describe their layout through [`RecordDefinition`]; returning `None`
/// means the collection has to be given a definition explicitly.
pub trait VectorStoreRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn record_definition() -> Option<RecordDefinition>;
}

/// Schemaless record backed by a JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DynamicRecord(pub Map<String, Value>);

impl DynamicRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(name.into(), value.into())
    }
}

impl VectorStoreRecord for DynamicRecord {
    fn record_definition() -> Option<RecordDefinition> {
        None
    }
}
