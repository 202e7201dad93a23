//! Conversion between user records and the store-neutral [`StorageRecord`].
//!
//! Records go through `serde_json`; the [`RecordDefinition`] decides which
//! properties are kept and what they are called in the store.

use std::collections::HashMap;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::definition::{RecordDefinition, VectorStoreField};
use crate::error::{ConnectorError, Result};
use crate::record::RecordKey;

#[derive(Debug, Clone, PartialEq)]
pub enum VectorValue {
    Embedding(Vec<f32>),
    /// Text still to be embedded before it reaches the store.
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StorageRecord {
    pub key: RecordKey,
    pub data: Map<String, Value>,
    pub vectors: HashMap<String, VectorValue>,
}

pub fn serialize_record<T: Serialize>(definition: &RecordDefinition, record: &T) -> Result<StorageRecord> {
    let value = serde_json::to_value(record)?;
    let Value::Object(mut properties) = value else {
        return Err(ConnectorError::VectorStoreModel(
            "records must serialize to a JSON object".to_string(),
        ));
    };

    let key_field = definition.key_field();
    let key = match properties.remove(&key_field.name) {
        Some(value) => RecordKey::from_json(&value)?,
        None => {
            return Err(ConnectorError::VectorStoreModel(format!(
                "record is missing key property '{}'",
                key_field.name
            )))
        }
    };

    let mut data = Map::new();
    for field in definition.data_fields() {
        if let Some(value) = properties.remove(&field.name) {
            data.insert(field.storage_name().to_string(), value);
        }
    }

    let mut vectors = HashMap::new();
    for field in definition.vector_fields() {
        match properties.remove(&field.name) {
            None | Some(Value::Null) => {}
            Some(value) => {
                vectors.insert(field.storage_name().to_string(), vector_from_json(field, value)?);
            }
        }
    }

    Ok(StorageRecord { key, data, vectors })
}

pub fn deserialize_record<T: DeserializeOwned>(
    definition: &RecordDefinition,
    record: StorageRecord,
    include_vectors: bool,
) -> Result<T> {
    let StorageRecord {
        key,
        mut data,
        mut vectors,
    } = record;

    let mut properties = Map::new();
    properties.insert(definition.key_field().name.clone(), key.to_json());

    for field in definition.data_fields() {
        if let Some(value) = data.remove(field.storage_name()) {
            properties.insert(field.name.clone(), value);
        }
    }

    if include_vectors {
        for field in definition.vector_fields() {
            if let Some(vector) = vectors.remove(field.storage_name()) {
                let value = match vector {
                    VectorValue::Embedding(values) => Value::from(values),
                    VectorValue::Text(text) => Value::String(text),
                };
                properties.insert(field.name.clone(), value);
            }
        }
    }

    Ok(serde_json::from_value(Value::Object(properties))?)
}

/// Checks an embedding against the dimensions configured on its field.
pub fn validate_dimensions(field: &VectorStoreField, vector: &[f32]) -> Result<()> {
    match field.dimensions {
        Some(expected) if expected != vector.len() => Err(ConnectorError::VectorStoreModel(format!(
            "vector '{}' has {} dimensions, expected {}",
            field.name,
            vector.len(),
            expected
        ))),
        _ => Ok(()),
    }
}

fn vector_from_json(field: &VectorStoreField, value: Value) -> Result<VectorValue> {
    match value {
        Value::String(text) => Ok(VectorValue::Text(text)),
        Value::Array(items) => {
            let vector = items
                .iter()
                .map(|item| {
                    item.as_f64().map(|n| n as f32).ok_or_else(|| {
                        ConnectorError::VectorStoreModel(format!(
                            "vector '{}' must contain only numbers",
                            field.name
                        ))
                    })
                })
                .collect::<Result<Vec<f32>>>()?;
            validate_dimensions(field, &vector)?;
            Ok(VectorValue::Embedding(vector))
        }
        other => Err(ConnectorError::VectorStoreModel(format!(
            "vector '{}' must be an array of numbers or a string, got {}",
            field.name, other
        ))),
    }
}
