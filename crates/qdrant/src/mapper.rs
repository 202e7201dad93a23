use std::collections::HashMap;

use kernel_connectors_common::{ConnectorError, RecordDefinition, RecordKey, Result, StorageRecord, VectorValue};
use qdrant_client::qdrant::{
    self, point_id::PointIdOptions, value::Kind, vectors_output::VectorsOptions, ListValue,
    NullValue, PointId, PointStruct, Struct, Value as QdrantValue, Vectors, VectorsOutput,
};
use qdrant_client::Payload;
use serde_json::{Map, Number, Value};
use uuid::Uuid;

pub fn key_to_point_id(key: &RecordKey) -> Result<PointId> {
    match key {
        RecordKey::Number(n) => Ok(PointId::from(*n)),
        RecordKey::String(s) => {
            let uuid = Uuid::parse_str(s).map_err(|_| {
                ConnectorError::VectorStoreModel(format!(
                    "Qdrant string keys must be UUIDs, got '{}'",
                    s
                ))
            })?;
            Ok(PointId::from(uuid.to_string()))
        }
    }
}

pub fn point_id_to_key(point_id: Option<PointId>) -> Result<RecordKey> {
    match point_id.and_then(|p| p.point_id_options) {
        Some(PointIdOptions::Num(n)) => Ok(RecordKey::Number(n)),
        Some(PointIdOptions::Uuid(s)) => Ok(RecordKey::String(s)),
        None => Err(ConnectorError::invalid_response(
            crate::STORE_NAME,
            "point without an id",
        )),
    }
}

pub fn json_to_qdrant(value: Value) -> QdrantValue {
    let kind = match value {
        Value::Null => Kind::NullValue(NullValue::NullValue as i32),
        Value::Bool(b) => Kind::BoolValue(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Kind::IntegerValue(i),
            None => Kind::DoubleValue(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => Kind::StringValue(s),
        Value::Array(items) => Kind::ListValue(ListValue {
            values: items.into_iter().map(json_to_qdrant).collect(),
        }),
        Value::Object(map) => Kind::StructValue(Struct {
            fields: map.into_iter().map(|(k, v)| (k, json_to_qdrant(v))).collect(),
        }),
    };
    QdrantValue { kind: Some(kind) }
}

pub fn qdrant_to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::Number(i.into()),
        Some(Kind::DoubleValue(f)) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(qdrant_to_json).collect()),
        Some(Kind::StructValue(s)) => Value::Object(
            s.fields
                .into_iter()
                .map(|(k, v)| (k, qdrant_to_json(v)))
                .collect(),
        ),
    }
}

pub fn map_to_payload(data: Map<String, Value>) -> Payload {
    let fields: HashMap<String, QdrantValue> = data
        .into_iter()
        .map(|(k, v)| (k, json_to_qdrant(v)))
        .collect();
    Payload::from(fields)
}

pub fn payload_to_map(payload: HashMap<String, QdrantValue>) -> Map<String, Value> {
    payload
        .into_iter()
        .map(|(k, v)| (k, qdrant_to_json(v)))
        .collect()
}

/// Builds the point for a storage record whose vectors are all embeddings.
pub fn storage_to_point(
    definition: &RecordDefinition,
    record: StorageRecord,
    named_vectors: bool,
) -> Result<PointStruct> {
    let id = key_to_point_id(&record.key)?;

    let mut embeddings = HashMap::new();
    for (name, vector) in record.vectors {
        match vector {
            VectorValue::Embedding(values) => {
                embeddings.insert(name, values);
            }
            VectorValue::Text(_) => {
                return Err(ConnectorError::VectorStoreModel(format!(
                    "vector '{}' has not been embedded",
                    name
                )))
            }
        }
    }

    let vectors: Vectors = if named_vectors {
        embeddings.into()
    } else {
        let field = definition.vector_fields().next().ok_or_else(|| {
            ConnectorError::VectorStoreModel("record definition has no vector field".to_string())
        })?;
        embeddings
            .remove(field.storage_name())
            .ok_or_else(|| {
                ConnectorError::VectorStoreModel(format!("record is missing vector '{}'", field.name))
            })?
            .into()
    };

    Ok(PointStruct::new(id, vectors, map_to_payload(record.data)))
}

/// Rebuilds a storage record from a point returned by a get or a search.
pub fn point_to_storage(
    definition: &RecordDefinition,
    id: Option<PointId>,
    payload: HashMap<String, QdrantValue>,
    vectors: Option<VectorsOutput>,
) -> Result<StorageRecord> {
    let key = point_id_to_key(id)?;
    let mut output = vectors_to_map(vectors);

    // Unnamed vectors come back without a name; attach them to the single vector field.
    if let Some(unnamed) = output.remove("") {
        if let Some(field) = definition.vector_fields().next() {
            output.insert(field.storage_name().to_string(), unnamed);
        }
    }

    Ok(StorageRecord {
        key,
        data: payload_to_map(payload),
        vectors: output
            .into_iter()
            .map(|(k, v)| (k, VectorValue::Embedding(v)))
            .collect(),
    })
}

/// Dense vectors of a point keyed by name; an unnamed vector is keyed by `""`.
#[allow(deprecated)]
pub fn vectors_to_map(vectors: Option<VectorsOutput>) -> HashMap<String, Vec<f32>> {
    match vectors.and_then(|v| v.vectors_options) {
        Some(VectorsOptions::Vector(v)) => HashMap::from([(String::new(), v.data)]),
        Some(VectorsOptions::Vectors(named)) => named
            .vectors
            .into_iter()
            .map(|(name, v)| (name, v.data))
            .collect(),
        None => HashMap::new(),
    }
}

pub fn distance_for(function: kernel_connectors_common::DistanceFunction) -> Option<qdrant::Distance> {
    use kernel_connectors_common::DistanceFunction;

    match function {
        DistanceFunction::CosineSimilarity | DistanceFunction::Default => Some(qdrant::Distance::Cosine),
        DistanceFunction::DotProduct => Some(qdrant::Distance::Dot),
        DistanceFunction::EuclideanDistance => Some(qdrant::Distance::Euclid),
        DistanceFunction::Manhattan => Some(qdrant::Distance::Manhattan),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_connectors_common::{DistanceFunction, VectorStoreField};
    use proptest::prelude::*;
    use qdrant_client::qdrant::{vectors::VectorsOptions as InputOptions, NamedVectorsOutput, VectorOutput};
    use serde_json::json;

    fn definition() -> RecordDefinition {
        RecordDefinition::new(vec![
            VectorStoreField::key("id"),
            VectorStoreField::data("title"),
            VectorStoreField::vector("embedding", 2),
        ])
        .unwrap()
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|i| json!(i)),
            (-1.0e9f64..1.0e9f64)
                .prop_filter("integral floats collapse to integers", |f| f.fract() != 0.0)
                .prop_map(|f| json!(f)),
            "[a-z0-9 ]{0,12}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::hash_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn json_survives_qdrant_value_conversion(value in arb_json()) {
            prop_assert_eq!(qdrant_to_json(json_to_qdrant(value.clone())), value);
        }
    }

    #[test]
    fn test_string_keys_must_be_uuids() {
        let id = Uuid::new_v4();
        let point_id = key_to_point_id(&RecordKey::from(id)).unwrap();
        assert_eq!(point_id.point_id_options, Some(PointIdOptions::Uuid(id.to_string())));

        assert!(matches!(
            key_to_point_id(&RecordKey::from("not-a-uuid")),
            Err(ConnectorError::VectorStoreModel(_))
        ));
        assert_eq!(
            key_to_point_id(&RecordKey::Number(9)).unwrap().point_id_options,
            Some(PointIdOptions::Num(9))
        );
    }

    #[test]
    fn test_point_id_round_trip_to_key() {
        assert_eq!(point_id_to_key(Some(PointId::from(5u64))).unwrap(), RecordKey::Number(5));
        assert!(point_id_to_key(None).is_err());
    }

    #[test]
    fn test_storage_to_point_named_and_unnamed() {
        let record = StorageRecord {
            key: RecordKey::Number(1),
            data: json!({"title": "a"}).as_object().cloned().unwrap(),
            vectors: HashMap::from([("embedding".to_string(), VectorValue::Embedding(vec![0.5, 1.0]))]),
        };

        let named = storage_to_point(&definition(), record.clone(), true).unwrap();
        assert!(matches!(
            named.vectors.and_then(|v| v.vectors_options),
            Some(InputOptions::Vectors(ref n)) if n.vectors.contains_key("embedding")
        ));
        assert_eq!(
            qdrant_to_json(named.payload.get("title").cloned().unwrap()),
            json!("a")
        );

        let unnamed = storage_to_point(&definition(), record, false).unwrap();
        assert!(matches!(
            unnamed.vectors.and_then(|v| v.vectors_options),
            Some(InputOptions::Vector(_))
        ));
    }

    #[test]
    fn test_text_vectors_are_rejected() {
        let record = StorageRecord {
            key: RecordKey::Number(1),
            data: Map::new(),
            vectors: HashMap::from([("embedding".to_string(), VectorValue::Text("x".into()))]),
        };
        assert!(storage_to_point(&definition(), record, true).is_err());
    }

    #[test]
    #[allow(deprecated)]
    fn test_point_to_storage_reads_named_vectors() {
        let vectors = VectorsOutput {
            vectors_options: Some(VectorsOptions::Vectors(NamedVectorsOutput {
                vectors: HashMap::from([(
                    "embedding".to_string(),
                    VectorOutput {
                        data: vec![0.1, 0.2],
                        ..Default::default()
                    },
                )]),
            })),
        };
        let payload = HashMap::from([("title".to_string(), json_to_qdrant(json!("t")))]);

        let storage = point_to_storage(&definition(), Some(PointId::from(3u64)), payload, Some(vectors)).unwrap();
        assert_eq!(storage.key, RecordKey::Number(3));
        assert_eq!(storage.data.get("title"), Some(&json!("t")));
        assert_eq!(
            storage.vectors.get("embedding"),
            Some(&VectorValue::Embedding(vec![0.1, 0.2]))
        );
    }

    #[test]
    fn test_distance_mapping() {
        assert_eq!(distance_for(DistanceFunction::Default), Some(qdrant::Distance::Cosine));
        assert_eq!(distance_for(DistanceFunction::DotProduct), Some(qdrant::Distance::Dot));
        assert_eq!(distance_for(DistanceFunction::EuclideanDistance), Some(qdrant::Distance::Euclid));
        assert_eq!(distance_for(DistanceFunction::Hamming), None);
        assert_eq!(distance_for(DistanceFunction::CosineDistance), None);
    }
}
