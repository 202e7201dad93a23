//! Record definitions: which properties of a record are the key, data and vectors,
//! and how each one is named in the vendor store.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Key,
    Data,
    Vector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexKind {
    Hnsw,
    Flat,
    IvfFlat,
    DiskAnn,
    QuantizedFlat,
    Dynamic,
    #[default]
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFunction {
    CosineSimilarity,
    CosineDistance,
    DotProduct,
    EuclideanDistance,
    EuclideanSquaredDistance,
    Manhattan,
    Hamming,
    #[default]
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorStoreField {
    pub kind: FieldKind,
    pub name: String,
    pub storage_name: Option<String>,
    pub property_type: Option<String>,
    pub is_indexed: bool,
    pub is_full_text_indexed: bool,
    pub dimensions: Option<usize>,
    pub index_kind: Option<IndexKind>,
    pub distance_function: Option<DistanceFunction>,
}

impl VectorStoreField {
    fn with_kind(kind: FieldKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            storage_name: None,
            property_type: None,
            is_indexed: false,
            is_full_text_indexed: false,
            dimensions: None,
            index_kind: None,
            distance_function: None,
        }
    }

    pub fn key(name: impl Into<String>) -> Self {
        Self::with_kind(FieldKind::Key, name)
    }

    pub fn data(name: impl Into<String>) -> Self {
        Self::with_kind(FieldKind::Data, name)
    }

    pub fn vector(name: impl Into<String>, dimensions: usize) -> Self {
        let mut field = Self::with_kind(FieldKind::Vector, name);
        field.dimensions = Some(dimensions);
        field.index_kind = Some(IndexKind::Default);
        field.distance_function = Some(DistanceFunction::Default);
        field
    }

    pub fn with_storage_name(mut self, storage_name: impl Into<String>) -> Self {
        self.storage_name = Some(storage_name.into());
        self
    }

    pub fn with_type(mut self, property_type: impl Into<String>) -> Self {
        self.property_type = Some(property_type.into());
        self
    }

    pub fn indexed(mut self) -> Self {
        self.is_indexed = true;
        self
    }

    pub fn full_text_indexed(mut self) -> Self {
        self.is_full_text_indexed = true;
        self
    }

    pub fn with_index_kind(mut self, index_kind: IndexKind) -> Self {
        self.index_kind = Some(index_kind);
        self
    }

    pub fn with_distance_function(mut self, distance_function: DistanceFunction) -> Self {
        self.distance_function = Some(distance_function);
        self
    }

    /// Name of the property inside the vendor store.
    pub fn storage_name(&self) -> &str {
        self.storage_name.as_deref().unwrap_or(&self.name)
    }

    pub fn is_vector(&self) -> bool {
        self.kind == FieldKind::Vector
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDefinition {
    fields: Vec<VectorStoreField>,
    key_index: usize,
}

impl RecordDefinition {
    pub fn new(fields: Vec<VectorStoreField>) -> Result<Self> {
        if fields.is_empty() {
            return Err(model_error("a record definition needs at least one field"));
        }

        let mut names = HashSet::new();
        let mut storage_names = HashSet::new();
        let mut key_index = None;

        for (index, field) in fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(model_error("field names must not be empty"));
            }
            if !names.insert(field.name.as_str()) {
                return Err(model_error(format!("duplicate field name '{}'", field.name)));
            }
            if !storage_names.insert(field.storage_name()) {
                return Err(model_error(format!(
                    "duplicate storage name '{}'",
                    field.storage_name()
                )));
            }
            match field.kind {
                FieldKind::Key => {
                    if key_index.is_some() {
                        return Err(model_error("a record definition must have exactly one key field"));
                    }
                    key_index = Some(index);
                }
                FieldKind::Vector => match field.dimensions {
                    Some(dimensions) if dimensions > 0 => {}
                    _ => {
                        return Err(model_error(format!(
                            "vector field '{}' must have dimensions greater than zero",
                            field.name
                        )))
                    }
                },
                FieldKind::Data => {}
            }
        }

        let key_index =
            key_index.ok_or_else(|| model_error("a record definition must have exactly one key field"))?;

        Ok(Self { fields, key_index })
    }

    pub fn fields(&self) -> &[VectorStoreField] {
        &self.fields
    }

    pub fn key_field(&self) -> &VectorStoreField {
        &self.fields[self.key_index]
    }

    pub fn data_fields(&self) -> impl Iterator<Item = &VectorStoreField> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Data)
    }

    pub fn vector_fields(&self) -> impl Iterator<Item = &VectorStoreField> {
        self.fields.iter().filter(|f| f.kind == FieldKind::Vector)
    }

    pub fn storage_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.storage_name()).collect()
    }

    pub fn get_storage_names(&self, include_vectors: bool, include_key: bool) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| match f.kind {
                FieldKind::Data => true,
                FieldKind::Vector => include_vectors,
                FieldKind::Key => include_key,
            })
            .map(|f| f.storage_name())
            .collect()
    }

    pub fn field_by_storage_name(&self, storage_name: &str) -> Option<&VectorStoreField> {
        self.fields.iter().find(|f| f.storage_name() == storage_name)
    }

    /// Looks up a vector field by property or storage name.
    ///
    /// With no name the first vector field is returned, or `None` when the
    /// definition has no vectors. A named lookup that hits a non-vector field
    /// or nothing at all is an error.
    pub fn try_get_vector_field(&self, name: Option<&str>) -> Result<Option<&VectorStoreField>> {
        let Some(name) = name else {
            return Ok(self.vector_fields().next());
        };

        match self
            .fields
            .iter()
            .find(|f| f.name == name || f.storage_name.as_deref() == Some(name))
        {
            Some(field) if field.is_vector() => Ok(Some(field)),
            Some(field) => Err(model_error(format!(
                "field '{}' is not a vector field, it is a {:?} field",
                name, field.kind
            ))),
            None => Err(model_error(format!("field '{}' not found", name))),
        }
    }
}

fn model_error(message: impl Into<String>) -> ConnectorError {
    ConnectorError::VectorStoreModel(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hotel_definition() -> RecordDefinition {
        RecordDefinition::new(vec![
            VectorStoreField::key("hotel_id"),
            VectorStoreField::data("hotel_name").indexed(),
            VectorStoreField::data("description")
                .with_storage_name("desc")
                .full_text_indexed(),
            VectorStoreField::vector("description_embedding", 4)
                .with_distance_function(DistanceFunction::CosineSimilarity),
        ])
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let definition = hotel_definition();
        assert_eq!(definition.key_field().name, "hotel_id");
        assert_eq!(definition.data_fields().count(), 2);
        assert_eq!(definition.vector_fields().count(), 1);
        assert_eq!(
            definition.storage_names(),
            vec!["hotel_id", "hotel_name", "desc", "description_embedding"]
        );
        assert_eq!(
            definition.get_storage_names(false, false),
            vec!["hotel_name", "desc"]
        );
        assert_eq!(
            definition.field_by_storage_name("desc").map(|f| f.name.as_str()),
            Some("description")
        );
    }

    #[test]
    fn test_vector_field_defaults() {
        let field = VectorStoreField::vector("v", 3);
        assert_eq!(field.index_kind, Some(IndexKind::Default));
        assert_eq!(field.distance_function, Some(DistanceFunction::Default));
        assert_eq!(VectorStoreField::data("d").index_kind, None);
    }

    #[test]
    fn test_try_get_vector_field() {
        let definition = hotel_definition();
        assert_eq!(
            definition.try_get_vector_field(None).unwrap().unwrap().name,
            "description_embedding"
        );
        assert!(definition
            .try_get_vector_field(Some("description_embedding"))
            .unwrap()
            .is_some());
        assert!(matches!(
            definition.try_get_vector_field(Some("hotel_name")),
            Err(ConnectorError::VectorStoreModel(_))
        ));
        assert!(definition.try_get_vector_field(Some("missing")).is_err());

        let no_vectors = RecordDefinition::new(vec![VectorStoreField::key("id")]).unwrap();
        assert!(no_vectors.try_get_vector_field(None).unwrap().is_none());
    }

    #[test]
    fn test_requires_exactly_one_key() {
        assert!(RecordDefinition::new(vec![VectorStoreField::data("a")]).is_err());
        assert!(RecordDefinition::new(vec![
            VectorStoreField::key("a"),
            VectorStoreField::key("b"),
        ])
        .is_err());
    }

    #[test]
    fn test_rejects_invalid_fields() {
        assert!(RecordDefinition::new(vec![]).is_err());
        assert!(RecordDefinition::new(vec![VectorStoreField::key("")]).is_err());
        assert!(RecordDefinition::new(vec![
            VectorStoreField::key("id"),
            VectorStoreField::vector("v", 0),
        ])
        .is_err());
        assert!(RecordDefinition::new(vec![
            VectorStoreField::key("id"),
            VectorStoreField::data("a").with_storage_name("b"),
            VectorStoreField::data("b"),
        ])
        .is_err());
    }
}
