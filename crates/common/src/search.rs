use serde::{Deserialize, Serialize};

use crate::error::{ConnectorError, Result};
use crate::filter::FilterExpr;

pub const DEFAULT_TOP: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Vector,
    KeywordHybrid,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchOptions {
    pub top: usize,
    pub skip: usize,
    pub filter: Option<FilterExpr>,
    /// Vector field to search; the first vector field when unset.
    pub vector_property_name: Option<String>,
    /// Data field holding the text matched by keyword search.
    pub additional_property_name: Option<String>,
    pub include_vectors: bool,
    pub include_total_count: bool,
}

impl Default for VectorSearchOptions {
    fn default() -> Self {
        Self {
            top: DEFAULT_TOP,
            skip: 0,
            filter: None,
            vector_property_name: None,
            additional_property_name: None,
            include_vectors: false,
            include_total_count: false,
        }
    }
}

impl VectorSearchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_filter(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn with_vector_property(mut self, name: impl Into<String>) -> Self {
        self.vector_property_name = Some(name.into());
        self
    }

    pub fn with_additional_property(mut self, name: impl Into<String>) -> Self {
        self.additional_property_name = Some(name.into());
        self
    }

    pub fn include_vectors(mut self, include: bool) -> Self {
        self.include_vectors = include;
        self
    }

    pub fn include_total_count(mut self, include: bool) -> Self {
        self.include_total_count = include;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.top == 0 {
            return Err(ConnectorError::InvalidRequest(
                "top must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetRecordOptions {
    pub include_vectors: bool,
}

impl GetRecordOptions {
    pub fn with_vectors() -> Self {
        Self { include_vectors: true }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchResult<T> {
    pub record: T,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VectorSearchResults<T> {
    pub results: Vec<VectorSearchResult<T>>,
    pub total_count: Option<usize>,
}

impl<T> VectorSearchResults<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn records(self) -> impl Iterator<Item = T> {
        self.results.into_iter().map(|r| r.record)
    }
}
