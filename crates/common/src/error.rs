use std::future::Future;

use thiserror::Error;
use tracing::error;

/// Boxed vendor error, the common currency at the SDK/HTTP boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("{store} failed to {operation}{}: {source}", collection_suffix(.collection))]
    VectorStoreOperation {
        store: String,
        collection: Option<String>,
        operation: String,
        #[source]
        source: BoxError,
    },

    #[error("Record model error: {0}")]
    VectorStoreModel(String),

    #[error("Failed to initialize {store}: {message}")]
    VectorStoreInitialization { store: String, message: String },

    #[error("Vector search failed: {0}")]
    VectorSearchExecution(String),

    #[error("{service} {operation} failed{}: {message}", status_suffix(.status))]
    ServiceResponse {
        service: String,
        operation: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response from {service}: {message}")]
    InvalidResponse { service: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Service not found: {0}")]
    ServiceNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

fn collection_suffix(collection: &Option<String>) -> String {
    match collection {
        Some(name) => format!(" on collection '{}'", name),
        None => String::new(),
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl ConnectorError {
    pub fn service(
        service: impl Into<String>,
        operation: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        ConnectorError::ServiceResponse {
            service: service.into(),
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }

    pub fn invalid_response(service: impl Into<String>, message: impl Into<String>) -> Self {
        ConnectorError::InvalidResponse {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Service errors without a status are transport failures (connect, timeout).
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::ServiceResponse { status: None, .. } => true,
            ConnectorError::ServiceResponse {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Awaits a vendor call and translates its error into
/// [`ConnectorError::VectorStoreOperation`] tagged with store, collection and operation.
pub async fn run_store_operation<T, E, F>(
    store: &str,
    collection: Option<&str>,
    operation: &str,
    call: F,
) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    E: Into<BoxError>,
{
    call.await.map_err(|e| {
        let err = store_error(store, collection, operation, e);
        error!("{}", err);
        err
    })
}

pub fn store_error<E: Into<BoxError>>(
    store: &str,
    collection: Option<&str>,
    operation: &str,
    source: E,
) -> ConnectorError {
    ConnectorError::VectorStoreOperation {
        store: store.to_string(),
        collection: collection.map(str::to_string),
        operation: operation.to_string(),
        source: source.into(),
    }
}
