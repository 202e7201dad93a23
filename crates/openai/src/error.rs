use async_openai::error::{ApiError, OpenAIError};
use kernel_connectors_common::ConnectorError;
use tracing::error;

use crate::SERVICE_NAME;

/// Translates an SDK error into the connector error for `operation`.
pub(crate) fn map_openai_error(operation: &str, err: OpenAIError) -> ConnectorError {
    let mapped = match err {
        OpenAIError::ApiError(api) => {
            let message = match &api.r#type {
                Some(kind) => format!("{} ({})", api.message, kind),
                None => api.message.clone(),
            };
            ConnectorError::service(SERVICE_NAME, operation, Some(api_error_status(&api)), message)
        }
        OpenAIError::Reqwest(e) => ConnectorError::service(
            SERVICE_NAME,
            operation,
            e.status().map(|status| status.as_u16()),
            e.to_string(),
        ),
        OpenAIError::JSONDeserialize(e) => ConnectorError::invalid_response(SERVICE_NAME, e.to_string()),
        OpenAIError::StreamError(message) => ConnectorError::service(SERVICE_NAME, operation, None, message),
        OpenAIError::InvalidArgument(message) => ConnectorError::InvalidRequest(message),
        other => ConnectorError::service(SERVICE_NAME, operation, None, other.to_string()),
    };
    error!("{}", mapped);
    mapped
}

/// HTTP status implied by an error body. The SDK drops the real status, and a
/// missing status would read as a transport failure.
fn api_error_status(api: &ApiError) -> u16 {
    let code = api.code.as_deref().unwrap_or_default();
    let kind = api.r#type.as_deref().unwrap_or_default();
    match (code, kind) {
        ("invalid_api_key", _) | (_, "authentication_error") => 401,
        (_, "permission_error") => 403,
        ("model_not_found", _) | (_, "not_found_error") => 404,
        ("rate_limit_exceeded" | "insufficient_quota", _) | (_, "rate_limit_error" | "tokens") => 429,
        ("server_error", _) | (_, "server_error" | "api_error") => 500,
        (_, "overloaded_error") => 503,
        _ => 400,
    }
}
