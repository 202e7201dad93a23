use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use bytes::BytesMut;
use futures::stream::{self, BoxStream, StreamExt};
use kernel_connectors_common::{ConnectorError, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::models::{
    ChatRequest, ChatResponse, EmbedRequest, EmbedResponse, ErrorResponse, GenerateRequest,
    GenerateResponse, ModelInfo, TagsResponse,
};
use crate::SERVICE_NAME;

/// Thin HTTP client for the Ollama REST API.
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: Client,
    endpoint: String,
    max_retries: u32,
}

impl OllamaClient {
    pub fn new(endpoint: &str, timeout: Duration, max_retries: u32) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConnectorError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    pub async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let response = self.post("chat", "api/chat", request).await?;
        read_json("chat", response).await
    }

    /// One response per NDJSON line; the last one has `done: true`.
    pub async fn chat_stream(&self, request: &ChatRequest) -> Result<BoxStream<'static, Result<ChatResponse>>> {
        let response = self.post("chat_stream", "api/chat", request).await?;
        Ok(ndjson_stream("chat_stream", response))
    }

    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let response = self.post("generate", "api/generate", request).await?;
        read_json("generate", response).await
    }

    pub async fn generate_stream(
        &self,
        request: &GenerateRequest,
    ) -> Result<BoxStream<'static, Result<GenerateResponse>>> {
        let response = self.post("generate_stream", "api/generate", request).await?;
        Ok(ndjson_stream("generate_stream", response))
    }

    pub async fn embed(&self, request: &EmbedRequest) -> Result<EmbedResponse> {
        let response = self.post("embed", "api/embed", request).await?;
        read_json("embed", response).await
    }

    /// Models available locally (`/api/tags`).
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = self.url("api/tags");
        let response = self
            .with_retry("list_models", || send_once("list_models", self.http.get(&url)))
            .await?;
        let tags: TagsResponse = read_json("list_models", response).await?;
        Ok(tags.models)
    }

    async fn post<B>(&self, operation: &str, path: &str, body: &B) -> Result<Response>
    where
        B: Serialize + Sync + ?Sized,
    {
        let url = self.url(path);
        debug!("POST {} ({})", url, operation);
        self.with_retry(operation, || send_once(operation, self.http.post(&url).json(body)))
            .await
    }

    /// Retries transient failures with exponential backoff, at most `max_retries` times.
    async fn with_retry<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(250),
            max_elapsed_time: Some(Duration::from_secs(60)),
            ..Default::default()
        };
        let mut retries = 0;

        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    let Some(delay) = backoff.next_backoff() else {
                        error!(error = %e, "Backoff exhausted");
                        return Err(e);
                    };
                    retries += 1;
                    warn!(
                        error = %e,
                        attempt = retries,
                        retry_in_ms = delay.as_millis() as u64,
                        "Ollama {} failed, retrying",
                        operation
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    error!(error = %e, "Ollama {} failed", operation);
                    return Err(e);
                }
            }
        }
    }
}

async fn send_once(operation: &str, request: RequestBuilder) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ConnectorError::service(SERVICE_NAME, operation, None, e.to_string()))?;

    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(ConnectorError::service(
        SERVICE_NAME,
        operation,
        Some(status.as_u16()),
        error_message(&body, status.canonical_reason()),
    ))
}

/// The `error` field of an Ollama error body, else the raw body.
fn error_message(body: &str, fallback: Option<&str>) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorResponse>(body) {
        return parsed.error;
    }
    if body.trim().is_empty() {
        fallback.unwrap_or("request failed").to_string()
    } else {
        body.trim().to_string()
    }
}

async fn read_json<T: DeserializeOwned>(operation: &str, response: Response) -> Result<T> {
    let body = response
        .bytes()
        .await
        .map_err(|e| ConnectorError::service(SERVICE_NAME, operation, None, e.to_string()))?;
    serde_json::from_slice(&body).map_err(|e| {
        ConnectorError::invalid_response(SERVICE_NAME, format!("{} returned malformed JSON: {}", operation, e))
    })
}

fn parse_line<T: DeserializeOwned>(operation: &'static str, line: &[u8]) -> Result<T> {
    if let Ok(failure) = serde_json::from_slice::<ErrorResponse>(line) {
        return Err(ConnectorError::service(SERVICE_NAME, operation, None, failure.error));
    }
    serde_json::from_slice(line).map_err(|e| {
        ConnectorError::invalid_response(SERVICE_NAME, format!("{} sent a malformed line: {}", operation, e))
    })
}

/// Splits a newline-delimited JSON body into parsed items.
fn ndjson_stream<T>(operation: &'static str, response: Response) -> BoxStream<'static, Result<T>>
where
    T: DeserializeOwned + Send + 'static,
{
    let chunks = response
        .bytes_stream()
        .map(move |chunk| chunk.map_err(|e| ConnectorError::service(SERVICE_NAME, operation, None, e.to_string())))
        .boxed();

    stream::unfold(
        (chunks, BytesMut::new(), false),
        move |(mut chunks, mut buffer, mut finished)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line = buffer.split_to(pos + 1);
                    let line = line[..pos].trim_ascii();
                    if line.is_empty() {
                        continue;
                    }
                    let item = parse_line(operation, line);
                    return Some((item, (chunks, buffer, finished)));
                }

                if finished {
                    let rest = buffer.split();
                    let rest = rest.trim_ascii();
                    if rest.is_empty() {
                        return None;
                    }
                    let item = parse_line(operation, rest);
                    return Some((item, (chunks, buffer, finished)));
                }

                match chunks.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        buffer.clear();
                        return Some((Err(e), (chunks, buffer, true)));
                    }
                    None => finished = true,
                }
            }
        },
    )
    .boxed()
}
