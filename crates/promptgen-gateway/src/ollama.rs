//! Ollama client
//!
//! Talks to `/api/generate` (blocking or NDJSON streaming), `/api/tags` and
//! `/api/version`. Route handlers only see the [`LlmBackend`] trait so tests
//! can swap in an in-process backend.

use async_trait::async_trait;
use axum::http::StatusCode;
use futures::stream::BoxStream;
use futures::StreamExt;
use promptgen_core::{Message, Role};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Default generate endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/generate";

/// Default model name
pub const DEFAULT_OLLAMA_MODEL: &str = "qwen3:latest";

/// Generation timeout; applied per chunk when streaming
pub const REQUEST_TIMEOUT_SECS: u64 = 120;

const MODELS_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Ollama failure modes, each with its own HTTP status
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OllamaError {
    #[error("Cannot connect to Ollama at {url}. Start it with `ollama serve` and check OLLAMA_URL.")]
    Connection { url: String },

    #[error("Request timed out after {secs} seconds. Try a smaller model or check `ollama ps`.")]
    Timeout { secs: u64 },

    #[error("Model '{0}' is not installed. Install it with `ollama pull {0}`.")]
    ModelNotFound(String),

    #[error("Ollama API error: {0}")]
    Api(String),
}

impl OllamaError {
    pub fn status(&self) -> StatusCode {
        match self {
            OllamaError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
            OllamaError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            OllamaError::ModelNotFound(_) => StatusCode::NOT_FOUND,
            OllamaError::Api(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// `type` field of JSON error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            OllamaError::Connection { .. } => "connection_error",
            OllamaError::Timeout { .. } => "timeout_error",
            OllamaError::ModelNotFound(_) => "model_not_found",
            OllamaError::Api(_) => "api_error",
        }
    }

    /// `error` field of JSON error bodies
    pub fn title(&self) -> &'static str {
        match self {
            OllamaError::Connection { .. } => "Connection Error",
            OllamaError::Timeout { .. } => "Timeout Error",
            OllamaError::ModelNotFound(_) => "Model Not Found",
            OllamaError::Api(_) => "API Error",
        }
    }

    /// `type` field of SSE error events
    pub fn event_type(&self) -> &'static str {
        match self {
            OllamaError::Connection { .. } => "OllamaConnectionError",
            OllamaError::Timeout { .. } => "OllamaTimeoutError",
            OllamaError::ModelNotFound(_) => "OllamaModelNotFoundError",
            OllamaError::Api(_) => "OllamaAPIError",
        }
    }
}

/// Stream of generated tokens
pub type TokenStream = BoxStream<'static, Result<String, OllamaError>>;

/// A text generation backend
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a complete reply for `messages`
    async fn generate(&self, messages: &[Message], model: &str) -> Result<String, OllamaError>;

    /// Generate a reply token by token
    async fn stream(&self, messages: &[Message], model: &str) -> Result<TokenStream, OllamaError>;

    /// Names of installed models
    async fn list_models(&self) -> Result<Vec<String>, OllamaError>;
}

/// Flatten a transcript into the single prompt `/api/generate` expects
pub fn build_prompt(messages: &[Message]) -> String {
    let mut system = "";
    let mut conversation = String::new();

    for message in messages {
        match message.role {
            Role::System => system = &message.content,
            Role::User => {
                conversation.push_str("User: ");
                conversation.push_str(&message.content);
                conversation.push('\n');
            }
            Role::Assistant => {
                conversation.push_str("Assistant: ");
                conversation.push_str(&message.content);
                conversation.push('\n');
            }
        }
    }

    if system.is_empty() {
        format!("{}Assistant:", conversation)
    } else {
        format!("{}\n\n{}Assistant:", system, conversation)
    }
}

/// Server root: strips a trailing `/api/generate` or `/api`
pub fn base_url(url: &str) -> String {
    let stripped = url.trim().trim_end_matches('/');
    stripped
        .strip_suffix("/api/generate")
        .or_else(|| stripped.strip_suffix("/api"))
        .unwrap_or(stripped)
        .to_string()
}

/// Normalise a host, base URL or full URL to the generate endpoint
pub fn generate_url(base: &str) -> String {
    let trimmed = base.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let with_scheme = if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    format!("{}/api/generate", base_url(&with_scheme))
}

/// Probe `/api/version` and confirm the peer really is Ollama
pub async fn check_connection(base: &str) -> bool {
    if base.is_empty() {
        return false;
    }

    let url = format!("{}/api/version", base.trim_end_matches('/'));
    let client = match reqwest::Client::builder().timeout(PROBE_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!("Cannot build probe client: {}", e);
            return false;
        }
    };

    let response = match client.get(&url).send().await {
        Ok(response) if response.status().is_success() => response,
        Ok(response) => {
            tracing::debug!("Ollama probe at {} returned {}", url, response.status());
            return false;
        }
        Err(e) => {
            tracing::debug!("Ollama connection test failed for {}: {}", base, e);
            return false;
        }
    };

    match response.json::<serde_json::Value>().await {
        Ok(body) if body.get("version").is_some() => true,
        _ => {
            tracing::debug!("Response from {} doesn't look like the Ollama API", base);
            false
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Deserialize)]
struct ModelTag {
    name: String,
}

/// One decoded NDJSON line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkEvent {
    Token(String),
    Done,
    Failed(OllamaError),
}

/// Incremental NDJSON decoder for streamed generate responses.
///
/// Lines may be split across network chunks; malformed lines are skipped.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<ChunkEvent> {
        self.buf.extend_from_slice(bytes);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            decode_line(&line, &mut events);
        }
        events
    }

    /// Flush a final line that had no trailing newline
    pub fn finish(&mut self) -> Vec<ChunkEvent> {
        let line = std::mem::take(&mut self.buf);
        let mut events = Vec::new();
        decode_line(&line, &mut events);
        events
    }
}

fn decode_line(line: &[u8], events: &mut Vec<ChunkEvent>) {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return;
    }

    match serde_json::from_str::<GenerateChunk>(text) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                tracing::error!("Ollama API returned error: {}", error);
                events.push(ChunkEvent::Failed(OllamaError::Api(error)));
                return;
            }
            if let Some(token) = chunk.response.filter(|t| !t.is_empty()) {
                events.push(ChunkEvent::Token(token));
            }
            if chunk.done {
                events.push(ChunkEvent::Done);
            }
        }
        Err(_) => tracing::warn!("Failed to parse streaming chunk: {}", text),
    }
}

fn transport_error(e: reqwest::Error, url: &str) -> OllamaError {
    if e.is_timeout() {
        OllamaError::Timeout {
            secs: REQUEST_TIMEOUT_SECS,
        }
    } else if e.is_connect() {
        OllamaError::Connection {
            url: url.to_string(),
        }
    } else {
        OllamaError::Api(format!("Network error communicating with Ollama: {}", e))
    }
}

/// [`LlmBackend`] over the Ollama HTTP API
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http: reqwest::Client,
    generate_url: String,
    base_url: String,
}

impl OllamaClient {
    /// Accepts a full generate URL, a base URL or a bare `host:port`
    pub fn new(url: &str) -> Result<Self, OllamaError> {
        let generate_url = generate_url(url);
        if generate_url.is_empty() {
            return Err(OllamaError::Api("Ollama URL is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| OllamaError::Api(format!("Cannot build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url(&generate_url),
            generate_url,
        })
    }

    pub fn generate_url(&self) -> &str {
        &self.generate_url
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_generate(
        &self,
        messages: &[Message],
        model: &str,
        stream: bool,
    ) -> Result<reqwest::Response, OllamaError> {
        let payload = GenerateRequest {
            model,
            prompt: build_prompt(messages),
            stream,
        };
        tracing::debug!(
            "Sending {} request to Ollama at {} with model {}",
            if stream { "streaming" } else { "blocking" },
            self.generate_url,
            model
        );

        let mut request = self.http.post(&self.generate_url).json(&payload);
        if !stream {
            request = request.timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS));
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, &self.generate_url))?;
        self.check_status(response, model).await
    }

    async fn check_status(
        &self,
        response: reqwest::Response,
        model: &str,
    ) -> Result<reqwest::Response, OllamaError> {
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            let detail = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_default();
            let lower = detail.to_lowercase();

            if lower.contains("model") || lower.contains("not found") {
                tracing::error!("Ollama model not found: {}", model);
                return Err(OllamaError::ModelNotFound(model.to_string()));
            }
            tracing::error!("Ollama API endpoint not found: {}", self.generate_url);
            return Err(OllamaError::Api(format!(
                "Ollama API endpoint not found at {}. {}",
                self.generate_url, detail
            )));
        }

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(OllamaError::Api(format!(
                "HTTP {} from Ollama: {}",
                status,
                detail.trim()
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmBackend for OllamaClient {
    async fn generate(&self, messages: &[Message], model: &str) -> Result<String, OllamaError> {
        let response = self.post_generate(messages, model, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(e, &self.generate_url))?;

        let chunk: GenerateChunk = serde_json::from_str(&body).map_err(|_| {
            OllamaError::Api("Invalid response from Ollama (not valid JSON)".to_string())
        })?;

        if let Some(error) = chunk.error {
            tracing::error!("Ollama API returned error: {}", error);
            return Err(OllamaError::Api(error));
        }

        chunk.response.ok_or_else(|| {
            tracing::error!("Unexpected response format from Ollama API");
            OllamaError::Api("Unexpected response format from Ollama".to_string())
        })
    }

    async fn stream(&self, messages: &[Message], model: &str) -> Result<TokenStream, OllamaError> {
        let response = self.post_generate(messages, model, true).await?;
        let url = self.generate_url.clone();
        let mut bytes = response.bytes_stream();

        let tokens = async_stream::stream! {
            let mut decoder = NdjsonDecoder::default();
            let mut finished = false;

            while !finished {
                let next = tokio::time::timeout(
                    Duration::from_secs(REQUEST_TIMEOUT_SECS),
                    bytes.next(),
                )
                .await;

                let events = match next {
                    Err(_) => {
                        yield Err(OllamaError::Timeout { secs: REQUEST_TIMEOUT_SECS });
                        break;
                    }
                    Ok(Some(Ok(chunk))) => decoder.push(&chunk),
                    Ok(Some(Err(e))) => {
                        yield Err(transport_error(e, &url));
                        break;
                    }
                    Ok(None) => {
                        finished = true;
                        decoder.finish()
                    }
                };

                for event in events {
                    match event {
                        ChunkEvent::Token(token) => yield Ok(token),
                        ChunkEvent::Done => {
                            tracing::debug!("Streaming completed successfully");
                            finished = true;
                            break;
                        }
                        ChunkEvent::Failed(e) => {
                            yield Err(e);
                            finished = true;
                            break;
                        }
                    }
                }
            }
        };

        Ok(tokens.boxed())
    }

    async fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);
        tracing::debug!("Fetching models from {}", url);

        let response = self
            .http
            .get(&url)
            .timeout(MODELS_TIMEOUT)
            .send()
            .await
            .map_err(|e| transport_error(e, &url))?;

        if !response.status().is_success() {
            return Err(OllamaError::Api(format!(
                "Error fetching models from Ollama: HTTP {}",
                response.status()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| OllamaError::Api(format!("Error fetching models from Ollama: {}", e)))?;

        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }
}
