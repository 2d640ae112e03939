//! Ollama HTTP client shared by the perception and cognition layers.
//!
//! One blocking client serves three capabilities:
//! - `/api/generate` for contradiction reasoning (`LlmClient`)
//! - `/api/chat` with images for vision OCR (`VisionClient`)
//! - `/api/embed` for statute embeddings (`EmbeddingClient`)
//!
//! All calls are blocking. Async callers must dispatch them through
//! `tokio::task::spawn_blocking`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("Ollama is not running at {0}")]
    Connection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

// ──────────────────────────────────────────────
// Capability traits
// ──────────────────────────────────────────────

/// Text generation (system + user prompt → completion).
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, OllamaError>;

    fn is_model_available(&self, model: &str) -> Result<bool, OllamaError>;
}

/// Multimodal chat: prompt + base64 images → completion.
pub trait VisionClient: Send + Sync {
    fn chat_with_images(
        &self,
        model: &str,
        prompt: &str,
        images_base64: &[String],
        system: Option<&str>,
    ) -> Result<String, OllamaError>;
}

/// Batch text embedding.
pub trait EmbeddingClient: Send + Sync {
    fn embed(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, OllamaError>;
}

// ──────────────────────────────────────────────
// OllamaClient
// ──────────────────────────────────────────────

/// Ollama HTTP client.
pub struct OllamaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OllamaClient {
    /// Create a client for the given base URL with a per-request timeout.
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "HTTP client builder failed, using defaults");
                reqwest::blocking::Client::new()
            });

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        }
    }

    /// Default Ollama instance at localhost:11434 with 5-minute timeout.
    pub fn default_local() -> Self {
        Self::new("http://localhost:11434", 300)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn list_models(&self) -> Result<Vec<String>, OllamaError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.map_send_error(e))?;
        let parsed: TagsResponse = self.read_json(response)?;
        Ok(parsed.models.into_iter().map(|m| m.name).collect())
    }

    fn post_json<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, OllamaError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| self.map_send_error(e))?;
        self.read_json(response)
    }

    fn read_json<R: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::blocking::Response,
    ) -> Result<R, OllamaError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OllamaError::Api {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .map_err(|e| OllamaError::ResponseParsing(e.to_string()))
    }

    fn map_send_error(&self, e: reqwest::Error) -> OllamaError {
        if e.is_connect() {
            OllamaError::Connection(self.base_url.clone())
        } else if e.is_timeout() {
            OllamaError::Timeout(self.timeout_secs)
        } else {
            OllamaError::HttpClient(e.to_string())
        }
    }
}

/// Request body for Ollama /api/generate
#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    system: &'a str,
    stream: bool,
    options: GenerateOptions,
}

/// Temperature 0 keeps contradiction reasoning as repeatable as the model allows.
#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    images: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    name: String,
}

impl LlmClient for OllamaClient {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, OllamaError> {
        let body = GenerateRequest {
            model,
            prompt,
            system,
            stream: false,
            options: GenerateOptions { temperature: 0.0 },
        };
        let parsed: GenerateResponse = self.post_json("/api/generate", &body)?;
        Ok(parsed.response)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, OllamaError> {
        let models = self.list_models()?;
        Ok(models.iter().any(|m| m.starts_with(model)))
    }
}

impl VisionClient for OllamaClient {
    fn chat_with_images(
        &self,
        model: &str,
        prompt: &str,
        images_base64: &[String],
        system: Option<&str>,
    ) -> Result<String, OllamaError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system",
                content: system,
                images: None,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: prompt,
            images: Some(images_base64),
        });

        let body = ChatRequest {
            model,
            messages,
            stream: false,
        };
        let parsed: ChatResponse = self.post_json("/api/chat", &body)?;
        Ok(parsed.message.content)
    }
}

impl EmbeddingClient for OllamaClient {
    fn embed(&self, model: &str, inputs: &[&str]) -> Result<Vec<Vec<f32>>, OllamaError> {
        let body = EmbedRequest { model, input: inputs };
        let parsed: EmbedResponse = self.post_json("/api/embed", &body)?;
        if parsed.embeddings.len() != inputs.len() {
            return Err(OllamaError::ResponseParsing(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                parsed.embeddings.len()
            )));
        }
        Ok(parsed.embeddings)
    }
}

// ──────────────────────────────────────────────
// Mocks
// ──────────────────────────────────────────────

/// Mock LLM client returning a configurable response.
pub struct MockLlmClient {
    response: Result<String, String>,
    available_models: Vec<String>,
}

impl MockLlmClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
            available_models: vec!["llama3.1:8b".to_string()],
        }
    }

    /// A client whose every generate call fails with a connection error.
    pub fn unreachable() -> Self {
        Self {
            response: Err("http://localhost:11434".to_string()),
            available_models: vec![],
        }
    }
}

impl LlmClient for MockLlmClient {
    fn generate(&self, _model: &str, _prompt: &str, _system: &str) -> Result<String, OllamaError> {
        self.response
            .clone()
            .map_err(OllamaError::Connection)
    }

    fn is_model_available(&self, model: &str) -> Result<bool, OllamaError> {
        Ok(self.available_models.iter().any(|m| m.starts_with(model)))
    }
}

/// Mock vision client returning a fixed response for every image.
pub struct MockVisionClient {
    response: Result<String, String>,
}

impl MockVisionClient {
    pub fn new(response: &str) -> Self {
        Self {
            response: Ok(response.to_string()),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            response: Err(reason.to_string()),
        }
    }
}

impl VisionClient for MockVisionClient {
    fn chat_with_images(
        &self,
        _model: &str,
        _prompt: &str,
        _images_base64: &[String],
        _system: Option<&str>,
    ) -> Result<String, OllamaError> {
        self.response
            .clone()
            .map_err(OllamaError::HttpClient)
    }
}
