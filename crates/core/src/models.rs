//! # ScynV Models
//!
//! Language-model configuration and the Gemini client.
//!
//! The rest of the system only sees the [`LanguageModel`] trait: a prompt goes
//! in, generated text comes out. A provider that answers without a candidate
//! yields [`NO_RESPONSE`], which is a valid result and not an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Sentinel returned when the provider produced no candidate text
pub const NO_RESPONSE: &str = "No response generated";

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-lite";

/// Header carrying the Gemini API key
pub const API_KEY_HEADER: &str = "x-goog-api-key";

/// Default Gemini API root
pub const DEFAULT_LLM_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Errors raised by a language-model call
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Transport(reqwest::Error),
    #[error("model returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model unavailable: {0}")]
    Unavailable(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL never reaches callers or logs
        LlmError::Transport(e.without_url())
    }
}

/// A single generation request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub temperature: Option<f32>,
    pub max_output_tokens: Option<u32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            temperature: None,
            max_output_tokens: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }
}

/// Prompt-in, text-out contract for a generative text provider
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError>;
}

/// Configuration for LLM model selection
///
/// ## Example
/// ```rust,ignore
/// use scynv_core::models::{GeminiClient, ModelConfig};
///
/// let config = ModelConfig::new("gemini-2.0-flash");
/// let llm = GeminiClient::new(config, api_key);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Model name (e.g., "gemini-2.0-flash-lite")
    pub model: String,
    /// API root, overridable for proxies and tests
    pub base_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_LLM_BASE_URL.to_string(),
        }
    }
}

impl ModelConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Self::default()
        }
    }

    /// Set base URL (for proxies or self-hosted gateways)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// `generateContent` endpoint for the configured model
    pub fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

// --- Gemini wire types ---

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPayload<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Deserialize, Default)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiPartOwned>,
}

#[derive(Deserialize)]
struct GeminiPartOwned {
    text: Option<String>,
}

impl GeminiResponse {
    /// Text of the first part of the first candidate, if any
    fn first_text(self) -> Option<String> {
        self.candidates
            .into_iter()
            .next()?
            .content?
            .parts
            .into_iter()
            .next()?
            .text
            .filter(|t| !t.is_empty())
    }
}

fn build_payload(request: &GenerateRequest) -> GeminiPayload<'_> {
    let generation_config =
        if request.temperature.is_some() || request.max_output_tokens.is_some() {
            Some(GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            })
        } else {
            None
        };

    GeminiPayload {
        contents: vec![GeminiContent {
            parts: vec![GeminiPart {
                text: &request.prompt,
            }],
        }],
        generation_config,
    }
}

/// Gemini `generateContent` client
#[derive(Clone)]
pub struct GeminiClient {
    config: ModelConfig,
    api_key: String,
    http: reqwest::Client,
}

impl GeminiClient {
    pub fn new(config: ModelConfig, api_key: impl Into<String>) -> Self {
        Self::with_http_client(config, api_key, reqwest::Client::new())
    }

    /// Share an existing connection pool
    pub fn with_http_client(
        config: ModelConfig,
        api_key: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            api_key: api_key.into(),
            http,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        let payload = build_payload(&request);
        tracing::debug!(
            model = %self.config.model,
            prompt_chars = request.prompt.len(),
            "Calling Gemini"
        );

        let response = self
            .http
            .post(self.config.endpoint())
            .header(API_KEY_HEADER, self.api_key.as_str())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let data: GeminiResponse = response.json().await?;
        Ok(data.first_text().unwrap_or_else(|| NO_RESPONSE.to_string()))
    }
}
