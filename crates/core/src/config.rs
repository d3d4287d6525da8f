//! # Configuration
//!
//! Provider credentials come from the environment. Agent settings are
//! persisted as JSON under the `.scynv` runtime directory and merged
//! field-by-field when updated through the API.

use crate::models::{ModelConfig, DEFAULT_LLM_BASE_URL, DEFAULT_MODEL};
use crate::tools::search::{DEFAULT_SEARCH_BASE_URL, DEFAULT_SEARCH_CX, MAX_RESULTS_PER_QUERY};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Environment variables forming the model key pool, in priority order
pub const MODEL_KEY_VARS: [&str; 2] = ["GEMINI_KEY_1", "GEMINI_KEY_2"];
pub const SEARCH_KEY_VAR: &str = "GOOGLE_SEARCH_API_KEY";
pub const SEARCH_CX_VAR: &str = "GOOGLE_SEARCH_CX";

/// Missing or unusable provider credentials
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing API keys")]
    MissingModelKey,
    #[error("Missing API keys")]
    MissingSearchKey,
}

/// Provider credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    /// Model key pool; the first configured key wins
    pub model_keys: Vec<String>,
    pub search_key: Option<String>,
}

impl Credentials {
    pub fn new(model_keys: Vec<String>, search_key: Option<String>) -> Self {
        Self {
            model_keys: model_keys
                .into_iter()
                .filter(|k| !k.trim().is_empty())
                .collect(),
            search_key: search_key.filter(|k| !k.trim().is_empty()),
        }
    }

    /// Read credentials from the process environment
    pub fn from_env() -> Self {
        let model_keys = MODEL_KEY_VARS
            .iter()
            .filter_map(|var| std::env::var(var).ok())
            .collect();
        Self::new(model_keys, std::env::var(SEARCH_KEY_VAR).ok())
    }

    // TODO: rotate to the next pooled key when the first one is rate-limited.
    pub fn model_key(&self) -> Result<&str, ConfigError> {
        self.model_keys
            .first()
            .map(String::as_str)
            .ok_or(ConfigError::MissingModelKey)
    }

    pub fn search_key(&self) -> Result<&str, ConfigError> {
        self.search_key
            .as_deref()
            .ok_or(ConfigError::MissingSearchKey)
    }

    pub fn has_model_key(&self) -> bool {
        !self.model_keys.is_empty()
    }

    pub fn has_search_key(&self) -> bool {
        self.search_key.is_some()
    }

    /// Both keys, as required before a research run may start
    pub fn research_keys(&self) -> Result<(&str, &str), ConfigError> {
        Ok((self.model_key()?, self.search_key()?))
    }
}

/// Get the runtime directory path (.scynv)
pub fn get_runtime_path() -> PathBuf {
    if let Ok(path) = std::env::var("SCYNV_RUNTIME_PATH") {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".scynv")
}

/// Persisted agent settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentSettings {
    /// Gemini model name
    pub model: String,
    /// Gemini API root
    pub llm_base_url: String,
    /// Custom Search endpoint
    pub search_base_url: String,
    /// Custom Search engine id
    pub search_cx: String,
    /// Results requested per planned query (capped at 5)
    pub results_per_query: u8,
    /// Abort the pipeline when the streaming client disconnects
    pub cancel_on_disconnect: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            search_cx: std::env::var(SEARCH_CX_VAR)
                .unwrap_or_else(|_| DEFAULT_SEARCH_CX.to_string()),
            results_per_query: MAX_RESULTS_PER_QUERY,
            cancel_on_disconnect: false,
        }
    }
}

/// Partial settings update; absent fields keep their current value
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SettingsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_cx: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_per_query: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_on_disconnect: Option<bool>,
}

impl AgentSettings {
    pub fn config_path() -> PathBuf {
        get_runtime_path().join("config.json")
    }

    /// Load settings, falling back to defaults when the file is absent or unreadable
    pub async fn load() -> Self {
        let path = Self::config_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed settings at {:?}: {}", path, e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub async fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create runtime directory: {:?}", parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write settings: {:?}", path))
    }

    pub fn merge(&mut self, patch: SettingsPatch) {
        if let Some(model) = patch.model {
            self.model = model;
        }
        if let Some(url) = patch.llm_base_url {
            self.llm_base_url = url;
        }
        if let Some(url) = patch.search_base_url {
            self.search_base_url = url;
        }
        if let Some(cx) = patch.search_cx {
            self.search_cx = cx;
        }
        if let Some(count) = patch.results_per_query {
            self.results_per_query = count.clamp(1, MAX_RESULTS_PER_QUERY);
        }
        if let Some(cancel) = patch.cancel_on_disconnect {
            self.cancel_on_disconnect = cancel;
        }
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig::new(&self.model).with_base_url(&self.llm_base_url)
    }
}
