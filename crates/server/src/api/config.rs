//! # Config API
//!
//! Persisted agent settings and a health probe.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use scynv_core::config::{AgentSettings, SettingsPatch};

use crate::SharedState;

/// Settings as exposed over the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SettingsBody {
    pub model: String,
    pub llm_base_url: String,
    pub search_base_url: String,
    pub search_cx: String,
    pub results_per_query: u8,
    pub cancel_on_disconnect: bool,
}

impl From<AgentSettings> for SettingsBody {
    fn from(s: AgentSettings) -> Self {
        Self {
            model: s.model,
            llm_base_url: s.llm_base_url,
            search_base_url: s.search_base_url,
            search_cx: s.search_cx,
            results_per_query: s.results_per_query,
            cancel_on_disconnect: s.cancel_on_disconnect,
        }
    }
}

/// Partial update; omitted fields keep their value
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct SettingsPatchBody {
    pub model: Option<String>,
    pub llm_base_url: Option<String>,
    pub search_base_url: Option<String>,
    pub search_cx: Option<String>,
    pub results_per_query: Option<u8>,
    pub cancel_on_disconnect: Option<bool>,
}

impl From<SettingsPatchBody> for SettingsPatch {
    fn from(p: SettingsPatchBody) -> Self {
        Self {
            model: p.model,
            llm_base_url: p.llm_base_url,
            search_base_url: p.search_base_url,
            search_cx: p.search_cx,
            results_per_query: p.results_per_query,
            cancel_on_disconnect: p.cancel_on_disconnect,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub model_configured: bool,
    pub search_configured: bool,
}

pub fn config_routes() -> Router<SharedState> {
    Router::new()
        .route("/config", get(get_config).patch(update_config))
        .route("/health", get(health))
}

/// Get current settings
#[utoipa::path(
    get,
    path = "/api/v1/config",
    tag = "config",
    responses(
        (status = 200, description = "Current settings", body = SettingsBody)
    )
)]
pub async fn get_config(State(state): State<SharedState>) -> Json<SettingsBody> {
    Json(state.settings.read().await.clone().into())
}

/// Update settings (partial merge) and persist them
#[utoipa::path(
    patch,
    path = "/api/v1/config",
    tag = "config",
    request_body = SettingsPatchBody,
    responses(
        (status = 200, description = "Updated settings", body = SettingsBody)
    )
)]
pub async fn update_config(
    State(state): State<SharedState>,
    Json(patch): Json<SettingsPatchBody>,
) -> Json<SettingsBody> {
    let mut settings = state.settings.write().await;
    settings.merge(patch.into());

    if state.persist_settings {
        if let Err(e) = settings.save().await {
            tracing::warn!("Failed to save settings: {:#}", e);
        }
    }

    Json(settings.clone().into())
}

/// Report which providers are configured
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "config",
    responses(
        (status = 200, description = "Server health", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_configured: state.credentials.has_model_key(),
        search_configured: state.credentials.has_search_key(),
    })
}
